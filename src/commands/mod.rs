// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod connect;
pub mod print_socket;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser};
use log::error;

use crate::{context::Context, host, launcher::ProcessImage, ssh_config};

/// A `HandledError` is an error that has already been reported. Whoever receives one only has to
/// pass it along to its own caller; the details were consumed when the error was reported.
///
/// `main()` is the exception: it turns a `HandledError` into a nonzero exit status.
///
/// Construct one with `handle_err()`, which runs a caller-provided handler on the original error
/// (normally logging it) and then discards it.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub fn handled_error<T>() -> HandledResult<T> {
    HandledResult::Err(HandledError {})
}

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Report an error by giving it to `handler`, then return a `HandledResult` so that callers
    /// further up know there is nothing left to report.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

const ABOUT: &str = "A wrapper around ssh that manages one ssh-agent per identity file";

const LONG_ABOUT: &str = "\
sshecret is a wrapper around ssh that automatically manages multiple
ssh-agent(1)s each containing only a single ssh key.

    EXAMPLE: sshecret -A -L8080:localhost:80 -l johndoe -p2222 example.com

sshecret accepts the same parameters as ssh(1) - fundamentally sshecret uses
execve(2) to wrap ssh, modifying the environment to ensure that each key in
your ssh_config(5) uses its own ssh-agent.

In order to retrieve the path to the socket for a given hostname, use:

    sshecret --socket hostname";

/// The switches and options ssh(1) accepts. They are only declared so that parsing does not
/// trip over them; everything is handed to ssh unchanged. `-v` is not here because sshecret
/// uses it as well.
#[derive(Args, Debug, Default)]
pub struct SshArgs {
    #[arg(short = '1', action = ArgAction::Count, hide = true)]
    pub protocol1: u8,
    #[arg(short = '2', action = ArgAction::Count, hide = true)]
    pub protocol2: u8,
    #[arg(short = '4', action = ArgAction::Count, hide = true)]
    pub ipv4: u8,
    #[arg(short = '6', action = ArgAction::Count, hide = true)]
    pub ipv6: u8,
    #[arg(short = 'A', action = ArgAction::Count, hide = true)]
    pub forward_agent: u8,
    #[arg(short = 'a', action = ArgAction::Count, hide = true)]
    pub no_forward_agent: u8,
    #[arg(short = 'C', action = ArgAction::Count, hide = true)]
    pub compression: u8,
    #[arg(short = 'f', action = ArgAction::Count, hide = true)]
    pub background: u8,
    #[arg(short = 'G', action = ArgAction::Count, hide = true)]
    pub print_config: u8,
    #[arg(short = 'g', action = ArgAction::Count, hide = true)]
    pub gateway_ports: u8,
    #[arg(short = 'K', action = ArgAction::Count, hide = true)]
    pub gssapi: u8,
    #[arg(short = 'k', action = ArgAction::Count, hide = true)]
    pub no_gssapi: u8,
    #[arg(short = 'M', action = ArgAction::Count, hide = true)]
    pub master: u8,
    #[arg(short = 'N', action = ArgAction::Count, hide = true)]
    pub no_command: u8,
    #[arg(short = 'n', action = ArgAction::Count, hide = true)]
    pub null_stdin: u8,
    #[arg(short = 'q', action = ArgAction::Count, hide = true)]
    pub quiet: u8,
    #[arg(short = 's', action = ArgAction::Count, hide = true)]
    pub subsystem: u8,
    #[arg(short = 'T', action = ArgAction::Count, hide = true)]
    pub no_tty: u8,
    #[arg(short = 't', action = ArgAction::Count, hide = true)]
    pub force_tty: u8,
    #[arg(short = 'V', action = ArgAction::Count, hide = true)]
    pub print_version: u8,
    #[arg(short = 'X', action = ArgAction::Count, hide = true)]
    pub x11: u8,
    #[arg(short = 'x', action = ArgAction::Count, hide = true)]
    pub no_x11: u8,
    #[arg(short = 'Y', action = ArgAction::Count, hide = true)]
    pub trusted_x11: u8,
    #[arg(short = 'y', action = ArgAction::Count, hide = true)]
    pub syslog: u8,

    #[arg(short = 'B', hide = true)]
    pub bind_interface: Vec<String>,
    #[arg(short = 'b', hide = true)]
    pub bind_address: Vec<String>,
    #[arg(short = 'c', hide = true)]
    pub cipher_spec: Vec<String>,
    #[arg(short = 'D', hide = true)]
    pub dynamic_forward: Vec<String>,
    #[arg(short = 'E', hide = true)]
    pub log_file: Vec<String>,
    #[arg(short = 'e', hide = true)]
    pub escape_char: Vec<String>,
    /// An alternative ssh config file. sshecret reads it too.
    #[arg(short = 'F', hide = true)]
    pub config_file: Vec<PathBuf>,
    #[arg(short = 'I', hide = true)]
    pub pkcs11: Vec<String>,
    #[arg(short = 'i', hide = true)]
    pub identity_file: Vec<String>,
    #[arg(short = 'J', hide = true)]
    pub jump: Vec<String>,
    #[arg(short = 'L', hide = true)]
    pub local_forward: Vec<String>,
    #[arg(short = 'l', hide = true)]
    pub login_name: Vec<String>,
    #[arg(short = 'm', hide = true)]
    pub mac_spec: Vec<String>,
    #[arg(short = 'O', hide = true)]
    pub ctl_cmd: Vec<String>,
    #[arg(short = 'o', hide = true)]
    pub option: Vec<String>,
    #[arg(short = 'p', hide = true)]
    pub port: Vec<String>,
    #[arg(short = 'P', hide = true)]
    pub tag: Vec<String>,
    #[arg(short = 'Q', hide = true)]
    pub query: Vec<String>,
    #[arg(short = 'R', hide = true)]
    pub remote_forward: Vec<String>,
    #[arg(short = 'S', hide = true)]
    pub ctl_path: Vec<String>,
    #[arg(short = 'W', hide = true)]
    pub stdio_forward: Vec<String>,
    #[arg(short = 'w', hide = true)]
    pub tunnel: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "sshecret",
    about = ABOUT,
    long_about = LONG_ABOUT,
    override_usage = "sshecret [--socket] [whatever you want to pass to ssh]",
    disable_version_flag = true
)]
pub struct Cli {
    /// Increase verbosity of output
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Print the socket path for the given host
    #[arg(long)]
    pub socket: bool,

    #[command(flatten)]
    pub ssh: SshArgs,

    #[arg(hide = true)]
    pub hostname: String,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub command: Vec<String>,
}

/// Find the host, find its identity file, then either print the socket or set up the agent and
/// become ssh.
pub fn main<P: ProcessImage>(context: &Context, image: &P) -> HandledResult<()> {
    let host = host::get_host(&context.args.hostname);
    let identity = ssh_config::identity_for(context, host).handle_err(|e| error!("{e}"))?;

    if context.args.socket {
        return print_socket::print_socket(context, host, identity.as_deref());
    }

    match connect::connect(context, identity, image)? {}
}
