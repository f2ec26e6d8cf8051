// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::ffi::OsString;

use clap::Parser;

use sshecret_lib::{
    commands::{self, Cli},
    context::Context,
    launcher::Execve,
};

/// sshecret wraps ssh, giving every identity file its own ssh-agent.
fn main() {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let args = Cli::parse_from(&argv);

    let level = if args.verbose > 0 { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("SSHECRET_LOG", level))
        .init();

    let Ok(context) = Context::from_process(args, argv.into_iter().skip(1).collect()) else {
        std::process::exit(1);
    };

    if commands::main(&context, &Execve).is_err() {
        std::process::exit(1);
    }
}
