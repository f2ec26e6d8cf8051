// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::Path;

use log::{error, warn};

use crate::{
    commands::{handled_error, Handle, HandledResult},
    context::Context,
    socket::SocketManager,
};

/// The `SSH_AUTH_SOCK=...` line printed by `--socket`, quoted so a shell can `eval` it.
pub fn socket_line(sock: &Path) -> String {
    format!(
        "{}={}",
        crate::AUTH_SOCK_VAR,
        shell_words::quote(&sock.to_string_lossy())
    )
}

/// Print the agent socket for `host` without starting anything.
pub fn print_socket(context: &Context, host: &str, identity: Option<&Path>) -> HandledResult<()> {
    let Some(identity) = identity else {
        warn!("No IdentityFile configured for {host}; it has no socket");
        return handled_error();
    };

    let sock = SocketManager::new(context)
        .resolve_path(identity)
        .handle_err(|e| error!("{e}"))?;

    println!("{}", socket_line(&sock));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path() {
        assert_eq!(
            socket_line(Path::new("/run/user/1000/0a1b.sock")),
            "SSH_AUTH_SOCK=/run/user/1000/0a1b.sock"
        );
    }

    #[test]
    fn quoted_path() {
        assert_eq!(
            socket_line(Path::new("/tmp/my runtime/0a1b.sock")),
            "SSH_AUTH_SOCK='/tmp/my runtime/0a1b.sock'"
        );
    }
}
