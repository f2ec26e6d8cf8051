// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{convert::Infallible, path::PathBuf};

use log::{debug, error, info};

use crate::{
    commands::{Handle, HandledResult},
    context::Context,
    key::Key,
    launcher::{self, ProcessImage},
    socket::SocketManager,
};

/// Make sure the identity's agent is running and holds the key, then become ssh.
///
/// Only returns if something went wrong.
pub fn connect<P: ProcessImage>(
    context: &Context,
    identity: Option<PathBuf>,
    image: &P,
) -> HandledResult<Infallible> {
    let key = identity.map(Key::new);
    let sock = SocketManager::new(context)
        .ensure(key.as_ref())
        .handle_err(|e| error!("{e}"))?;

    match &sock {
        Some(sock) => info!("{}={}", crate::AUTH_SOCK_VAR, sock.display()),
        None => debug!("No identity file; leaving {} alone", crate::AUTH_SOCK_VAR),
    }

    launcher::launch(context, sock.as_deref(), image).handle_err(|e| error!("{e}"))
}
