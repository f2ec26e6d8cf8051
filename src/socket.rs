// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    fmt, io,
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    config::Tools,
    context::Context,
    key::Key,
    tools::{Tool, ToolCommand, ToolError},
};

#[derive(Debug)]
pub enum SocketError {
    /// Neither the `socket_dir` setting nor `XDG_RUNTIME_DIR` says where sockets go.
    NoSocketDir,
    /// The identity path could not be made absolute.
    IdentityPath { path: PathBuf, source: io::Error },
    AgentStart(ToolError),
    KeyAdd(ToolError),
    /// Fingerprinting the key or listing the agent's identities failed.
    Inspect(ToolError),
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::NoSocketDir => write!(
                f,
                "XDG_RUNTIME_DIR is not set and no socket_dir is configured"
            ),
            SocketError::IdentityPath { path, source } => write!(
                f,
                "Could not resolve identity file path \"{}\": {source}",
                path.display()
            ),
            SocketError::AgentStart(e) => write!(f, "Could not create agent socket: {e}"),
            SocketError::KeyAdd(e) => write!(f, "Could not add identity file to agent: {e}"),
            SocketError::Inspect(e) => write!(f, "Could not inspect agent: {e}"),
        }
    }
}

impl std::error::Error for SocketError {}

/// Digest bytes kept in the socket file name. Socket paths are limited to about 100 bytes, so
/// the full SHA-256 would leave too little room for the directory.
const NAME_DIGEST_LEN: usize = 16;

/// Creates and reuses one ssh-agent per identity file.
pub struct SocketManager<'a> {
    dir: Option<&'a Path>,
    tools: &'a Tools,
}

impl<'a> SocketManager<'a> {
    pub fn new(context: &'a Context) -> Self {
        let dir = context
            .settings
            .socket_dir
            .as_deref()
            .or(context.env.runtime_dir.as_deref());
        Self::with_dir(dir, &context.settings.tools)
    }

    pub fn with_dir(dir: Option<&'a Path>, tools: &'a Tools) -> Self {
        SocketManager { dir, tools }
    }

    /// The socket path for `identity`: a digest of its absolute path, under the socket
    /// directory. Two identity files never share a socket.
    pub fn resolve_path(&self, identity: &Path) -> Result<PathBuf, SocketError> {
        let dir = self.dir.ok_or(SocketError::NoSocketDir)?;
        let identity =
            std::path::absolute(identity).map_err(|source| SocketError::IdentityPath {
                path: identity.to_path_buf(),
                source,
            })?;

        let digest = Sha256::digest(identity.as_os_str().as_bytes());
        let sock = dir.join(format!("{}.sock", hex::encode(&digest[..NAME_DIGEST_LEN])));
        debug!("Sock path is: {}", sock.display());
        Ok(sock)
    }

    /// Make sure an agent holding `key` is listening, and return its socket.
    ///
    /// With no key there is nothing to do and `None` is returned without running anything.
    /// Otherwise the agent is started only if its socket does not exist yet, and the key is
    /// added only if the agent does not already hold it, so repeated calls are cheap.
    pub fn ensure(&self, key: Option<&Key>) -> Result<Option<PathBuf>, SocketError> {
        let Some(key) = key else {
            return Ok(None);
        };

        let sock = self.resolve_path(key.path())?;
        if !sock.exists() {
            ToolCommand::new(Tool::Agent, self.tools)
                .arg(format!("-a{}", sock.display()))
                .run()
                .and_then(|output| output.check())
                .map_err(SocketError::AgentStart)?;
        }

        self.add_key(key, &sock)?;
        Ok(Some(sock))
    }

    fn add_key(&self, key: &Key, sock: &Path) -> Result<(), SocketError> {
        if key
            .is_loaded(self.tools, sock)
            .map_err(SocketError::Inspect)?
        {
            debug!("SSH Key {} already in sock", key.path().display());
            return Ok(());
        }

        ToolCommand::new(Tool::Add, self.tools)
            .arg(key.path())
            .agent_socket(sock)
            .interactive()
            .run()
            .and_then(|output| output.check())
            .map_err(SocketError::KeyAdd)?;
        Ok(())
    }
}
