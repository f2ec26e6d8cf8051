// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    convert::Infallible,
    ffi::{CString, NulError, OsString},
    fmt,
    os::unix::ffi::{OsStrExt, OsStringExt},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{context::Context, tools::Tool};

#[derive(Debug)]
pub enum ExecError {
    /// An argument or environment entry contains a NUL byte and cannot be passed to execve(2).
    InvalidArgument(NulError),
    Exec {
        program: PathBuf,
        errno: nix::errno::Errno,
    },
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::InvalidArgument(e) => write!(f, "Invalid argument for ssh: {e}"),
            ExecError::Exec { program, errno } => {
                write!(f, "Could not execute \"{}\": {errno}", program.display())
            }
        }
    }
}

impl std::error::Error for ExecError {}

impl From<NulError> for ExecError {
    fn from(e: NulError) -> Self {
        ExecError::InvalidArgument(e)
    }
}

/// Replaces the running program with another one. Success means this process no longer exists,
/// so the only value that can ever come back is an error.
pub trait ProcessImage {
    fn replace(
        &self,
        program: &Path,
        argv: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<Infallible, ExecError>;
}

/// The real thing: execve(2).
pub struct Execve;

fn cstring(bytes: &[u8]) -> Result<CString, NulError> {
    CString::new(bytes.to_vec())
}

impl ProcessImage for Execve {
    fn replace(
        &self,
        program: &Path,
        argv: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<Infallible, ExecError> {
        let path = cstring(program.as_os_str().as_bytes())?;
        let argv = argv
            .iter()
            .map(|arg| cstring(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let env = env
            .iter()
            .map(|(key, value)| {
                let mut entry = key.clone().into_vec();
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                CString::new(entry)
            })
            .collect::<Result<Vec<_>, _>>()?;

        nix::unistd::execve(&path, &argv, &env).map_err(|errno| ExecError::Exec {
            program: program.to_path_buf(),
            errno,
        })
    }
}

/// Build ssh's environment from `base`: unchanged when there is no socket, otherwise with
/// `SSH_AUTH_SOCK` pointing at it.
pub fn build_env<I>(base: I, sock: Option<&Path>) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let Some(sock) = sock else {
        return base.into_iter().collect();
    };

    let mut env: Vec<(OsString, OsString)> = base
        .into_iter()
        .filter(|(key, _)| key != crate::AUTH_SOCK_VAR)
        .collect();
    env.push((
        OsString::from(crate::AUTH_SOCK_VAR),
        sock.as_os_str().to_os_string(),
    ));
    env
}

/// Replace this process with ssh, handing it the original arguments untouched.
pub fn launch<P: ProcessImage>(
    context: &Context,
    sock: Option<&Path>,
    image: &P,
) -> Result<Infallible, ExecError> {
    let program = Tool::Ssh.path(&context.settings.tools);

    let mut argv = vec![program.as_os_str().to_os_string()];
    argv.extend(context.argv.iter().cloned());
    let env = build_env(std::env::vars_os(), sock);

    debug!(
        "Executing {} {:?}",
        program.display(),
        &argv[1..]
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
    );
    image.replace(program, &argv, &env)
}
