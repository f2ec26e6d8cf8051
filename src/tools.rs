// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! tools.rs
//!
//! Runs the OpenSSH helper programs (ssh-agent, ssh-add, ssh-keygen) and captures what they
//! report.

use std::{
    ffi::{OsStr, OsString},
    fmt, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};

use log::debug;

use crate::config::Tools;

/// An external program that sshecret drives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tool {
    Ssh,
    Agent,
    Add,
    Keygen,
}

impl Tool {
    /// Where the configured executable for this tool lives.
    pub fn path(self, tools: &Tools) -> &Path {
        match self {
            Tool::Ssh => &tools.ssh,
            Tool::Agent => &tools.ssh_agent,
            Tool::Add => &tools.ssh_add,
            Tool::Keygen => &tools.ssh_keygen,
        }
    }
}

/// Failure of an external tool. Each variant keeps the command line that was run so that the
/// report says exactly what failed.
#[derive(Debug)]
pub enum ToolError {
    /// The program could not be started at all.
    Spawn { command: String, source: io::Error },
    /// The program ran and exited unsuccessfully.
    Failed {
        command: String,
        status: ExitStatus,
        output: String,
    },
    /// The program succeeded but printed something we could not make sense of.
    Unparsable { command: String, output: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Spawn { command, source } => {
                write!(f, "Could not run command `{command}`: {source}")
            }
            ToolError::Failed {
                command,
                status,
                output,
            } => {
                write!(f, "Command `{command}` failed ({status})")?;
                if !output.trim().is_empty() {
                    write!(f, ": {}", output.trim())?;
                }
                Ok(())
            }
            ToolError::Unparsable { command, output } => {
                write!(f, "Unexpected output from `{command}`: {:?}", output.trim())
            }
        }
    }
}

impl std::error::Error for ToolError {}

/// The captured result of running a tool.
#[derive(Debug)]
pub struct ToolOutput {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stdout and stderr together, the way the tools print them to a terminal.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    /// Turn an unsuccessful exit into a `ToolError::Failed`.
    pub fn check(self) -> Result<Self, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::Failed {
                output: self.combined(),
                command: self.command,
                status: self.status,
            })
        }
    }
}

/// A single invocation of a tool, built up before running it.
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    agent_socket: Option<PathBuf>,
    interactive: bool,
}

impl ToolCommand {
    pub fn new(tool: Tool, tools: &Tools) -> Self {
        ToolCommand {
            program: tool.path(tools).to_path_buf(),
            args: Vec::new(),
            agent_socket: None,
            interactive: false,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Point the tool at the agent listening on `socket`.
    pub fn agent_socket(mut self, socket: &Path) -> Self {
        self.agent_socket = Some(socket.to_path_buf());
        self
    }

    /// Let the tool read from our stdin, e.g. for passphrase prompts.
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// The command line as it would be typed, for diagnostics.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in self.args.iter() {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run the tool to completion, capturing stdout and stderr.
    ///
    /// A nonzero exit is not an error here; callers decide what a failure means with
    /// `ToolOutput::check()` or by inspecting the status themselves.
    pub fn run(self) -> Result<ToolOutput, ToolError> {
        let command = self.display();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(socket) = &self.agent_socket {
            cmd.env(crate::AUTH_SOCK_VAR, socket);
        }
        if self.interactive {
            cmd.stdin(Stdio::inherit());
        }

        debug!("Running command: {command}");
        let output = cmd.output().map_err(|source| ToolError::Spawn {
            command: command.clone(),
            source,
        })?;

        let output = ToolOutput {
            command,
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            "`{}` exited with {}: {:?}",
            output.command,
            output.status,
            output.combined().trim()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_tools() -> Tools {
        Tools {
            ssh: PathBuf::from("/bin/sh"),
            ssh_agent: PathBuf::from("/bin/sh"),
            ssh_add: PathBuf::from("/bin/sh"),
            ssh_keygen: PathBuf::from("/bin/sh"),
        }
    }

    #[test]
    fn display_command_line() {
        let cmd = ToolCommand::new(Tool::Keygen, &Tools::default())
            .arg("-l")
            .arg("-f")
            .arg("/home/me/.ssh/id_a");
        assert_eq!(cmd.display(), "/usr/bin/ssh-keygen -l -f /home/me/.ssh/id_a");
    }

    #[test]
    fn captures_output_and_status() {
        let output = ToolCommand::new(Tool::Add, &sh_tools())
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3")
            .run()
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.combined(), "out\nerr\n");

        let err = output.check().unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
        assert!(err.to_string().contains("out\nerr"));
    }

    #[test]
    fn sets_agent_socket() {
        let output = ToolCommand::new(Tool::Add, &sh_tools())
            .arg("-c")
            .arg("printf %s \"$SSH_AUTH_SOCK\"")
            .agent_socket(Path::new("/run/user/1000/abc.sock"))
            .run()
            .unwrap()
            .check()
            .unwrap();
        assert_eq!(output.stdout, "/run/user/1000/abc.sock");
    }

    #[test]
    fn missing_program() {
        let tools = Tools {
            ssh_agent: PathBuf::from("/nonexistent/ssh-agent"),
            ..Tools::default()
        };
        let err = ToolCommand::new(Tool::Agent, &tools)
            .arg("-a/tmp/x.sock")
            .run()
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/ssh-agent -a/tmp/x.sock"));
    }
}
