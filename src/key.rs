// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    cell::OnceCell,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    config::Tools,
    tools::{Tool, ToolCommand, ToolError},
};

/// An identity file, along with its fingerprint once that has been computed.
#[derive(Debug)]
pub struct Key {
    path: PathBuf,
    fingerprint: OnceCell<String>,
}

/// The fingerprint is the second field of `ssh-keygen -l` output, e.g. the `SHA256:...` in
/// `256 SHA256:abc... user@host (ED25519)`.
fn parse_fingerprint(output: &str) -> Option<&str> {
    output.lines().next()?.split_whitespace().nth(1)
}

/// Whether `fingerprint` appears as a whole word in `ssh-add -l` output.
fn listed(listing: &str, fingerprint: &str) -> bool {
    listing.split_whitespace().any(|word| word == fingerprint)
}

impl Key {
    pub fn new(path: PathBuf) -> Self {
        Key {
            path,
            fingerprint: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the key's fingerprint, running `ssh-keygen -l -f` the first time only.
    pub fn fingerprint(&self, tools: &Tools) -> Result<&str, ToolError> {
        if let Some(fingerprint) = self.fingerprint.get() {
            return Ok(fingerprint);
        }

        let output = ToolCommand::new(Tool::Keygen, tools)
            .arg("-l")
            .arg("-f")
            .arg(&self.path)
            .run()?
            .check()?;

        let fingerprint = parse_fingerprint(&output.stdout)
            .ok_or_else(|| ToolError::Unparsable {
                command: output.command.clone(),
                output: output.stdout.clone(),
            })?
            .to_string();
        debug!("Key fingerprint is: {fingerprint}");

        Ok(self.fingerprint.get_or_init(|| fingerprint))
    }

    /// Check whether this key is already loaded into the agent listening on `socket`.
    ///
    /// An agent that has no identities, or that `ssh-add` cannot talk to, simply does not have
    /// the key; only failing to run the tools at all is an error.
    pub fn is_loaded(&self, tools: &Tools, socket: &Path) -> Result<bool, ToolError> {
        let output = ToolCommand::new(Tool::Add, tools)
            .arg("-l")
            .agent_socket(socket)
            .run()?;

        if !output.success() {
            debug!(
                "Agent at {} has no identities: {}",
                socket.display(),
                output.combined().trim()
            );
            return Ok(false);
        }

        let fingerprint = self.fingerprint(tools)?;
        Ok(listed(&output.combined(), fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_field() {
        assert_eq!(
            parse_fingerprint("256 SHA256:Qk8cXhZ0 me@laptop (ED25519)\n"),
            Some("SHA256:Qk8cXhZ0")
        );
        assert_eq!(
            parse_fingerprint("2048 MD5:de:ad:be:ef /home/me/.ssh/id_rsa (RSA)"),
            Some("MD5:de:ad:be:ef")
        );
        assert_eq!(parse_fingerprint(""), None);
        assert_eq!(parse_fingerprint("garbage\n"), None);
    }

    #[test]
    fn listed_matches_whole_words() {
        let listing = "256 SHA256:abc me@laptop (ED25519)\n3072 SHA256:xyz work (RSA)\n";
        assert!(listed(listing, "SHA256:abc"));
        assert!(listed(listing, "SHA256:xyz"));
        assert!(!listed(listing, "SHA256:ab"));
        assert!(!listed("The agent has no identities.\n", "SHA256:abc"));
    }

    #[test]
    fn cached_fingerprint_skips_tool() {
        let key = Key::new(PathBuf::from("/home/me/.ssh/id_a"));
        key.fingerprint.set("SHA256:cached".to_string()).unwrap();
        let tools = Tools {
            ssh_keygen: PathBuf::from("/nonexistent/ssh-keygen"),
            ..Tools::default()
        };
        assert_eq!(key.fingerprint(&tools).unwrap(), "SHA256:cached");
    }

    #[test]
    fn keygen_missing() {
        let key = Key::new(PathBuf::from("/home/me/.ssh/id_a"));
        let tools = Tools {
            ssh_keygen: PathBuf::from("/nonexistent/ssh-keygen"),
            ..Tools::default()
        };
        assert!(matches!(
            key.fingerprint(&tools),
            Err(ToolError::Spawn { .. })
        ));
    }

    #[test]
    fn keygen_fails() {
        let key = Key::new(PathBuf::from("/home/me/.ssh/id_a"));
        let tools = Tools {
            ssh_keygen: PathBuf::from("/bin/false"),
            ..Tools::default()
        };
        assert!(matches!(
            key.fingerprint(&tools),
            Err(ToolError::Failed { .. })
        ));
        assert!(key.fingerprint.get().is_none());
    }

    #[test]
    fn keygen_prints_nothing_useful() {
        let key = Key::new(PathBuf::from("/home/me/.ssh/id_a"));
        let tools = Tools {
            ssh_keygen: PathBuf::from("/bin/true"),
            ..Tools::default()
        };
        assert!(matches!(
            key.fingerprint(&tools),
            Err(ToolError::Unparsable { .. })
        ));
    }
}
