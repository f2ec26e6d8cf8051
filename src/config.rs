// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// Settings is the model for sshecret's own (optional) TOML settings file. It is separate from
/// the ssh client configuration, which is only ever read, never written, by this program.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory that agent sockets are created in. When unset, `XDG_RUNTIME_DIR` is used.
    pub socket_dir: Option<PathBuf>,
    pub identity_selection: IdentitySelection,
    pub tools: Tools,
}

/// Which `IdentityFile` to use when the ssh configuration declares more than one for a host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySelection {
    /// The first declared entry, which is the one ssh itself offers first.
    First,
    /// The last declared entry across all matching `Host` blocks.
    #[default]
    Last,
}

/// Locations of the external programs sshecret drives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Tools {
    pub ssh: PathBuf,
    pub ssh_agent: PathBuf,
    pub ssh_add: PathBuf,
    pub ssh_keygen: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Tools {
            ssh: PathBuf::from("/usr/bin/ssh"),
            ssh_agent: PathBuf::from("/usr/bin/ssh-agent"),
            ssh_add: PathBuf::from("/usr/bin/ssh-add"),
            ssh_keygen: PathBuf::from("/usr/bin/ssh-keygen"),
        }
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Read { path, source } => {
                write!(f, "Could not read settings file \"{}\": {source}", path.display())
            }
            SettingsError::Parse { path, source } => {
                write!(f, "Invalid settings file \"{}\": {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SettingsError {}

impl Settings {
    /// Load settings from `path`. The file must exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings from `path`, falling back to the defaults when there is no file there.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        match Self::load(path) {
            Err(SettingsError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }
}
