// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::path::{Path, PathBuf};

pub mod commands;
pub mod config;
pub mod context;
pub mod host;
pub mod key;
pub mod launcher;
pub mod socket;
pub mod ssh_config;
pub mod test_env;
pub mod tools;

/// Name of the environment variable the agent socket is handed to ssh in.
pub const AUTH_SOCK_VAR: &str = "SSH_AUTH_SOCK";

/// Gets the path of the ssh client configuration file when `SSH_CONF_PATH` is not set.
pub fn default_ssh_config_path(home: Option<&Path>) -> Option<PathBuf> {
    home.map(|home| home.join(".ssh").join("config"))
}

/// Gets the path of sshecret's own settings file when `SSHECRET_CONFIG` is not set.
pub fn default_settings_path(home: Option<&Path>) -> Option<PathBuf> {
    home.map(|home| home.join(".config").join("sshecret").join("config.toml"))
}

/// Reads a path from the environment, treating an empty value the same as an unset one.
pub fn env_path(name: &str) -> Option<PathBuf> {
    match std::env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
