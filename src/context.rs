// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{ffi::OsString, path::PathBuf};

use log::{debug, error};

use crate::{
    commands::{Cli, Handle, HandledResult},
    config::Settings,
};

/// The environment variables sshecret consumes, captured once at startup so that nothing deeper
/// in the program reads the process environment on its own.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub home: Option<PathBuf>,
    /// The local user name, used for `%u` and as the default for `%r`.
    pub user: Option<String>,
    /// `XDG_RUNTIME_DIR`
    pub runtime_dir: Option<PathBuf>,
    /// `SSH_CONF_PATH`
    pub ssh_conf_path: Option<PathBuf>,
    /// `SSHECRET_CONFIG`
    pub settings_path: Option<PathBuf>,
}

impl Environment {
    pub fn from_process() -> Self {
        Environment {
            home: crate::env_path("HOME"),
            user: local_user(),
            runtime_dir: crate::env_path("XDG_RUNTIME_DIR"),
            ssh_conf_path: crate::env_path("SSH_CONF_PATH"),
            settings_path: crate::env_path("SSHECRET_CONFIG"),
        }
    }
}

fn local_user() -> Option<String> {
    match std::env::var("USER") {
        Ok(user) if !user.is_empty() => Some(user),
        _ => nix::unistd::User::from_uid(nix::unistd::getuid())
            .ok()
            .flatten()
            .map(|user| user.name),
    }
}

/// Everything a single invocation needs: the parsed arguments, the raw arguments to hand on to
/// ssh, the captured environment and the loaded settings.
#[derive(Debug)]
pub struct Context {
    pub args: Cli,
    /// The command line minus the program name, exactly as it was given.
    pub argv: Vec<OsString>,
    pub env: Environment,
    pub settings: Settings,
}

impl Context {
    /// Build a Context, loading the settings file named by the environment (or the default one,
    /// if it exists).
    pub fn new(args: Cli, argv: Vec<OsString>, env: Environment) -> HandledResult<Self> {
        let settings = match &env.settings_path {
            Some(path) => Settings::load(path).handle_err(|e| error!("{e}"))?,
            None => match crate::default_settings_path(env.home.as_deref()) {
                Some(path) => Settings::load_or_default(&path).handle_err(|e| error!("{e}"))?,
                None => Settings::default(),
            },
        };
        debug!("settings: {settings:?}");

        Ok(Context {
            args,
            argv,
            env,
            settings,
        })
    }

    pub fn from_process(args: Cli, argv: Vec<OsString>) -> HandledResult<Self> {
        Self::new(args, argv, Environment::from_process())
    }

    /// Build a Context from already-loaded settings.
    pub fn with_settings(
        args: Cli,
        argv: Vec<OsString>,
        env: Environment,
        settings: Settings,
    ) -> Self {
        Context {
            args,
            argv,
            env,
            settings,
        }
    }
}
