// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::{
    ffi::OsString,
    fs, io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Command,
};

use clap::Parser;

use crate::{
    commands::Cli,
    config::{Settings, Tools},
    context::{Context, Environment},
    socket::SocketManager,
};

/// The agent socket that tests pretend the user already had before running sshecret.
pub const ORIGINAL_AUTH_SOCK: &str = "/tmp/sshecret-test/original-agent.sock";

/// Given a relative `path` in the test directory, prepend the full path to the test directory.
fn test_path(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join(path)
}

/// The fake OpenSSH programs under `tests/fake_tools/`. Each one appends a line describing its
/// invocation to `tool.log` in the directory above the one it is installed in.
const FAKE_TOOLS: [&str; 4] = ["ssh", "ssh-agent", "ssh-add", "ssh-keygen"];

/// A TestEnvironment holds everything a test needs: a private working directory containing a
/// fake home directory, a runtime directory for agent sockets, and the fake OpenSSH tools.
///
/// Tests should go through its methods rather than building these paths themselves.
pub struct TestEnvironment {
    /// The path to this test's private working directory.
    private_dir: PathBuf,

    /// The sshecret binary. This has to come from the tests because `CARGO_BIN_EXE_*` is only
    /// defined when compiling integration tests.
    binary_path: PathBuf,
}

impl TestEnvironment {
    /// Set up an environment for a test named `test_id`, replacing anything left over from a
    /// previous run of the same test.
    pub fn new(test_id: &str, binary_path: &str) -> Self {
        let private_dir = test_path(&format!("test_output/{test_id}"));
        match fs::remove_dir_all(&private_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => panic!("Could not clean up test directory: {e}"),
        };

        let env = Self {
            private_dir,
            binary_path: PathBuf::from(binary_path),
        };

        fs::create_dir_all(env.home().join(".ssh")).unwrap();
        fs::create_dir_all(env.runtime_dir()).unwrap();
        fs::create_dir_all(env.bin_dir()).unwrap();
        for tool in FAKE_TOOLS {
            let installed = env.bin_dir().join(tool);
            fs::copy(test_path(&format!("fake_tools/{tool}")), &installed)
                .unwrap_or_else(|e| panic!("failed to install fake {tool}: {e}"));
            fs::set_permissions(&installed, fs::Permissions::from_mode(0o755)).unwrap();
        }
        env.write_settings(&env.settings());

        env
    }

    fn bin_dir(&self) -> PathBuf {
        self.private_dir.join("bin")
    }

    pub fn home(&self) -> PathBuf {
        self.private_dir.join("home")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.private_dir.join("run")
    }

    pub fn ssh_config_path(&self) -> PathBuf {
        self.home().join(".ssh").join("config")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.private_dir.join("sshecret.toml")
    }

    fn tool_log_path(&self) -> PathBuf {
        self.private_dir.join("tool.log")
    }

    /// A path inside the private directory that nothing creates.
    pub fn missing_path(&self, name: &str) -> PathBuf {
        self.private_dir.join("missing").join(name)
    }

    pub fn write_ssh_config(&self, contents: &str) {
        fs::write(self.ssh_config_path(), contents).unwrap();
    }

    /// Write a file into the private directory, e.g. an alternative ssh config.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.private_dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Create a (fake) private key file in `~/.ssh`.
    pub fn create_identity(&self, name: &str) -> PathBuf {
        let path = self.home().join(".ssh").join(name);
        fs::write(&path, format!("not really a key: {name}\n")).unwrap();
        path
    }

    /// Settings that point every tool at the fakes.
    pub fn settings(&self) -> Settings {
        Settings {
            tools: Tools {
                ssh: self.bin_dir().join("ssh"),
                ssh_agent: self.bin_dir().join("ssh-agent"),
                ssh_add: self.bin_dir().join("ssh-add"),
                ssh_keygen: self.bin_dir().join("ssh-keygen"),
            },
            ..Settings::default()
        }
    }

    /// Replace the settings file the binary reads.
    pub fn write_settings(&self, settings: &Settings) {
        let contents = toml::to_string(settings).expect("settings should serialize");
        fs::write(self.settings_path(), contents).unwrap();
    }

    pub fn environment(&self) -> Environment {
        Environment {
            home: Some(self.home()),
            user: Some("tester".to_string()),
            runtime_dir: Some(self.runtime_dir()),
            ssh_conf_path: None,
            settings_path: Some(self.settings_path()),
        }
    }

    /// Build a Context for running sshecret in-process with the given arguments.
    pub fn context(&self, args: &[&str]) -> Context {
        self.context_with(args, self.environment(), self.settings())
    }

    pub fn context_with(&self, args: &[&str], env: Environment, settings: Settings) -> Context {
        let cli = Cli::parse_from(std::iter::once("sshecret").chain(args.iter().copied()));
        let argv = args.iter().map(OsString::from).collect();
        Context::with_settings(cli, argv, env, settings)
    }

    /// A Command that runs the sshecret binary inside this environment.
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args)
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("HOME", self.home())
            .env("USER", "tester")
            .env("XDG_RUNTIME_DIR", self.runtime_dir())
            .env("SSHECRET_CONFIG", self.settings_path())
            .env("SSH_AUTH_SOCK", ORIGINAL_AUTH_SOCK);
        cmd
    }

    /// The socket sshecret is expected to use for `identity`.
    pub fn socket_for(&self, identity: &Path) -> PathBuf {
        let runtime_dir = self.runtime_dir();
        let tools = Tools::default();
        SocketManager::with_dir(Some(runtime_dir.as_path()), &tools)
            .resolve_path(identity)
            .unwrap()
    }

    /// Every invocation of a fake tool so far, oldest first.
    pub fn tool_log(&self) -> Vec<String> {
        match fs::read_to_string(self.tool_log_path()) {
            Ok(contents) => contents.lines().map(str::to_string).collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => panic!("Could not read tool log: {e}"),
        }
    }

    /// The keys the fake agent at `sock` holds, one `ssh-add -l` line each.
    pub fn agent_keys(&self, sock: &Path) -> Vec<String> {
        fs::read_to_string(sock)
            .unwrap_or_else(|e| panic!("no agent at {}: {e}", sock.display()))
            .lines()
            .map(str::to_string)
            .collect()
    }
}
