// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! ssh_config.rs
//!
//! Reads the ssh client configuration (ssh_config(5)) to find the identity file that ssh would
//! use for a host.

use std::{
    collections::HashMap,
    fmt, io,
    path::{Path, PathBuf},
};

use glob::{MatchOptions, Pattern};
use log::debug;

use crate::{config::IdentitySelection, context::Context};

#[derive(Debug)]
pub enum SshConfigError {
    /// No config file at the resolved location, or it is not a regular file.
    NotFound(PathBuf),
    /// Neither `SSH_CONF_PATH` nor `HOME` is set, so there is nowhere to look.
    NoConfigPath,
    Read { path: PathBuf, source: io::Error },
}

impl fmt::Display for SshConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshConfigError::NotFound(path) => {
                write!(f, "SSH config file not found: \"{}\"", path.display())
            }
            SshConfigError::NoConfigPath => {
                write!(f, "Cannot locate SSH config: neither SSH_CONF_PATH nor HOME is set")
            }
            SshConfigError::Read { path, source } => {
                write!(f, "Could not read SSH config \"{}\": {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SshConfigError {}

/// One pattern from a `Host` line, e.g. `*.example.com` or `!bastion`.
#[derive(Debug)]
struct HostPattern {
    negated: bool,
    pattern: Option<Pattern>,
    literal: String,
}

impl HostPattern {
    fn new(text: &str) -> Self {
        let (negated, text) = match text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        // ssh patterns only know `*` and `?`; brackets are literal characters.
        let mut glob = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '[' => glob.push_str("[[]"),
                ']' => glob.push_str("[]]"),
                c => glob.push(c),
            }
        }
        HostPattern {
            negated,
            pattern: Pattern::new(&glob).ok(),
            literal: text.to_string(),
        }
    }

    fn matches(&self, host: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        match &self.pattern {
            Some(pattern) => pattern.matches_with(host, options),
            None => self.literal.eq_ignore_ascii_case(host),
        }
    }
}

/// A `Host` (or `Match`) section and the directives inside it, in file order.
#[derive(Debug)]
struct Block {
    /// `None` for `Match` blocks, which are never evaluated.
    patterns: Option<Vec<HostPattern>>,
    directives: Vec<(String, String)>,
}

impl Block {
    fn applies_to(&self, host: &str) -> bool {
        let Some(patterns) = &self.patterns else {
            return false;
        };
        let mut matched = false;
        for pattern in patterns.iter() {
            if pattern.matches(host) {
                if pattern.negated {
                    return false;
                }
                matched = true;
            }
        }
        matched
    }
}

/// A parsed ssh client configuration.
#[derive(Debug)]
pub struct SshConfig {
    blocks: Vec<Block>,
}

/// The settings that apply to one host after evaluating every matching block.
#[derive(Debug, Default, PartialEq)]
pub struct HostConfig {
    /// `IdentityFile` values from every matching block, in declaration order, unexpanded.
    pub identity_files: Vec<String>,
    /// Every other keyword (lowercased) with the first value obtained for it.
    options: HashMap<String, String>,
}

impl HostConfig {
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.options
            .get(&keyword.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Pick the identity file according to `selection`.
    pub fn identity_file(&self, selection: IdentitySelection) -> Option<&str> {
        let identity = match selection {
            IdentitySelection::First => self.identity_files.first(),
            IdentitySelection::Last => self.identity_files.last(),
        };
        identity.map(String::as_str)
    }

    /// The real host name for `alias`: `HostName` with its `%h` expanded to the alias, or the
    /// alias itself when there is no `HostName`.
    pub fn hostname(&self, alias: &str) -> String {
        match self.get("hostname") {
            Some(hostname) => expand(
                hostname,
                &Tokens {
                    host: alias,
                    ..Tokens::default()
                },
            ),
            None => alias.to_string(),
        }
    }
}

/// Split a config line into its keyword and value. Accepts both `Keyword value` and
/// `Keyword=value`, with optional whitespace around the `=`.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
    if keyword.is_empty() || rest.is_empty() {
        return None;
    }
    Some((keyword, unquote(rest)))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

impl SshConfig {
    pub fn parse(content: &str) -> Self {
        // Directives before the first Host line apply to every host.
        let mut blocks = vec![Block {
            patterns: Some(vec![HostPattern::new("*")]),
            directives: Vec::new(),
        }];

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((keyword, value)) = split_directive(line) else {
                debug!("Skipping malformed SSH config line: {line:?}");
                continue;
            };

            match keyword.to_ascii_lowercase().as_str() {
                "host" => blocks.push(Block {
                    patterns: Some(
                        value
                            .split_whitespace()
                            .map(|p| HostPattern::new(unquote(p)))
                            .collect(),
                    ),
                    directives: Vec::new(),
                }),
                "match" => blocks.push(Block {
                    patterns: None,
                    directives: Vec::new(),
                }),
                keyword => {
                    if let Some(block) = blocks.last_mut() {
                        block.directives.push((keyword.to_string(), value.to_string()));
                    }
                }
            }
        }

        SshConfig { blocks }
    }

    /// Evaluate the configuration for `host`: the first value obtained for a keyword wins,
    /// except for `IdentityFile`, which accumulates.
    pub fn lookup(&self, host: &str) -> HostConfig {
        let mut config = HostConfig::default();
        for block in self.blocks.iter().filter(|b| b.applies_to(host)) {
            for (keyword, value) in block.directives.iter() {
                if keyword == "identityfile" {
                    if !value.eq_ignore_ascii_case("none") {
                        config.identity_files.push(value.clone());
                    }
                } else {
                    config
                        .options
                        .entry(keyword.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
        config
    }
}

/// The values `%` tokens and `~` expand to in an `IdentityFile`.
#[derive(Debug, Default)]
pub struct Tokens<'a> {
    pub home: Option<&'a Path>,
    pub host: &'a str,
    pub remote_user: Option<&'a str>,
    pub local_user: Option<&'a str>,
}

fn local_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
}

/// Expand `~` and the `%d %h %r %u %l %%` tokens. Unknown tokens, and tokens whose value is not
/// known, are left as they are.
pub fn expand(value: &str, tokens: &Tokens) -> String {
    let home = tokens.home.map(|h| h.to_string_lossy().into_owned());

    let value = match (value.strip_prefix('~'), &home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{home}{rest}")
        }
        _ => value.to_string(),
    };

    let mut expanded = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            expanded.push(c);
            continue;
        }
        let Some(token) = chars.next() else {
            expanded.push('%');
            break;
        };
        let replacement = match token {
            '%' => Some("%".to_string()),
            'd' => home.clone(),
            'h' => Some(tokens.host.to_string()),
            'r' => tokens.remote_user.map(str::to_string),
            'u' => tokens.local_user.map(str::to_string),
            'l' => local_hostname(),
            _ => None,
        };
        match replacement {
            Some(r) => expanded.push_str(&r),
            None => {
                expanded.push('%');
                expanded.push(token);
            }
        }
    }
    expanded
}

/// Find the ssh config file: `-F` on the command line, then `SSH_CONF_PATH`, then
/// `~/.ssh/config`. `-F none` disables the configuration and gives `None`.
pub fn locate(context: &Context) -> Result<Option<PathBuf>, SshConfigError> {
    let path = context
        .args
        .ssh
        .config_file
        .last()
        .cloned()
        .or_else(|| context.env.ssh_conf_path.clone())
        .or_else(|| crate::default_ssh_config_path(context.env.home.as_deref()))
        .ok_or(SshConfigError::NoConfigPath)?;
    if path.as_os_str().eq_ignore_ascii_case("none") {
        debug!("SSH config disabled with -F none");
        return Ok(None);
    }
    debug!("SSH config path is: {}", path.display());

    if !path.is_file() {
        return Err(SshConfigError::NotFound(path));
    }
    Ok(Some(path))
}

/// The user ssh logs in as when it is given on the command line: `-l` takes precedence over a
/// `user@` in the destination. Either one overrides the configured `User`.
fn command_line_user(context: &Context) -> Option<&str> {
    context
        .args
        .ssh
        .login_name
        .first()
        .map(String::as_str)
        .or_else(|| crate::host::get_user(&context.args.hostname))
}

/// Resolve the identity file ssh would use for `host`, or `None` if the configuration does not
/// name one.
///
/// `%h` expands to the real host name and `%r` to the remote user, resolved the way ssh does:
/// the command line first, then `User`, then the local user.
pub fn identity_for(context: &Context, host: &str) -> Result<Option<PathBuf>, SshConfigError> {
    let Some(path) = locate(context)? else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(&path).map_err(|source| SshConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config = SshConfig::parse(&content).lookup(host);
    let Some(identity) = config.identity_file(context.settings.identity_selection) else {
        debug!("No IdentityFile configured for {host}");
        return Ok(None);
    };

    let hostname = config.hostname(host);
    let local_user = context.env.user.as_deref();
    let tokens = Tokens {
        home: context.env.home.as_deref(),
        host: &hostname,
        remote_user: command_line_user(context)
            .or(config.get("user"))
            .or(local_user),
        local_user,
    };
    let identity = PathBuf::from(expand(identity, &tokens));
    debug!("SSH identity file is: {}", identity.display());
    Ok(Some(identity))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
# global defaults
ServerAliveInterval 60

Host example.com
    User alice
    IdentityFile ~/.ssh/id_a

Host *.corp.example !bastion.corp.example
    IdentityFile=~/.ssh/id_corp
    Port 2222

Host bastion.corp.example
    IdentityFile "~/.ssh/id bastion"

Match host example.com
    IdentityFile ~/.ssh/id_match

Host *
    User fallback
    IdentityFile ~/.ssh/id_default
"#;

    #[test]
    fn first_value_wins() {
        let config = SshConfig::parse(CONFIG).lookup("example.com");
        assert_eq!(config.get("user"), Some("alice"));
        assert_eq!(config.get("ServerAliveInterval"), Some("60"));

        let config = SshConfig::parse(CONFIG).lookup("other.net");
        assert_eq!(config.get("user"), Some("fallback"));
    }

    #[test]
    fn identity_files_accumulate() {
        let config = SshConfig::parse(CONFIG).lookup("example.com");
        assert_eq!(config.identity_files, vec!["~/.ssh/id_a", "~/.ssh/id_default"]);
        assert_eq!(
            config.identity_file(IdentitySelection::First),
            Some("~/.ssh/id_a")
        );
        assert_eq!(
            config.identity_file(IdentitySelection::Last),
            Some("~/.ssh/id_default")
        );
    }

    #[test]
    fn wildcards_and_negation() {
        let parsed = SshConfig::parse(CONFIG);

        let config = parsed.lookup("db1.corp.example");
        assert_eq!(config.identity_files[0], "~/.ssh/id_corp");
        assert_eq!(config.get("port"), Some("2222"));

        let config = parsed.lookup("bastion.corp.example");
        assert_eq!(config.identity_files[0], "~/.ssh/id bastion");
        assert_eq!(config.get("port"), None);
    }

    #[test]
    fn case_insensitive_match() {
        let config = SshConfig::parse(CONFIG).lookup("EXAMPLE.com");
        assert_eq!(config.identity_files[0], "~/.ssh/id_a");
    }

    #[test]
    fn no_identity() {
        let config = SshConfig::parse("Host plain\n    User bob\n").lookup("plain");
        assert!(config.identity_files.is_empty());
        assert_eq!(config.identity_file(IdentitySelection::Last), None);
    }

    #[test]
    fn identity_none_ignored() {
        let config = SshConfig::parse("Host x\n    IdentityFile none\n").lookup("x");
        assert!(config.identity_files.is_empty());
    }

    #[test]
    fn question_mark_and_brackets() {
        let parsed = SshConfig::parse("Host web? [lit]\n    IdentityFile ~/k\n");
        assert_eq!(parsed.lookup("web1").identity_files.len(), 1);
        assert_eq!(parsed.lookup("web12").identity_files.len(), 0);
        assert_eq!(parsed.lookup("[lit]").identity_files.len(), 1);
        assert_eq!(parsed.lookup("l").identity_files.len(), 0);
    }

    #[test]
    fn directive_forms() {
        assert_eq!(split_directive("User bob"), Some(("User", "bob")));
        assert_eq!(split_directive("User=bob"), Some(("User", "bob")));
        assert_eq!(split_directive("User = bob"), Some(("User", "bob")));
        assert_eq!(
            split_directive("IdentityFile ~/.ssh/a=b"),
            Some(("IdentityFile", "~/.ssh/a=b"))
        );
        assert_eq!(split_directive("Lonely"), None);
    }

    #[test]
    fn token_expansion() {
        let tokens = Tokens {
            home: Some(Path::new("/home/me")),
            host: "db.example.com",
            remote_user: Some("admin"),
            local_user: Some("me"),
        };
        assert_eq!(expand("~/.ssh/id_a", &tokens), "/home/me/.ssh/id_a");
        assert_eq!(expand("~", &tokens), "/home/me");
        assert_eq!(expand("~other/key", &tokens), "~other/key");
        assert_eq!(
            expand("%d/.ssh/%r@%h-%u", &tokens),
            "/home/me/.ssh/admin@db.example.com-me"
        );
        assert_eq!(expand("/keys/100%%/%z/%", &tokens), "/keys/100%/%z/%");
    }

    #[test]
    fn hostname_expands_alias() {
        let parsed = SshConfig::parse(
            "Host db\n    HostName %h.internal\n\nHost web\n    HostName 10.0.0.7\n",
        );
        assert_eq!(parsed.lookup("db").hostname("db"), "db.internal");
        assert_eq!(parsed.lookup("web").hostname("web"), "10.0.0.7");
        assert_eq!(parsed.lookup("other").hostname("other"), "other");
    }

    #[test]
    fn token_without_value_kept() {
        let tokens = Tokens {
            host: "h",
            ..Tokens::default()
        };
        assert_eq!(expand("~/.ssh/%u", &tokens), "~/.ssh/%u");
    }
}
