// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use log::debug;

/// Extract the host alias from an ssh-style destination, so it can be looked up in the ssh
/// configuration.
///
/// Strips, in this order: a `user@` prefix, a literal `ssh://` scheme, and a `:port` suffix.
pub fn get_host(destination: &str) -> &str {
    let host = match destination.rsplit_once('@') {
        Some((_, host)) => host,
        None => destination,
    };
    let host = host.strip_prefix("ssh://").unwrap_or(host);
    let host = match host.split_once(':') {
        Some((host, _port)) => host,
        None => host,
    };
    debug!("Hostname is {host}");
    host
}

/// The `user@` part of an ssh-style destination, if it has one.
pub fn get_user(destination: &str) -> Option<&str> {
    let destination = destination.strip_prefix("ssh://").unwrap_or(destination);
    destination
        .rsplit_once('@')
        .map(|(user, _)| user)
        .filter(|user| !user.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain() {
        assert_eq!(get_host("host"), "host");
        assert_eq!(get_host("example.com"), "example.com");
    }

    #[test]
    fn with_user() {
        assert_eq!(get_host("user@host:2222"), "host");
        assert_eq!(get_host("test@example.com"), "example.com");
        assert_eq!(get_host("test@example.com:2222"), "example.com");
        assert_eq!(get_host("test@example:2222"), "example");
    }

    #[test]
    fn with_scheme() {
        assert_eq!(get_host("ssh://host"), "host");
        assert_eq!(get_host("ssh://example.com:2222"), "example.com");
        assert_eq!(get_host("ssh://test@example.com"), "example.com");
        assert_eq!(get_host("ssh://test@example.com:2222"), "example.com");
    }

    #[test]
    fn user_containing_at_sign() {
        assert_eq!(get_host("first.last@corp@bastion"), "bastion");
    }

    #[test]
    fn destination_user() {
        assert_eq!(get_user("host"), None);
        assert_eq!(get_user("me@host:2222"), Some("me"));
        assert_eq!(get_user("ssh://me@host"), Some("me"));
        assert_eq!(get_user("first.last@corp@bastion"), Some("first.last@corp"));
        assert_eq!(get_user("@host"), None);
    }
}
