//! `AuthZ`: `(owner, repo, operation, credentials?) -> allow|deny` (spec §1, §6).
//!
//! This is the minimal concrete implementation `crates/server` bundles, one
//! of two external collaborators spec.md names but leaves unspecified (the
//! other is `ObjectStore`, in `storage.rs`). Credentials are matched against
//! the static list in `Config`; never logged.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait AuthZ: Send + Sync {
    async fn check(
        &self,
        owner: &str,
        repo: &str,
        op: Operation,
        credentials: Option<&BasicCredentials>,
    ) -> bool;
}

/// Backed by the static credential/access list in `Config`, the way the
/// teacher's bundled auth (`auth/store.rs`) is backed by a concrete store
/// rather than a remote IdP for the default deployment path.
pub struct StaticAuthz {
    config: Arc<Config>,
}

impl StaticAuthz {
    pub fn new(config: Arc<Config>) -> Self {
        StaticAuthz { config }
    }

    fn authenticated_user(&self, credentials: Option<&BasicCredentials>) -> Option<String> {
        let creds = credentials?;
        let expected = self.config.credential_map();
        match expected.get(creds.username.as_str()) {
            Some(password) if *password == creds.password => Some(creds.username.clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl AuthZ for StaticAuthz {
    async fn check(
        &self,
        owner: &str,
        repo: &str,
        op: Operation,
        credentials: Option<&BasicCredentials>,
    ) -> bool {
        let full_name = format!("{owner}/{repo}");
        let access = self.config.repo_access(&full_name);
        let user = self.authenticated_user(credentials);

        match op {
            Operation::Read => {
                if access.map(|a| a.public).unwrap_or(false) {
                    return true;
                }
                match (access, &user) {
                    (Some(a), Some(u)) => a.readers.contains(u) || a.writers.contains(u),
                    _ => false,
                }
            }
            Operation::Write => match (access, &user) {
                (Some(a), Some(u)) => a.writers.contains(u),
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, RepoAccess};

    fn config() -> Arc<Config> {
        Arc::new(Config {
            credentials: vec![
                Credential { username: "alice".into(), password: "s3cret".into() },
                Credential { username: "bob".into(), password: "hunter2".into() },
            ],
            repos: vec![
                RepoAccess { full_name: "alice/demo".into(), public: false, readers: vec![], writers: vec!["alice".into()] },
                RepoAccess { full_name: "alice/open".into(), public: true, readers: vec![], writers: vec!["alice".into()] },
            ],
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn public_repo_is_readable_anonymously() {
        let authz = StaticAuthz::new(config());
        assert!(authz.check("alice", "open", Operation::Read, None).await);
    }

    #[tokio::test]
    async fn private_repo_denies_anonymous_read() {
        let authz = StaticAuthz::new(config());
        assert!(!authz.check("alice", "demo", Operation::Read, None).await);
    }

    #[tokio::test]
    async fn writer_credentials_allow_write() {
        let authz = StaticAuthz::new(config());
        let creds = BasicCredentials { username: "alice".into(), password: "s3cret".into() };
        assert!(authz.check("alice", "demo", Operation::Write, Some(&creds)).await);
    }

    #[tokio::test]
    async fn non_writer_credentials_deny_write() {
        let authz = StaticAuthz::new(config());
        let creds = BasicCredentials { username: "bob".into(), password: "hunter2".into() };
        assert!(!authz.check("alice", "demo", Operation::Write, Some(&creds)).await);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let authz = StaticAuthz::new(config());
        let creds = BasicCredentials { username: "alice".into(), password: "wrong".into() };
        assert!(!authz.check("alice", "demo", Operation::Write, Some(&creds)).await);
    }
}
