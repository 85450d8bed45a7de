//! Configuration loading, RON-based like the teacher's `config/loader.rs`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FILENAMES: &[&str] = &["git-http.ron", ".git-http/config.ron"];

/// One statically-configured credential. Passwords are compared verbatim;
/// this is a minimal bundled `AuthZ`, not a credential store.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RepoAccess {
    /// `owner/repo`.
    pub full_name: String,
    #[serde(default)]
    pub public: bool,
    /// Usernames (from `credentials`) allowed to read a non-public repo.
    #[serde(default)]
    pub readers: Vec<String>,
    /// Usernames allowed to push.
    #[serde(default)]
    pub writers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Timeouts {
    #[serde(default = "Timeouts::default_read_secs")]
    pub read_secs: u64,
    #[serde(default = "Timeouts::default_index_secs")]
    pub index_secs: u64,
    #[serde(default = "Timeouts::default_receive_pack_secs")]
    pub receive_pack_secs: u64,
}

impl Timeouts {
    fn default_read_secs() -> u64 {
        60
    }
    fn default_index_secs() -> u64 {
        120
    }
    fn default_receive_pack_secs() -> u64 {
        600
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            read_secs: Self::default_read_secs(),
            index_secs: Self::default_index_secs(),
            receive_pack_secs: Self::default_receive_pack_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default = "Config::default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "Config::default_repos_root")]
    pub repos_root: PathBuf,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub repos: Vec<RepoAccess>,
    #[serde(default = "Config::default_max_body_bytes")]
    pub git_max_body_bytes: usize,
}

impl Config {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }
    fn default_repos_root() -> PathBuf {
        PathBuf::from("./repos")
    }
    fn default_max_body_bytes() -> usize {
        512 * 1024 * 1024
    }

    pub fn repo_access(&self, full_name: &str) -> Option<&RepoAccess> {
        self.repos.iter().find(|r| r.full_name == full_name)
    }

    pub fn credential_map(&self) -> HashMap<&str, &str> {
        self.credentials.iter().map(|c| (c.username.as_str(), c.password.as_str())).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: Self::default_listen_addr(),
            repos_root: Self::default_repos_root(),
            timeouts: Timeouts::default(),
            credentials: Vec::new(),
            repos: Vec::new(),
            git_max_body_bytes: Self::default_max_body_bytes(),
        }
    }
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    ron::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Search, in order: `GIT_HTTP_CONFIG_PATH` env var, then the standard
/// filenames relative to the working directory, then fall back to defaults.
pub fn load_with_discovery() -> Result<Config> {
    if let Ok(env_path) = std::env::var("GIT_HTTP_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            tracing::info!("loading config from GIT_HTTP_CONFIG_PATH: {}", path.display());
            return load_from_file(&path);
        }
        tracing::warn!("GIT_HTTP_CONFIG_PATH set but file not found: {}", path.display());
    }

    for filename in CONFIG_FILENAMES {
        let path = PathBuf::from(filename);
        if path.exists() {
            tracing::info!("loading config from {}", path.display());
            return load_from_file(&path);
        }
    }

    tracing::info!("no config file found, using defaults");
    Ok(Config::default())
}
