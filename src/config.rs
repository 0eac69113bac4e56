//! LETHE - Store Configuration
//! Defines tunable parameters for the store and its network listener.

use std::path::PathBuf;

use crate::error::{LetheError, Result};

/// Environment variable overriding [`Config::listen_addr`].
pub const ENV_ADDR: &str = "LETHE_ADDR";
/// Environment variable overriding [`Config::max_key_len`].
pub const ENV_MAX_KEY_LEN: &str = "LETHE_MAX_KEY_LEN";
/// Environment variable overriding [`Config::snapshot_dir`].
pub const ENV_SNAPSHOT_DIR: &str = "LETHE_SNAPSHOT_DIR";

/// Configuration for the Lethe store.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address the server binds to.
    pub listen_addr: String,

    /// Longest accepted key, in bytes.
    pub max_key_len: usize,

    /// Directory receiving timestamped snapshots (`SNAPSHOT` command).
    pub snapshot_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            max_key_len: 250,
            snapshot_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(addr) = lookup(ENV_ADDR) {
            self.listen_addr = addr;
        }
        if let Some(raw) = lookup(ENV_MAX_KEY_LEN) {
            self.max_key_len = raw
                .trim()
                .parse()
                .map_err(|_| LetheError::Config(format!("{ENV_MAX_KEY_LEN}={raw} is not a number")))?;
        }
        if let Some(dir) = lookup(ENV_SNAPSHOT_DIR) {
            self.snapshot_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Set the listen address.
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the maximum key length.
    pub fn with_max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len;
        self
    }

    /// Set the snapshot directory.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Ensure the snapshot directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.snapshot_dir)
    }
}
