// Daemon configuration: `~/.atelier/config.toml`, then environment overrides.
//
//   ATELIER_LISTEN_ADDR              content server bind address
//   ATELIER_CONTENT_SECURITY_POLICY  CSP sent with every content response
//   ATELIER_SCOPE_CACHE_CAPACITY     max cached scopes
//   ATELIER_OWNER_ID                 owner whose workspaces are served

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use atelier_common::types::OwnerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::scope::DEFAULT_SCOPE_CACHE_CAPACITY;
use crate::security::write_private;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9340";
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str =
    "default-src 'self' 'unsafe-inline' data: blob:; object-src 'none'; frame-ancestors 'self'";

/// Root directory for atelier state: `~/.atelier/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".atelier"))
}

/// `~/.atelier/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub listen_addr: SocketAddr,
    pub content_security_policy: String,
    pub scope_cache_capacity: usize,
    pub owner_id: OwnerId,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            content_security_policy: DEFAULT_CONTENT_SECURITY_POLICY.to_string(),
            scope_cache_capacity: DEFAULT_SCOPE_CACHE_CAPACITY,
            owner_id: 0,
        }
    }
}

impl DaemonConfig {
    /// Load `~/.atelier/config.toml` and apply environment overrides. A
    /// missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        let from_file = match global_config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|error| {
                warn!(path = %path.display(), %error, "ignoring invalid config file");
                Self::default()
            }),
            _ => Self::default(),
        };
        from_file.with_env_overrides(|key| std::env::var(key))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or(ConfigError::NoHomeDir)?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_private(path, contents.as_bytes()).map_err(ConfigError::Write)
    }

    /// Apply `ATELIER_*` overrides read through `env`. Unparseable values
    /// are logged and skipped.
    pub fn with_env_overrides<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Ok(value) = env("ATELIER_LISTEN_ADDR") {
            match value.parse() {
                Ok(addr) => self.listen_addr = addr,
                Err(_) => warn!(value = %value, "ignoring invalid ATELIER_LISTEN_ADDR"),
            }
        }
        if let Ok(value) = env("ATELIER_CONTENT_SECURITY_POLICY") {
            self.content_security_policy = value;
        }
        if let Ok(value) = env("ATELIER_SCOPE_CACHE_CAPACITY") {
            match value.parse() {
                Ok(capacity) => self.scope_cache_capacity = capacity,
                Err(_) => warn!(value = %value, "ignoring invalid ATELIER_SCOPE_CACHE_CAPACITY"),
            }
        }
        if let Ok(value) = env("ATELIER_OWNER_ID") {
            match value.parse() {
                Ok(owner_id) => self.owner_id = owner_id,
                Err(_) => warn!(value = %value, "ignoring invalid ATELIER_OWNER_ID"),
            }
        }
        self
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9340))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config write error: {0:#}")]
    Write(anyhow::Error),

    #[error("could not determine home directory")]
    NoHomeDir,
}
