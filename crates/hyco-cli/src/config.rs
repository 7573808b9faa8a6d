//! Configuration at `~/.hyco/config.toml`.
//!
//! Holds the relay coordinates and listener cadence. CLI flags always
//! override config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use hyco_client::SessionConfig;
use hyco_core::RelayEndpoint;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub listener: ListenerConfig,
}

/// Where and how to reach the relay.
#[derive(Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Namespace host, e.g. `contoso.servicebus.windows.net`.
    #[serde(default)]
    pub namespace: String,

    /// Hybrid connection name.
    #[serde(default)]
    pub path: String,

    /// Shared access policy name.
    #[serde(default = "default_key_rule")]
    pub key_rule: String,

    #[serde(default)]
    pub key: String,

    #[serde(default = "default_client_auth_required")]
    pub client_auth_required: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            path: String::new(),
            key_rule: default_key_rule(),
            key: String::new(),
            client_auth_required: default_client_auth_required(),
        }
    }
}

// Hand-written so the key stays out of debug logs.
impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .field("key_rule", &self.key_rule)
            .field("client_auth_required", &self.client_auth_required)
            .finish_non_exhaustive()
    }
}

/// Listener cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Must stay below the 3600 s token lifetime.
    #[serde(default = "default_renew_interval_secs")]
    pub renew_interval_secs: u64,

    /// Outbound frames buffered per session.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            renew_interval_secs: default_renew_interval_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_key_rule() -> String {
    "RootManageSharedAccessKey".to_string()
}

fn default_client_auth_required() -> bool {
    true
}

fn default_ping_interval_secs() -> u64 {
    15
}

fn default_renew_interval_secs() -> u64 {
    3540
}

fn default_queue_capacity() -> usize {
    5
}

impl RelayConfig {
    pub fn endpoint(&self) -> RelayEndpoint {
        let mut endpoint = RelayEndpoint::new(
            self.namespace.clone(),
            self.path.clone(),
            self.key_rule.clone(),
            self.key.clone(),
        );
        endpoint.client_auth_required = self.client_auth_required;
        endpoint
    }
}

impl ListenerConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            renew_interval: Duration::from_secs(self.renew_interval_secs),
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.session_config()
            .validate()
            .context("invalid [listener] settings")
    }
}

impl Config {
    /// `~/.hyco/config.toml`, or a relative path if there is no home.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".hyco")
            .join("config.toml")
    }

    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), relay = ?config.relay, "loaded config");
        Ok(config)
    }
}
