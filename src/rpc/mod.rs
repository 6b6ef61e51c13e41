//! Transmission daemon JSON-RPC client core
//!
//! Requests travel as `{method, arguments, tag}` envelopes. Responses are
//! decoded into a dynamic map first and then projected onto typed entities
//! against an explicit field shape, so an attribute the caller did not ask
//! for stays distinguishable from one the daemon sent with the wrong type.
//! Session expiry is handled transparently with a single retry, and tags
//! route concurrent responses back to their callers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod client;
pub mod entity;
pub mod enums;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod projector;
pub mod requests;
pub mod session;
pub mod tags;
pub mod transport;

pub use client::RpcClient;
pub use entity::{TorrentAdded, TorrentInfo, TorrentsResult};
pub use envelope::{Arguments, Envelope};
pub use error::{ProjectionError, RegistryError, RpcError, RpcResult, TransportError};
pub use fields::{EntityKind, FieldRegistry, WireType};
pub use projector::{Field, Projectable, Shape, project, project_many};
pub use requests::{TorrentAction, TorrentAddRequest, TorrentGetRequest, TorrentIds, TorrentRef, TorrentRemoveRequest};
pub use session::SessionState;
pub use tags::TagCorrelator;
pub use transport::{HttpTransport, Transport, TransportReply};

/// Default RPC endpoint of a local daemon
pub const DEFAULT_URL: &str = "http://127.0.0.1:9091/transmission/rpc";

/// Header carrying the session token in both directions
pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";

/// Environment variable overriding [`ClientConfig::url`]
pub const ENV_URL: &str = "TRANSMISSION_RPC_URL";
/// Environment variable overriding [`ClientConfig::username`]
pub const ENV_USERNAME: &str = "TRANSMISSION_RPC_USERNAME";
/// Environment variable overriding [`ClientConfig::password`]
pub const ENV_PASSWORD: &str = "TRANSMISSION_RPC_PASSWORD";

/// Connection settings for an [`RpcClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// RPC endpoint URL
    pub url: String,

    /// Basic-auth user name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic-auth password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Per-attempt HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Session header name
    pub session_header: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            session_header: SESSION_HEADER.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("Failed to read config: {:?}", path))?;
        let config = serde_json::from_slice(&data).context("Failed to deserialize config")?;
        Ok(config)
    }

    /// Write configuration as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize config")?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;
        Ok(())
    }

    /// Apply `TRANSMISSION_RPC_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = value(ENV_URL) {
            self.url = url;
        }
        if let Some(username) = value(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Some(password) = value(ENV_PASSWORD) {
            self.password = Some(password);
        }
        self
    }
}
