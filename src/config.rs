// =====================================================
// CONNECTION CONFIGURATION
// =====================================================

use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8123
}

fn default_database() -> String {
    "default".to_string()
}

fn default_username() -> String {
    "default".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn parse(value: &str) -> Result<Protocol> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(TransferError::validation(format!(
                "Unsupported protocol '{}'",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_username")]
    pub username: String,
    /// Password or access token; may be empty.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub protocol: Protocol,
    /// Per-request timeout. Unset means requests may wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            username: default_username(),
            token: String::new(),
            protocol: Protocol::default(),
            timeout_secs: None,
        }
    }
}

impl ConnectionConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: ConnectionConfig = serde_json::from_str(raw)
            .map_err(|e| TransferError::validation(format!("Invalid connection profile: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TransferError::validation(format!(
                "Failed to read connection profile '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TransferError::validation("host is required"));
        }
        if self.port == 0 {
            return Err(TransferError::validation("port must be greater than zero"));
        }
        if self.username.trim().is_empty() {
            return Err(TransferError::validation("username is required"));
        }
        if self.timeout_secs == Some(0) {
            return Err(TransferError::validation(
                "timeoutSecs must be greater than zero when set",
            ));
        }
        Ok(())
    }

    /// Base URL of the HTTP interface. A host that already carries a scheme
    /// keeps it.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port)
        } else {
            format!("{}://{}:{}", self.protocol.as_str(), host, self.port)
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
