//! Global configuration parsing and validation.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Settings for the agent served by this process.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Display name attached to the response identity.
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// Upper bound on one agent computation; 0 means no timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Processor id used when a request carries no session.
    #[serde(default = "default_processor_id")]
    pub default_processor_id: String,
    /// Pause between streamed chunks of the demo agent.
    #[serde(default)]
    pub chunk_delay_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            timeout_seconds: default_timeout_seconds(),
            default_processor_id: default_processor_id(),
            chunk_delay_ms: 0,
        }
    }
}

/// Settings for the SSE response stream.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamConfig {
    /// Interval between keep-alive comments on idle connections.
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive_seconds: default_keep_alive_seconds(),
        }
    }
}

fn default_agent_name() -> String {
    "Echo Agent".into()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_processor_id() -> String {
    "anonymous-client".into()
}

fn default_keep_alive_seconds() -> u64 {
    15
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}

fn default_http_port() -> u16 {
    8000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Interface the HTTP transport binds to.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// Port the HTTP transport binds to.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Agent identity and scheduling settings.
    #[serde(default)]
    pub agent: AgentConfig,
    /// SSE stream settings.
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            agent: AgentConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Socket address the HTTP transport binds to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `http_host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .http_host
            .parse()
            .map_err(|err| AppError::Config(format!("http_host invalid: {err}")))?;
        Ok(SocketAddr::new(ip, self.http_port))
    }

    /// Agent computation timeout, or `None` when disabled.
    #[must_use]
    pub fn agent_timeout(&self) -> Option<Duration> {
        match self.agent.timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Keep-alive interval for idle SSE connections.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.stream.keep_alive_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.agent.name.trim().is_empty() {
            return Err(AppError::Config("agent.name must not be empty".into()));
        }

        if self.agent.default_processor_id.trim().is_empty() {
            return Err(AppError::Config(
                "agent.default_processor_id must not be empty".into(),
            ));
        }

        if self.stream.keep_alive_seconds == 0 {
            return Err(AppError::Config(
                "stream.keep_alive_seconds must be greater than zero".into(),
            ));
        }

        self.bind_addr()?;

        Ok(())
    }
}
