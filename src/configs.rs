// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Configuration
//!
//! Immutable settings for the topology manager: management API credentials and
//! address, the root and output exchanges, the exchange namespace prefix, the
//! virtual host and the schema timestamp attribute.
//!
//! Settings are read from a YAML file and then overridden by environment variables.
//! YAML keys use the camelCase names (`serverHost`, `exchangePrefix`, ...).

use crate::errors::AdminError;
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::debug;

/// Environment variable holding the path of the YAML configuration file
pub const TOPOLOGY_CONFIG_ENV: &str = "TOPOLOGY_CONFIG";
/// Configuration file used when `TOPOLOGY_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "topology.yaml";

/// Settings shared by the management client and the topology manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopologyConfigs {
    pub server_username: String,
    pub server_password: String,
    pub server_host: String,
    pub server_port: u16,
    /// Root exchange every managed exchange is bound to.
    pub exchange_name: String,
    /// Default source exchange for new queues.
    pub output_exchange_name: String,
    /// Namespace prefix of managed exchanges.
    pub exchange_prefix: String,
    pub vhost: String,
    /// Schema attribute reported as `timestamp`.
    pub timestamp_attribute: String,
    /// Per-request timeout of the HTTP transport, in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl Default for TopologyConfigs {
    fn default() -> Self {
        Self {
            server_username: "guest".to_owned(),
            server_password: "guest".to_owned(),
            server_host: "localhost".to_owned(),
            server_port: 15672,
            exchange_name: "root_exchange".to_owned(),
            output_exchange_name: "output_exchange".to_owned(),
            exchange_prefix: "managed".to_owned(),
            vhost: "/".to_owned(),
            timestamp_attribute: "timestamp".to_owned(),
            request_timeout_secs: None,
        }
    }
}

impl TopologyConfigs {
    /// Loads the configuration.
    ///
    /// Reads the file named by `TOPOLOGY_CONFIG` (or `topology.yaml`), falls back to
    /// defaults when that file does not exist, then applies environment overrides.
    pub fn load() -> Result<Self, AdminError> {
        let path = std::env::var(TOPOLOGY_CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());

        let mut cfg = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            debug!(path = path, "configuration file not found, using defaults");
            Self::default()
        };

        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads the configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, AdminError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AdminError::Config(format!("{}: {}", path, e)))?;
        Self::from_yaml(&content)
    }

    /// Parses the configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, AdminError> {
        serde_yaml::from_str(content).map_err(|e| AdminError::Config(e.to_string()))
    }

    /// Overrides settings with the values returned by `lookup`.
    ///
    /// # Parameters
    /// * `lookup` - Resolves an environment variable name to its value
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AdminError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RABBITMQ_USER") {
            self.server_username = v;
        }
        if let Some(v) = lookup("RABBITMQ_PASSWORD") {
            self.server_password = v;
        }
        if let Some(v) = lookup("RABBITMQ_HOST") {
            self.server_host = v;
        }
        if let Some(v) = lookup("RABBITMQ_MANAGEMENT_PORT") {
            self.server_port = v
                .parse()
                .map_err(|_| AdminError::Config(format!("invalid port `{}`", v)))?;
        }
        if let Some(v) = lookup("RABBITMQ_VHOST") {
            self.vhost = v;
        }
        if let Some(v) = lookup("TOPOLOGY_EXCHANGE") {
            self.exchange_name = v;
        }
        if let Some(v) = lookup("TOPOLOGY_OUTPUT_EXCHANGE") {
            self.output_exchange_name = v;
        }
        if let Some(v) = lookup("TOPOLOGY_EXCHANGE_PREFIX") {
            self.exchange_prefix = v;
        }
        if let Some(v) = lookup("TOPOLOGY_TIMESTAMP_ATTRIBUTE") {
            self.timestamp_attribute = v;
        }
        if let Some(v) = lookup("TOPOLOGY_REQUEST_TIMEOUT") {
            let secs = v
                .parse()
                .map_err(|_| AdminError::Config(format!("invalid timeout `{}`", v)))?;
            self.request_timeout_secs = Some(secs);
        }

        Ok(())
    }

    /// Rejects settings the topology manager cannot work with.
    pub fn validate(&self) -> Result<(), AdminError> {
        if self.server_host.is_empty() {
            return Err(AdminError::Config("serverHost is empty".to_owned()));
        }
        if self.exchange_prefix.is_empty() {
            return Err(AdminError::Config("exchangePrefix is empty".to_owned()));
        }
        if self.exchange_name.is_empty() {
            return Err(AdminError::Config("exchangeName is empty".to_owned()));
        }
        Ok(())
    }

    /// Base URL of the management API.
    pub fn management_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
