//! Server process configuration.
//!
//! # Example
//!
//! ```
//! use gen_server::ServerConfig;
//!
//! let config = ServerConfig::default()
//!     .with_name("kv-store")
//!     .with_request_capacity(128);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::ConfigError;
use crate::{DEFAULT_REQUEST_CAPACITY, DEFAULT_RESPONSE_CAPACITY, MAX_CAPACITY};
use serde::{Deserialize, Serialize};
use std::env;

/// Mailbox sizing and identity of one server process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name used in log fields
    pub name: String,
    /// Pending requests the mailbox holds before producers are suspended
    pub request_capacity: usize,
    /// Completed responses buffered before the dispatch loop is suspended
    pub response_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "gen-server".to_string(),
            request_capacity: DEFAULT_REQUEST_CAPACITY,
            response_capacity: DEFAULT_RESPONSE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `GEN_SERVER_NAME`: Name in log fields (default: gen-server)
    /// - `GEN_SERVER_REQUEST_CAPACITY`: Request mailbox capacity (default: 4096)
    /// - `GEN_SERVER_RESPONSE_CAPACITY`: Response queue capacity (default: 4096)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            name: env::var("GEN_SERVER_NAME").unwrap_or(defaults.name),
            request_capacity: capacity_from_env(
                "GEN_SERVER_REQUEST_CAPACITY",
                defaults.request_capacity,
            )?,
            response_capacity: capacity_from_env(
                "GEN_SERVER_RESPONSE_CAPACITY",
                defaults.response_capacity,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject capacities the bounded channels cannot be built with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_capacity("request", self.request_capacity)?;
        check_capacity("response", self.response_capacity)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_request_capacity(mut self, capacity: usize) -> Self {
        self.request_capacity = capacity;
        self
    }

    pub fn with_response_capacity(mut self, capacity: usize) -> Self {
        self.response_capacity = capacity;
        self
    }
}

fn check_capacity(which: &'static str, capacity: usize) -> Result<(), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::ZeroCapacity { which });
    }
    if capacity > MAX_CAPACITY {
        return Err(ConfigError::CapacityTooLarge {
            which,
            capacity,
            max: MAX_CAPACITY,
        });
    }
    Ok(())
}

fn capacity_from_env(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
        Err(_) => Ok(default),
    }
}
