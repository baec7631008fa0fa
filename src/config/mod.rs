// src/config/mod.rs
use std::time::Duration;

use tracing::{error, warn};

use crate::error::ConfigError;

const DEFAULT_BALANCER_PORT: u16 = 8000;
const DEFAULT_HTTP_TIMEOUT_MINUTES: u64 = 1;

/// Configuration read once at startup from the process environment.
///
/// There is no file-based configuration surface: the balancer takes exactly
/// three environment variables, each with its own fatal-vs-warn-and-default
/// behavior, which is simpler to express as direct lookups than as a
/// deserialized layer.
#[derive(Debug, Clone)]
pub struct Config {
    pub label_selector: String,
    pub balancer_port: u16,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `VAULT_LABEL_SELECTOR` is required; its absence is fatal. `BALANCER_PORT`
    /// and `HTTP_TIMEOUT` fall back to defaults with a warning if absent or
    /// unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let label_selector = match std::env::var("VAULT_LABEL_SELECTOR") {
            Ok(value) => value,
            Err(_) => {
                error!("no label selector has been provided; please set VAULT_LABEL_SELECTOR");
                return Err(ConfigError::MissingLabelSelector);
            }
        };

        let balancer_port = std::env::var("BALANCER_PORT")
            .ok()
            .and_then(|raw| raw.parse::<u16>().ok())
            .unwrap_or_else(|| {
                warn!(
                    default = DEFAULT_BALANCER_PORT,
                    "BALANCER_PORT is not specified or invalid; using the default"
                );
                DEFAULT_BALANCER_PORT
            });

        let http_timeout_minutes = std::env::var("HTTP_TIMEOUT")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or_else(|| {
                warn!(
                    default_minutes = DEFAULT_HTTP_TIMEOUT_MINUTES,
                    "HTTP_TIMEOUT is not specified or invalid; using the default"
                );
                DEFAULT_HTTP_TIMEOUT_MINUTES
            });

        Ok(Self {
            label_selector,
            balancer_port,
            http_timeout: Duration::from_secs(http_timeout_minutes * 60),
        })
    }
}
