//! # Cache Telemetry
//!
//! Logging bootstrap for the packet cache binaries.
//!
//! The engine crates only emit `tracing` events. This crate decides where
//! they go: human-readable lines for development, JSON lines for log
//! shippers in containers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cache_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//!     // events are now written according to the configuration
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `UMPS_SERVICE_NAME` | `umps-packet-cache` | Service name in log lines |
//! | `UMPS_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directive |
//! | `UMPS_CONSOLE_OUTPUT` | `true` | Write logs at all |
//! | `UMPS_JSON_LOGS` | `false` (`true` in containers) | JSON lines |

mod config;
mod subscriber;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use subscriber::build_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install the global subscriber described by `config`.
///
/// Returns a guard that should be held for the lifetime of the application.
/// Fails if the filter directive does not parse or a subscriber is already
/// installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.service_name.trim().is_empty() {
        return Err(TelemetryError::Config("service name is empty".to_string()));
    }

    subscriber::install(config)?;

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_service_name_rejected() {
        let config = TelemetryConfig {
            service_name: "  ".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            init_telemetry(&config),
            Err(TelemetryError::Config(_))
        ));
    }

    // The global subscriber can only be set once per process, so both
    // outcomes are exercised in a single test.
    #[test]
    fn test_init_once() {
        let config = TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::default()
        };
        let guard = init_telemetry(&config).unwrap();
        assert_eq!(guard.service_name(), DEFAULT_SERVICE_NAME);

        assert!(matches!(
            init_telemetry(&config),
            Err(TelemetryError::AlreadyInitialized(_))
        ));
    }
}
