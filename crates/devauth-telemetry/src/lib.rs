//! # Device-Auth Telemetry
//!
//! Logging and metrics for the service and the client SDK.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devauth_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::for_component("service");
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DEVAUTH_SERVICE_NAME` | `device-auth` | Service name in log records |
//! | `DEVAUTH_LOG_LEVEL` | `info` | Log level filter, falls back to `RUST_LOG` |
//! | `DEVAUTH_JSON_LOGS` | `false` | JSON formatted logs |
//! | `DEVAUTH_CONSOLE_OUTPUT` | `true` | Console output |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_text, register_metrics, CALLBACK_INVOCATIONS, DEATH_NOTIFICATIONS, IPC_REQUESTS, REGISTRY_RECORDS,
    REMOTE_SLOTS_IN_USE,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Registers metrics, then installs the logging subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}
