//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration for a device-auth process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to log records
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to write logs to the console at all
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "device-auth".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DEVAUTH_SERVICE_NAME`: Service name (default: device-auth)
    /// - `DEVAUTH_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `DEVAUTH_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `DEVAUTH_CONSOLE_OUTPUT`: Enable console output (default: true)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("DEVAUTH_SERVICE_NAME").unwrap_or_else(|_| "device-auth".to_string()),

            log_level: env::var("DEVAUTH_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("DEVAUTH_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            console_output: env::var("DEVAUTH_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Configuration for one side of the IPC boundary.
    pub fn for_component(component: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("{}-{}", config.service_name, component);
        config
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
