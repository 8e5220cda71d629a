//! Client configuration.

use devauth_transport::{Backend, CallerInfo};
use devauth_types::DEVICE_AUTH_INTERFACE_TOKEN;
use std::env;
use std::time::Duration;

/// Default bound for a synchronous method call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Transport profile of the service
    pub backend: Backend,

    /// How long a synchronous method call may block
    pub call_timeout: Duration,

    /// Interface descriptor attached to every request
    pub interface_token: String,

    /// Identity attached to every request
    pub caller: CallerInfo,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Standard,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            interface_token: DEVICE_AUTH_INTERFACE_TOKEN.to_string(),
            caller: CallerInfo {
                uid: 0,
                pid: std::process::id(),
            },
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DEVAUTH_BACKEND`: `lite` or `standard` (default: standard)
    /// - `DEVAUTH_CALL_TIMEOUT_MS`: sync call bound (default: 20000)
    /// - `DEVAUTH_INTERFACE_TOKEN`: interface descriptor
    /// - `DEVAUTH_CALLER_UID`: caller uid (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("DEVAUTH_BACKEND")
                .ok()
                .and_then(|v| Backend::from_name(&v))
                .unwrap_or(defaults.backend),
            call_timeout: env::var("DEVAUTH_CALL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            interface_token: env::var("DEVAUTH_INTERFACE_TOKEN").unwrap_or(defaults.interface_token),
            caller: CallerInfo {
                uid: env::var("DEVAUTH_CALLER_UID")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.caller.uid),
                pid: defaults.caller.pid,
            },
        }
    }
}
