//! Service configuration.

use crate::domain::errors::ServiceError;
use devauth_transport::Backend;
use devauth_types::{DEVICE_AUTH_INTERFACE_TOKEN, IPC_CALL_BACK_MAX_NODES};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default bound for synchronous reverse calls.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(20);

/// Runtime parameters of the device-auth service.
///
/// Missing fields take their [`Default`] values when loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Transport profile the service is published on
    pub backend: Backend,

    /// Capacity of the callback registry
    pub max_callbacks: usize,

    /// Capacity of the remote object slot table
    pub max_remote_objects: usize,

    /// How long synchronous reverse calls may block
    pub callback_timeout: Duration,

    /// Interface descriptor requests must carry
    pub interface_token: String,

    /// Caller uids allowed to use the service; empty admits everyone
    pub allowed_uids: Vec<u32>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Standard,
            max_callbacks: IPC_CALL_BACK_MAX_NODES,
            max_remote_objects: IPC_CALL_BACK_MAX_NODES,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            interface_token: DEVICE_AUTH_INTERFACE_TOKEN.to_string(),
            allowed_uids: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DEVAUTH_BACKEND`: `lite` or `standard` (default: standard)
    /// - `DEVAUTH_MAX_CALLBACKS`: registry capacity (default: 64)
    /// - `DEVAUTH_MAX_REMOTE_OBJECTS`: slot table capacity (default: 64)
    /// - `DEVAUTH_CALLBACK_TIMEOUT_MS`: sync reverse-call bound (default: 20000)
    /// - `DEVAUTH_INTERFACE_TOKEN`: expected interface descriptor
    /// - `DEVAUTH_ALLOWED_UIDS`: comma separated caller uids (default: any)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: env::var("DEVAUTH_BACKEND")
                .ok()
                .and_then(|v| Backend::from_name(&v))
                .unwrap_or(defaults.backend),

            max_callbacks: env::var("DEVAUTH_MAX_CALLBACKS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_callbacks),

            max_remote_objects: env::var("DEVAUTH_MAX_REMOTE_OBJECTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_remote_objects),

            callback_timeout: env::var("DEVAUTH_CALLBACK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.callback_timeout),

            interface_token: env::var("DEVAUTH_INTERFACE_TOKEN").unwrap_or(defaults.interface_token),

            allowed_uids: env::var("DEVAUTH_ALLOWED_UIDS")
                .map(|v| parse_uid_list(&v))
                .unwrap_or_default(),
        }
    }

    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(json).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Small tables and short timeouts for unit tests.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            max_callbacks: 8,
            max_remote_objects: 8,
            callback_timeout: Duration::from_secs(2),
            ..Self::default()
        }
    }
}

fn parse_uid_list(value: &str) -> Vec<u32> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
