//! Prometheus metrics for the device-auth IPC layer.
//!
//! Naming convention: `devauth_<area>_<metric>_<unit>`.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Registry holding every device-auth collector
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Inbound method calls by method and outcome
    pub static ref IPC_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("devauth_ipc_requests_total", "Inbound method calls handled by the stub dispatcher"),
        &["method", "outcome"]  // outcome: ok / an IpcError label
    ).expect("metric creation failed");

    // =========================================================================
    // REVERSE CALLS
    // =========================================================================

    /// Reverse calls by callback kind and outcome
    pub static ref CALLBACK_INVOCATIONS: CounterVec = CounterVec::new(
        Opts::new("devauth_callback_invocations_total", "Reverse calls issued to client callbacks"),
        &["callback", "outcome"]  // outcome: sent/skipped/failed
    ).expect("metric creation failed");

    // =========================================================================
    // REGISTRY
    // =========================================================================

    /// Remote objects that reported death
    pub static ref DEATH_NOTIFICATIONS: Counter = Counter::new(
        "devauth_death_notifications_total",
        "Death notifications received for callback remote objects"
    ).expect("metric creation failed");

    /// Callback records currently held
    pub static ref REGISTRY_RECORDS: Gauge = Gauge::new(
        "devauth_registry_records",
        "Callback records held by the registry"
    ).expect("metric creation failed");

    /// Remote object slots currently in use
    pub static ref REMOTE_SLOTS_IN_USE: Gauge = Gauge::new(
        "devauth_remote_slots_in_use",
        "Remote object slots currently in use"
    ).expect("metric creation failed");
}

/// Registers every collector with [`REGISTRY`]. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(IPC_REQUESTS.clone()),
        Box::new(CALLBACK_INVOCATIONS.clone()),
        Box::new(DEATH_NOTIFICATIONS.clone()),
        Box::new(REGISTRY_RECORDS.clone()),
        Box::new(REMOTE_SLOTS_IN_USE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Renders all metrics in the Prometheus text format.
pub fn gather_text() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
