use std::time::Duration;
use thiserror::Error;

/// Failures of the substrate itself, independent of message contents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("remote object {0} is dead")]
    DeadObject(u64),

    #[error("synchronous call timed out after {0:?}")]
    Timeout(Duration),

    #[error("service '{0}' is not registered")]
    ServiceNotFound(String),
}
