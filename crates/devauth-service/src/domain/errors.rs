//! Service error types.

use devauth_transport::TransportError;
use devauth_types::{CallbackType, IpcError, SlotHandle};
use thiserror::Error;

/// Callback registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("callback registry full ({capacity} records)")]
    Full { capacity: usize },

    #[error("remote object table full ({capacity} slots)")]
    SlotsExhausted { capacity: usize },

    #[error("application id is empty or longer than {max} bytes")]
    InvalidAppId { max: usize },

    #[error("callback set does not fit a {0:?} record")]
    KindMismatch(CallbackType),

    #[error("no {kind:?} record for {key}")]
    NotFound { key: String, kind: CallbackType },

    #[error("remote object slot {0} is not in use")]
    StaleSlot(SlotHandle),
}

impl From<RegistryError> for IpcError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Full { .. } | RegistryError::SlotsExhausted { .. } => IpcError::ResourceExhausted,
            RegistryError::InvalidAppId { .. }
            | RegistryError::KindMismatch(_)
            | RegistryError::NotFound { .. }
            | RegistryError::StaleSlot(_) => IpcError::BadParam,
        }
    }
}

/// Call dispatch table registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("method id {0} must be positive")]
    InvalidMethodId(i32),

    #[error("method id {0} is already registered")]
    DuplicateMethod(i32),
}

/// Service construction and lifecycle failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("dispatch table: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
