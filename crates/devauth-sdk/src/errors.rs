//! Client error types.

use devauth_transport::TransportError;
use devauth_types::{result_code, EncodeError, IpcError};
use thiserror::Error;

/// Failures of a single proxy call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("no parameters staged")]
    DataInvalid,

    #[error("parameter staging failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("synchronous call produced no reply")]
    MissingReply,

    #[error("malformed reply: {0}")]
    Reply(IpcError),

    #[error("service rejected the call with result {0:#x}")]
    Rejected(i32),
}

/// Errors returned by [`DeviceAuthClient`](crate::DeviceAuthClient)
/// operations. Each maps to one wire result code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("invalid argument: {0}")]
    InvalidParams(&'static str),

    #[error("device-auth service is not running")]
    ServiceUnavailable,

    #[error("call context unavailable")]
    IpcInit,

    #[error("failed to stage call parameters")]
    BuildParam,

    #[error("IPC call failed")]
    ProcFailed,

    #[error("reply carries no result")]
    UnknownReply,

    #[error("reply carries too few result entries")]
    OutDataNum,

    #[error("reply is missing its payload")]
    OutData,

    #[error("service reported a bad parameter")]
    BadParam,

    /// Result code returned by the service's business layer.
    #[error("business result {0}")]
    Business(i32),
}

impl SdkError {
    pub fn code(&self) -> i32 {
        match self {
            SdkError::InvalidParams(_) => result_code::INVALID_PARAMS,
            SdkError::ServiceUnavailable => result_code::ERROR,
            SdkError::IpcInit => result_code::IPC_INIT,
            SdkError::BuildParam => result_code::IPC_BUILD_PARAM,
            SdkError::ProcFailed => result_code::IPC_PROC_FAILED,
            SdkError::UnknownReply => result_code::IPC_UNKNOWN_REPLY,
            SdkError::OutDataNum => result_code::IPC_OUT_DATA_NUM,
            SdkError::OutData => result_code::IPC_OUT_DATA,
            SdkError::BadParam => result_code::IPC_BAD_PARAM,
            SdkError::Business(code) => *code,
        }
    }
}

impl From<ProxyError> for SdkError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::DataInvalid | ProxyError::Encode(_) => SdkError::BuildParam,
            ProxyError::Transport(_) | ProxyError::MissingReply | ProxyError::Rejected(_) => SdkError::ProcFailed,
            ProxyError::Reply(_) => SdkError::UnknownReply,
        }
    }
}
