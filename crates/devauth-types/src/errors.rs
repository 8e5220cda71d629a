//! # Result Codes and IPC Errors
//!
//! Every failure that can cross the process boundary collapses to an `i32`
//! result code. `IpcError` is the typed view of the IPC range; business
//! results are carried through untouched as [`IpcError::Business`].

use thiserror::Error;

/// Stable wire result codes.
pub mod result_code {
    pub const SUCCESS: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const INVALID_PARAMS: i32 = 2;
    pub const ALLOC_MEMORY: i32 = 3;
    pub const NOT_SUPPORT: i32 = 4;
    pub const JSON_GET: i32 = 5;

    // IPC range
    pub const IPC_BAD_PARAM: i32 = 0x6001;
    pub const IPC_BAD_PARAM_NUM: i32 = 0x6002;
    pub const IPC_BAD_MESSAGE: i32 = 0x6003;
    pub const IPC_BAD_MSG_TYPE: i32 = 0x6004;
    pub const IPC_METHOD_INVALID: i32 = 0x6005;
    pub const IPC_UNKNOWN_OPCODE: i32 = 0x6006;
    pub const IPC_PERMISSION_DENIED: i32 = 0x6007;
    pub const IPC_RESOURCE_EXHAUSTED: i32 = 0x6008;
    pub const IPC_INTERNAL_FAILED: i32 = 0x6009;
    pub const IPC_DATA_INVALID: i32 = 0x600A;

    // Client SDK range
    pub const IPC_INIT: i32 = 0x6010;
    pub const IPC_BUILD_PARAM: i32 = 0x6011;
    pub const IPC_PROC_FAILED: i32 = 0x6012;
    pub const IPC_UNKNOWN_REPLY: i32 = 0x6013;
    pub const IPC_OUT_DATA_NUM: i32 = 0x6014;
    pub const IPC_OUT_DATA: i32 = 0x6015;
    pub const IPC_SERVICE_DIED: i32 = 0x6016;
}

/// Closed set of IPC-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("bad parameter")]
    BadParam,

    #[error("bad parameter count: {0}")]
    BadParamNum(i32),

    #[error("bad message: {0}")]
    BadMessage(&'static str),

    #[error("parameter tag {0} missing or of the wrong kind")]
    BadMsgType(i32),

    #[error("invalid method id {0}")]
    MethodInvalid(i32),

    #[error("unknown transport opcode {0}")]
    UnknownOpcode(u32),

    #[error("permission denied")]
    PermissionDenied,

    #[error("resource exhausted")]
    ResourceExhausted,

    #[error("allocation failure")]
    AllocationFailure,

    #[error("internal transport failure")]
    InternalFailed,

    #[error("no data staged")]
    DataInvalid,

    /// Result code produced by the business layer.
    #[error("business result {0}")]
    Business(i32),
}

impl IpcError {
    /// Wire result code for this error.
    pub fn code(&self) -> i32 {
        use result_code::*;
        match self {
            IpcError::BadParam => IPC_BAD_PARAM,
            IpcError::BadParamNum(_) => IPC_BAD_PARAM_NUM,
            IpcError::BadMessage(_) => IPC_BAD_MESSAGE,
            IpcError::BadMsgType(_) => IPC_BAD_MSG_TYPE,
            IpcError::MethodInvalid(_) => IPC_METHOD_INVALID,
            IpcError::UnknownOpcode(_) => IPC_UNKNOWN_OPCODE,
            IpcError::PermissionDenied => IPC_PERMISSION_DENIED,
            IpcError::ResourceExhausted => IPC_RESOURCE_EXHAUSTED,
            IpcError::AllocationFailure => ALLOC_MEMORY,
            IpcError::InternalFailed => IPC_INTERNAL_FAILED,
            IpcError::DataInvalid => IPC_DATA_INVALID,
            IpcError::Business(code) => *code,
        }
    }

    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            IpcError::BadParam => "bad_param",
            IpcError::BadParamNum(_) => "bad_param_num",
            IpcError::BadMessage(_) => "bad_message",
            IpcError::BadMsgType(_) => "bad_msg_type",
            IpcError::MethodInvalid(_) => "method_invalid",
            IpcError::UnknownOpcode(_) => "unknown_opcode",
            IpcError::PermissionDenied => "permission_denied",
            IpcError::ResourceExhausted => "resource_exhausted",
            IpcError::AllocationFailure => "allocation_failure",
            IpcError::InternalFailed => "internal_failed",
            IpcError::DataInvalid => "data_invalid",
            IpcError::Business(_) => "business",
        }
    }
}

/// Turns a business result code into `Ok(())` or [`IpcError::Business`].
pub fn check_business(code: i32) -> Result<(), IpcError> {
    if code == result_code::SUCCESS {
        Ok(())
    } else {
        Err(IpcError::Business(code))
    }
}
