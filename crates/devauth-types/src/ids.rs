//! # Wire Identifiers
//!
//! Fixed enumerations that both sides of the IPC boundary agree on: method
//! opcodes, parameter tags, reverse-call ids and callback kinds.
//!
//! All of them are `#[repr(i32)]` and travel as little-endian `i32`.

use crate::errors::IpcError;

/// Well-known name the service is published under.
pub const DEVICE_AUTH_SERVICE_ID: &str = "device_auth_service";

/// Interface descriptor every request must carry.
pub const DEVICE_AUTH_INTERFACE_TOKEN: &str = "deviceauth.IMethodsIpcCall";

/// Transport opcode for client → service method calls.
pub const DEV_AUTH_CALL_REQUEST: u32 = 1;

/// Transport opcode for service → client reverse calls.
pub const DEV_AUTH_CALLBACK_REQUEST: u32 = 2;

/// Maximum number of decoded parameters per request (callback object included).
pub const MAX_PARAM_SLOTS: usize = 8;

/// Default capacity of the callback registry.
pub const IPC_CALL_BACK_MAX_NODES: usize = 64;

/// Maximum application id length in bytes, terminator included.
pub const MAX_APP_ID_LEN: usize = 128;

/// Upper bound for communication payloads accepted by the client SDK.
pub const MAX_COMM_DATA_LEN: usize = 4096;

/// JSON field carrying the caller application id inside request parameters.
pub const FIELD_APP_ID: &str = "appId";

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Every variant in wire order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            /// Raw wire value.
            #[inline]
            pub const fn as_i32(self) -> i32 {
                self as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = i32;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $( v if v == $value => Ok($name::$variant), )+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }
    };
}

wire_enum! {
    /// Service operation opcodes.
    pub enum MethodId {
        RegCallback = 1,
        UnregCallback = 2,
        RegListener = 3,
        UnregListener = 4,
        CreateGroup = 5,
        DeleteGroup = 6,
        AddGroupMember = 7,
        DeleteGroupMember = 8,
        GmProcessData = 9,
        SaveCredential = 10,
        ApplyRegisterInfo = 11,
        CheckAccessToGroup = 12,
        GetPkInfoList = 13,
        GetGroupInfoById = 14,
        SearchGroups = 15,
        GetJoinedGroups = 16,
        GetRelatedGroups = 17,
        GetDeviceInfoById = 18,
        GetTrustedDevices = 19,
        IsDeviceInGroup = 20,
        GaProcessData = 21,
        AuthDevice = 22,
    }
}

impl MethodId {
    /// Methods allowed to carry a client callback object.
    pub fn accepts_callback(self) -> bool {
        matches!(
            self,
            MethodId::RegCallback
                | MethodId::RegListener
                | MethodId::GaProcessData
                | MethodId::AuthDevice
        )
    }
}

/// How a parameter's bytes are handed to the consumer after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Borrowed slice into the transport buffer.
    Borrowed,
    /// Copied into a fixed-size scalar.
    Scalar,
    /// Handle naming a remote object slot.
    SlotIndex,
}

wire_enum! {
    /// Semantic tag of an encoded parameter.
    pub enum ParamTag {
        AppId = 1,
        DevAuthCb = 2,
        Listener = 3,
        CreateParams = 4,
        GroupId = 5,
        Udid = 6,
        AddParams = 7,
        DelParams = 8,
        Bind = 9,
        Unbind = 10,
        Credential = 11,
        MgrAppId = 12,
        FriendAppId = 13,
        QueryParams = 14,
        CommData = 15,
        ReqCfm = 16,
        SessKey = 17,
        ReqInfo = 18,
        GroupInfo = 19,
        AuthParams = 20,
        ReqJson = 21,
        ErrInfo = 22,
        RegInfo = 23,
        DeviceInfo = 24,
        ReturnData = 25,
        ReqId = 26,
        GroupType = 27,
        OpCode = 28,
        ErrCode = 29,
        OsAccountId = 30,
        DataNum = 31,
        IpcResult = 32,
        IpcResultNum = 33,
        CbObject = 34,
    }
}

impl ParamTag {
    /// Decode policy for this tag.
    pub fn policy(self) -> DecodePolicy {
        match self {
            ParamTag::ReqId
            | ParamTag::GroupType
            | ParamTag::OpCode
            | ParamTag::ErrCode
            | ParamTag::OsAccountId
            | ParamTag::DataNum
            | ParamTag::IpcResult
            | ParamTag::IpcResultNum => DecodePolicy::Scalar,
            ParamTag::CbObject => DecodePolicy::SlotIndex,
            _ => DecodePolicy::Borrowed,
        }
    }
}

wire_enum! {
    /// Reverse-call shape selector.
    pub enum CallbackId {
        OnTransmit = 1,
        OnSessionKeyReturned = 2,
        OnFinish = 3,
        OnError = 4,
        OnRequest = 5,
        OnGroupCreated = 6,
        OnGroupDeleted = 7,
        OnDeviceBound = 8,
        OnDeviceUnbound = 9,
        OnDeviceNotTrusted = 10,
        OnLastGroupDeleted = 11,
        OnTrustedDeviceNumChanged = 12,
    }
}

impl CallbackId {
    /// Whether the service waits for the client's reply.
    pub fn is_synchronous(self) -> bool {
        matches!(self, CallbackId::OnTransmit | CallbackId::OnRequest)
    }

    /// Terminal callbacks end a transient registration.
    pub fn is_terminal(self) -> bool {
        matches!(self, CallbackId::OnFinish | CallbackId::OnError)
    }

    /// Listener callbacks are broadcast to every listener record.
    pub fn is_listener_event(self) -> bool {
        self.as_i32() >= CallbackId::OnGroupCreated.as_i32()
    }
}

wire_enum! {
    /// Kind of callback record held by the service registry.
    pub enum CallbackType {
        /// Persistent device-auth callbacks registered per application.
        DevAuth = 1,
        /// Transient device-auth callbacks registered per request.
        TmpDevAuth = 2,
        /// Persistent data-change listener registered per application.
        Listener = 3,
    }
}

impl CallbackType {
    /// Only persistent kinds follow the lifetime of their remote object.
    pub fn tracks_remote_death(self) -> bool {
        matches!(self, CallbackType::DevAuth | CallbackType::Listener)
    }
}

/// Parses a method id read off the wire.
pub fn method_from_wire(raw: i32) -> Result<MethodId, IpcError> {
    if raw <= 0 {
        return Err(IpcError::MethodInvalid(raw));
    }
    MethodId::try_from(raw).map_err(IpcError::MethodInvalid)
}
