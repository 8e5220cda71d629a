//! # Proxy Call Builder
//!
//! Client half of one method call, with its stages encoded in the type.
//!
//! ```text
//! Empty ──add_*──► Accumulating ──finalize──► Finalized ──send──► CallReply | ProxyError
//!                      │                          │
//!                 attach_callback            attach_callback
//! ```
//!
//! ```rust,ignore
//! let reply = ProxyCall::new(&config)
//!     .add_str(ParamTag::AppId, "svc.demo")?
//!     .finalize(MethodId::UnregCallback)
//!     .call(service.as_ref())
//!     .await?;
//! ```

use crate::config::ClientConfig;
use crate::errors::{ProxyError, SdkError};
use devauth_transport::{CallMode, CallerInfo, MessageParcel, RemoteObject};
use devauth_types::framing::write_request;
use devauth_types::{
    result_code, MethodId, ParamList, ParamTag, ParamWriter, ReplyFraming, DEV_AUTH_CALL_REQUEST,
};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// =============================================================================
// STATE MARKERS
// =============================================================================

/// Nothing staged yet.
#[derive(Debug, Clone, Copy)]
pub struct Empty;

/// At least one parameter staged.
#[derive(Debug, Clone, Copy)]
pub struct Accumulating;

/// Header written, ready to send.
#[derive(Debug, Clone, Copy)]
pub struct Finalized;

/// States in which a callback object may be attached.
pub trait Staged {}

impl Staged for Accumulating {}
impl Staged for Finalized {}

// =============================================================================
// PROXY CALL
// =============================================================================

pub struct ProxyCall<S> {
    writer: ParamWriter,
    frame: Vec<u8>,
    method: Option<MethodId>,
    object: Option<Arc<dyn RemoteObject>>,
    interface_token: String,
    caller: CallerInfo,
    timeout: Duration,
    framing: ReplyFraming,
    _state: PhantomData<S>,
}

impl<S> ProxyCall<S> {
    fn into_state<T>(self) -> ProxyCall<T> {
        ProxyCall {
            writer: self.writer,
            frame: self.frame,
            method: self.method,
            object: self.object,
            interface_token: self.interface_token,
            caller: self.caller,
            timeout: self.timeout,
            framing: self.framing,
            _state: PhantomData,
        }
    }

    /// Number of parameters staged so far.
    pub fn param_count(&self) -> i32 {
        self.writer.count()
    }
}

impl ProxyCall<Empty> {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            writer: config.backend.param_writer(),
            frame: Vec::new(),
            method: None,
            object: None,
            interface_token: config.interface_token.clone(),
            caller: config.caller,
            timeout: config.call_timeout,
            framing: config.backend.reply_framing(),
            _state: PhantomData,
        }
    }

    /// A call with nothing staged cannot be finalized.
    pub fn finalize(self, _method: MethodId) -> Result<ProxyCall<Finalized>, ProxyError> {
        Err(ProxyError::DataInvalid)
    }
}

macro_rules! staging_ops {
    ($state:ty) => {
        impl ProxyCall<$state> {
            /// Appends an encoded parameter.
            pub fn add_param(mut self, tag: ParamTag, value: Option<&[u8]>) -> Result<ProxyCall<Accumulating>, ProxyError> {
                self.writer.push(tag, value)?;
                Ok(self.into_state())
            }

            pub fn add_str(mut self, tag: ParamTag, value: &str) -> Result<ProxyCall<Accumulating>, ProxyError> {
                self.writer.push_str(tag, value)?;
                Ok(self.into_state())
            }

            pub fn add_i32(mut self, tag: ParamTag, value: i32) -> Result<ProxyCall<Accumulating>, ProxyError> {
                self.writer.push_i32(tag, value)?;
                Ok(self.into_state())
            }

            pub fn add_i64(mut self, tag: ParamTag, value: i64) -> Result<ProxyCall<Accumulating>, ProxyError> {
                self.writer.push_i64(tag, value)?;
                Ok(self.into_state())
            }
        }
    };
}

staging_ops!(Empty);
staging_ops!(Accumulating);

impl<S: Staged> ProxyCall<S> {
    /// Sends `object` along with the call; the service keeps it as the
    /// target of reverse calls.
    #[must_use]
    pub fn attach_callback(mut self, object: Arc<dyn RemoteObject>) -> Self {
        self.object = Some(object);
        self
    }
}

impl ProxyCall<Accumulating> {
    /// Writes the request header in front of the staged body.
    pub fn finalize(mut self, method: MethodId) -> Result<ProxyCall<Finalized>, ProxyError> {
        let writer = std::mem::take(&mut self.writer);
        let (body, count) = writer.into_parts();
        self.frame = write_request(method.as_i32(), count, &body)?;
        self.method = Some(method);
        Ok(self.into_state())
    }
}

impl ProxyCall<Finalized> {
    fn parcel(self) -> (MessageParcel, ReplyFraming, Duration) {
        let mut parcel = MessageParcel::new(self.interface_token, self.caller, self.frame);
        if let Some(object) = self.object {
            parcel = parcel.with_object(object);
        }
        (parcel, self.framing, self.timeout)
    }

    /// Performs the transport call.
    ///
    /// Synchronous calls yield the parsed reply; asynchronous calls yield
    /// `None`.
    pub async fn send(self, remote: &dyn RemoteObject, synchronous: bool) -> Result<Option<CallReply>, ProxyError> {
        let method = self.method;
        let (parcel, framing, timeout) = self.parcel();
        let mode = if synchronous {
            CallMode::Sync { timeout }
        } else {
            CallMode::Async
        };
        let reply = remote.send_request(DEV_AUTH_CALL_REQUEST, parcel, mode).await?;
        debug!(method = ?method, synchronous, "Method call sent");
        match (synchronous, reply) {
            (false, _) => Ok(None),
            (true, Some(reply)) => CallReply::parse(framing, &reply.data).map(Some),
            (true, None) => Err(ProxyError::MissingReply),
        }
    }

    /// Synchronous [`send`](Self::send).
    pub async fn call(self, remote: &dyn RemoteObject) -> Result<CallReply, ProxyError> {
        self.send(remote, true).await?.ok_or(ProxyError::MissingReply)
    }
}

impl<S> std::fmt::Debug for ProxyCall<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCall")
            .field("state", &std::any::type_name::<S>())
            .field("params", &self.writer.count())
            .field("method", &self.method)
            .field("callback", &self.object.is_some())
            .finish()
    }
}

// =============================================================================
// REPLIES
// =============================================================================

/// Parameters of a successful reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallReply {
    body: Vec<u8>,
}

impl CallReply {
    /// The leading transport result is authoritative: anything but success
    /// discards the body.
    pub fn parse(framing: ReplyFraming, data: &[u8]) -> Result<Self, ProxyError> {
        let (code, body) = framing.read_reply(data).map_err(ProxyError::Reply)?;
        if code != result_code::SUCCESS {
            return Err(ProxyError::Rejected(code));
        }
        Ok(Self {
            body: body.map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    pub fn params(&self) -> ParamList<'_> {
        ParamList::decode_prefix(&self.body)
    }

    /// Business result carried in `IPC_RESULT`.
    pub fn result(&self) -> Result<i32, SdkError> {
        self.params()
            .get_i32(ParamTag::IpcResult)
            .map_err(|_| SdkError::UnknownReply)
    }

    /// `Ok` only for a successful business result.
    pub fn require_success(&self) -> Result<(), SdkError> {
        match self.result()? {
            result_code::SUCCESS => Ok(()),
            code => Err(SdkError::Business(code)),
        }
    }

    /// Requires `IPC_RESULT_NUM` to be at least `min`.
    pub fn require_entries(&self, min: i32) -> Result<(), SdkError> {
        match self.params().get_i32(ParamTag::IpcResultNum) {
            Ok(num) if num >= min => Ok(()),
            _ => Err(SdkError::OutDataNum),
        }
    }

    /// Non-empty string payload under `tag`.
    pub fn string(&self, tag: ParamTag) -> Result<String, SdkError> {
        self.params()
            .get_str(tag)
            .map(str::to_string)
            .map_err(|_| SdkError::OutData)
    }

    pub fn i32_value(&self, tag: ParamTag) -> Result<i32, SdkError> {
        self.params().get_i32(tag).map_err(|_| SdkError::OutData)
    }
}
