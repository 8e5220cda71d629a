//! # Client Callback Stub
//!
//! Receiving end of the service's reverse calls. The frame names a callback
//! id and a [`HookId`]; the stub resolves the hook in the client's
//! [`HookTable`] and runs it.
//!
//! ## Validation Order
//!
//! 1. Opcode must be the reverse-call opcode
//! 2. Interface token must match
//! 3. Frame header and callback id must decode
//! 4. Hook id must be non-zero and registered
//! 5. Parameters must decode against the declared count
//! 6. Hook shape must match the callback id
//!
//! A rejected call is answered with a bare `ERROR` value.

use crate::hooks::{ClientHook, HookTable};
use async_trait::async_trait;
use devauth_transport::{MessageParcel, RemoteStub};
use devauth_types::framing::{read_callback, write_cstring, write_i32};
use devauth_types::{
    result_code, CallbackId, DevAuthHooks, HookId, IpcError, ParamList, ParamTag, DEV_AUTH_CALLBACK_REQUEST,
    MAX_PARAM_SLOTS,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Transient device-auth hooks, keyed by request id.
pub type TransientHooks = Arc<Mutex<HashMap<i64, DevAuthHooks>>>;

pub struct ClientCallbackStub {
    hooks: Arc<HookTable>,
    transient: TransientHooks,
    interface_token: String,
}

impl ClientCallbackStub {
    #[must_use]
    pub fn new(hooks: Arc<HookTable>, transient: TransientHooks, interface_token: impl Into<String>) -> Self {
        Self {
            hooks,
            transient,
            interface_token: interface_token.into(),
        }
    }

    fn handle(&self, code: u32, parcel: &MessageParcel) -> Result<Vec<u8>, IpcError> {
        if code != DEV_AUTH_CALLBACK_REQUEST {
            return Err(IpcError::UnknownOpcode(code));
        }
        if parcel.interface_token != self.interface_token {
            return Err(IpcError::BadMessage("interface token mismatch"));
        }
        let (header, body) = read_callback(&parcel.data)?;
        let id = CallbackId::try_from(header.callback_id).map_err(|_| IpcError::BadMessage("unknown callback id"))?;
        let hook_id = HookId::new(header.hook).ok_or(IpcError::BadParam)?;
        let hook = self.hooks.get(hook_id).ok_or(IpcError::BadParam)?;
        let params = ParamList::decode_counted(body, header.param_count, MAX_PARAM_SLOTS)?;
        if hook.callback_id() != id {
            return Err(IpcError::BadMsgType(header.callback_id));
        }

        let reply = run_hook(&hook, &params)?;
        if id.is_terminal() {
            self.release_transient(params.get_i64(ParamTag::ReqId)?);
        }
        Ok(reply)
    }

    fn release_transient(&self, request_id: i64) {
        let released = self.transient.lock().remove(&request_id);
        if let Some(hooks) = released {
            self.hooks.release_auth(&hooks);
            debug!(request_id, "Released transient callbacks");
        }
    }
}

fn run_hook(hook: &ClientHook, params: &ParamList<'_>) -> Result<Vec<u8>, IpcError> {
    let mut reply = Vec::new();
    match hook {
        ClientHook::Transmit(f) => {
            let accepted = f(params.get_i64(ParamTag::ReqId)?, params.get_bytes(ParamTag::CommData)?);
            write_i32(&mut reply, if accepted { result_code::SUCCESS } else { result_code::ERROR });
        }
        ClientHook::SessionKey(f) => {
            f(params.get_i64(ParamTag::ReqId)?, params.get_bytes(ParamTag::SessKey)?);
        }
        ClientHook::Finish(f) => {
            let data = params.get_opt_str(ParamTag::CommData)?.unwrap_or("");
            f(params.get_i64(ParamTag::ReqId)?, params.get_i32(ParamTag::OpCode)?, data);
        }
        ClientHook::Error(f) => {
            let info = optional_str(params, ParamTag::ErrInfo)?;
            f(
                params.get_i64(ParamTag::ReqId)?,
                params.get_i32(ParamTag::OpCode)?,
                params.get_i32(ParamTag::ErrCode)?,
                info,
            );
        }
        ClientHook::Request(f) => {
            let info = optional_str(params, ParamTag::ReqInfo)?;
            let confirmation = f(params.get_i64(ParamTag::ReqId)?, params.get_i32(ParamTag::OpCode)?, info);
            write_i32(&mut reply, result_code::SUCCESS);
            write_cstring(&mut reply, confirmation.as_deref())?;
        }
        ClientHook::GroupCreated(f) | ClientHook::GroupDeleted(f) => {
            f(params.get_str(ParamTag::GroupInfo)?);
        }
        ClientHook::DeviceBound(f) | ClientHook::DeviceUnbound(f) => {
            f(params.get_str(ParamTag::Udid)?, params.get_str(ParamTag::GroupInfo)?);
        }
        ClientHook::DeviceNotTrusted(f) => {
            f(params.get_str(ParamTag::Udid)?);
        }
        ClientHook::LastGroupDeleted(f) => {
            f(params.get_str(ParamTag::Udid)?, params.get_i32(ParamTag::GroupType)?);
        }
        ClientHook::TrustedDeviceNumChanged(f) => {
            f(params.get_i32(ParamTag::DataNum)?);
        }
    }
    Ok(reply)
}

/// Absent tag and empty value both read as `None`.
fn optional_str<'a>(params: &ParamList<'a>, tag: ParamTag) -> Result<Option<&'a str>, IpcError> {
    if params.contains(tag) {
        params.get_opt_str(tag)
    } else {
        Ok(None)
    }
}

#[async_trait]
impl RemoteStub for ClientCallbackStub {
    async fn on_remote_request(&self, code: u32, parcel: MessageParcel) -> MessageParcel {
        match self.handle(code, &parcel) {
            Ok(reply) => MessageParcel::reply(reply),
            Err(e) => {
                warn!(code, error = %e, "Rejected reverse call");
                let mut reply = Vec::new();
                write_i32(&mut reply, result_code::ERROR);
                MessageParcel::reply(reply)
            }
        }
    }
}

impl std::fmt::Debug for ClientCallbackStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCallbackStub")
            .field("hooks", &self.hooks.len())
            .field("transient", &self.transient.lock().len())
            .finish()
    }
}
