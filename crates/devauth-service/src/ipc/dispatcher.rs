//! # Stub Request Dispatcher
//!
//! Receiving end of every method call.
//!
//! ```text
//! Received ─► TokenChecked ─► PermissionChecked ─► MethodResolved ─► ParamsDecoded
//!                                                                        │
//!          ReplyWritten ◄─ Invoked ◄─ [CallbackCaptured] ◄───────────────┘
//! ```
//!
//! Every step before `Invoked` fails fast: the error becomes the leading
//! transport result and the handler never runs.

use crate::domain::CallDispatchTable;
use crate::ipc::handlers::{release_unclaimed, ServiceContext};
use crate::ipc::security::AuthorizationRules;
use async_trait::async_trait;
use devauth_telemetry::IPC_REQUESTS;
use devauth_transport::{MessageParcel, RemoteStub};
use devauth_types::framing::read_request;
use devauth_types::{
    method_from_wire, result_code, IpcError, MethodId, ParamList, ParamTag, ParamWriter, ReplyFraming,
    SlotHandle, DEV_AUTH_CALL_REQUEST, MAX_PARAM_SLOTS,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Decodes, authorizes and routes inbound method calls.
pub struct StubRequestDispatcher {
    context: Arc<ServiceContext>,
    table: CallDispatchTable<ServiceContext>,
    interface_token: String,
    allowed_uids: Vec<u32>,
    framing: ReplyFraming,
}

impl StubRequestDispatcher {
    #[must_use]
    pub fn new(
        context: Arc<ServiceContext>,
        table: CallDispatchTable<ServiceContext>,
        interface_token: impl Into<String>,
        allowed_uids: Vec<u32>,
    ) -> Self {
        let framing = context.backend.reply_framing();
        Self {
            context,
            table,
            interface_token: interface_token.into(),
            allowed_uids,
            framing,
        }
    }

    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    /// Runs one request through every dispatch stage.
    pub async fn dispatch(&self, code: u32, parcel: &MessageParcel) -> Result<ParamWriter, IpcError> {
        if code != DEV_AUTH_CALL_REQUEST {
            return Err(IpcError::UnknownOpcode(code));
        }
        AuthorizationRules::validate_interface_token(&self.interface_token, &parcel.interface_token)?;
        AuthorizationRules::validate_caller(&self.allowed_uids, parcel.caller.uid)?;

        let (header, body) = read_request(&parcel.data)?;
        let handler = self
            .table
            .lookup(header.method_id)
            .ok_or(IpcError::MethodInvalid(header.method_id))?;

        let mut params = ParamList::decode_counted(body, header.param_count, MAX_PARAM_SLOTS)?;
        if params.contains(ParamTag::CbObject) {
            return Err(IpcError::BadParam);
        }
        let captured = self.capture_callback(header.method_id, &mut params, parcel)?;

        let result = handler.call(&self.context, &params).await;
        release_unclaimed(&self.context, captured);
        result
    }

    /// Stores the parcel's remote object for methods that accept one, when a
    /// parameter slot is still free.
    fn capture_callback(
        &self,
        method_id: i32,
        params: &mut ParamList<'_>,
        parcel: &MessageParcel,
    ) -> Result<Option<SlotHandle>, IpcError> {
        let accepts = method_from_wire(method_id).map_or(false, MethodId::accepts_callback);
        let Some(object) = parcel.object.as_ref().filter(|_| accepts) else {
            return Ok(None);
        };
        if params.len() >= MAX_PARAM_SLOTS {
            debug!(method_id, "No free parameter slot for callback object");
            return Ok(None);
        }
        let slot = self.context.registry.allocate_slot(Arc::clone(object))?;
        params.push_slot(slot);
        debug!(method_id, slot = %slot, "Callback object captured");
        Ok(Some(slot))
    }

    fn encode_reply(&self, result: Result<ParamWriter, IpcError>) -> Vec<u8> {
        let (code, body) = match result {
            Ok(reply) => (result_code::SUCCESS, reply.into_parts().0),
            Err(e) => (e.code(), Vec::new()),
        };
        match self.framing.write_reply(code, &body) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Reply does not fit the transport");
                self.framing
                    .write_reply(IpcError::from(e).code(), &[])
                    .unwrap_or_default()
            }
        }
    }
}

fn method_label(method_id: i32) -> String {
    MethodId::try_from(method_id).map_or_else(|_| "unknown".to_string(), |m| format!("{m:?}"))
}

#[async_trait]
impl RemoteStub for StubRequestDispatcher {
    async fn on_remote_request(&self, code: u32, parcel: MessageParcel) -> MessageParcel {
        let method_id = read_request(&parcel.data).map_or(0, |(header, _)| header.method_id);
        let method = method_label(method_id);
        let result = self.dispatch(code, &parcel).await;

        match &result {
            Ok(_) => {
                IPC_REQUESTS.with_label_values(&[method.as_str(), "ok"]).inc();
                debug!(method = %method, caller = parcel.caller.uid, "Request dispatched");
            }
            Err(e) => {
                IPC_REQUESTS.with_label_values(&[method.as_str(), e.label()]).inc();
                warn!(method = %method, code, caller = parcel.caller.uid, error = %e, "Request rejected");
            }
        }
        MessageParcel::reply(self.encode_reply(result))
    }
}

impl std::fmt::Debug for StubRequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubRequestDispatcher")
            .field("methods", &self.table.len())
            .field("framing", &self.framing)
            .finish()
    }
}
