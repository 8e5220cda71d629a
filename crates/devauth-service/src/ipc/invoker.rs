//! # Cross-Process Callback Invoker
//!
//! Turns business-layer events into reverse calls on client callback objects.
//!
//! ## Call Shapes
//!
//! | Callback | Mode | Arguments | Reply |
//! |----------|------|-----------|-------|
//! | transmit | sync | REQID, COMM_DATA | `i32` success flag |
//! | session key | async | REQID, SESS_KEY | none |
//! | finish | async | REQID, OPCODE, COMM_DATA | none |
//! | error | async | REQID, OPCODE, ERRCODE, ERR_INFO? | none |
//! | request | sync | REQID, OPCODE, REQ_INFO? | `i32` result, string |
//! | listener events | async broadcast | see [`CallbackInvoker`] methods | none |
//!
//! Targets are snapshotted from the registry first; the registry lock is never
//! held while a reverse call is in flight. A target whose slot has been freed
//! in the meantime makes the call a silent no-op.

use crate::domain::{CallbackKey, CallbackRegistry, ReverseTarget, ServiceConfig};
use devauth_telemetry::CALLBACK_INVOCATIONS;
use devauth_transport::{Backend, CallMode, CallerInfo, MessageParcel};
use devauth_types::framing::{write_callback, ValueReader};
use devauth_types::{
    result_code, CallbackId, CallbackType, EncodeError, HookId, ParamTag, ParamWriter, SlotHandle,
    DEV_AUTH_CALLBACK_REQUEST, FIELD_APP_ID,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Issues reverse calls against the callback registry.
pub struct CallbackInvoker {
    registry: Arc<CallbackRegistry>,
    backend: Backend,
    timeout: Duration,
    interface_token: String,
}

impl CallbackInvoker {
    #[must_use]
    pub fn new(registry: Arc<CallbackRegistry>, config: &ServiceConfig) -> Self {
        Self {
            registry,
            backend: config.backend,
            timeout: config.callback_timeout,
            interface_token: config.interface_token.clone(),
        }
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    /// Sends one reverse call to the object in `slot`.
    ///
    /// Returns the reply payload of synchronous calls. A slot that is not in
    /// use, or any transport failure, yields `None`.
    pub async fn invoke(&self, slot: SlotHandle, id: CallbackId, hook: HookId, args: ParamWriter) -> Option<Vec<u8>> {
        let label = format!("{id:?}");
        let Some(remote) = self.registry.remote_for(slot) else {
            debug!(slot = %slot, callback = %label, "Callback slot not in use, skipping reverse call");
            CALLBACK_INVOCATIONS.with_label_values(&[label.as_str(), "skipped"]).inc();
            return None;
        };

        let (body, count) = args.into_parts();
        let frame = match write_callback(id.as_i32(), hook.get(), count, &body) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(callback = %label, error = %e, "Failed to frame reverse call");
                CALLBACK_INVOCATIONS.with_label_values(&[label.as_str(), "failed"]).inc();
                return None;
            }
        };
        let parcel = MessageParcel::new(self.interface_token.clone(), CallerInfo::default(), frame);
        let mode = if id.is_synchronous() {
            CallMode::Sync { timeout: self.timeout }
        } else {
            CallMode::Async
        };

        match remote.send_request(DEV_AUTH_CALLBACK_REQUEST, parcel, mode).await {
            Ok(reply) => {
                CALLBACK_INVOCATIONS.with_label_values(&[label.as_str(), "sent"]).inc();
                debug!(slot = %slot, callback = %label, "Reverse call delivered");
                reply.map(|parcel| parcel.data)
            }
            Err(e) => {
                warn!(slot = %slot, callback = %label, error = %e, "Reverse call failed");
                CALLBACK_INVOCATIONS.with_label_values(&[label.as_str(), "failed"]).inc();
                None
            }
        }
    }

    fn args<F>(&self, id: CallbackId, build: F) -> Option<ParamWriter>
    where
        F: FnOnce(&mut ParamWriter) -> Result<(), EncodeError>,
    {
        let mut writer = self.backend.param_writer();
        match build(&mut writer) {
            Ok(()) => Some(writer),
            Err(e) => {
                warn!(callback = ?id, error = %e, "Failed to encode reverse call arguments");
                None
            }
        }
    }

    fn request_target(&self, kind: CallbackType, request_id: i64, id: CallbackId) -> Option<ReverseTarget> {
        self.registry.target(&CallbackKey::Request(request_id), kind, id)
    }

    async fn call_request(
        &self,
        kind: CallbackType,
        request_id: i64,
        id: CallbackId,
        args: Option<ParamWriter>,
    ) -> Option<Vec<u8>> {
        let args = args?;
        let Some(target) = self.request_target(kind, request_id, id) else {
            debug!(request_id, kind = ?kind, callback = ?id, "No callback registered for request");
            return None;
        };
        self.invoke(target.slot, id, target.hook, args).await
    }

    async fn broadcast(&self, id: CallbackId, args: Option<ParamWriter>) {
        let Some(args) = args else {
            return;
        };
        for target in self.registry.listener_targets(id) {
            self.invoke(target.slot, id, target.hook, args.clone()).await;
        }
    }

    // =========================================================================
    // DEVICE-AUTH CALLBACKS
    // =========================================================================

    pub async fn on_transmit(&self, kind: CallbackType, request_id: i64, data: &[u8]) -> bool {
        let args = self.args(CallbackId::OnTransmit, |w| {
            w.push_i64(ParamTag::ReqId, request_id)?;
            w.push(ParamTag::CommData, Some(data))?;
            Ok(())
        });
        let Some(reply) = self.call_request(kind, request_id, CallbackId::OnTransmit, args).await else {
            return false;
        };
        ValueReader::new(&reply).read_i32() == Some(result_code::SUCCESS)
    }

    pub async fn on_session_key_returned(&self, kind: CallbackType, request_id: i64, session_key: &[u8]) {
        let args = self.args(CallbackId::OnSessionKeyReturned, |w| {
            w.push_i64(ParamTag::ReqId, request_id)?;
            w.push(ParamTag::SessKey, Some(session_key))?;
            Ok(())
        });
        self.call_request(kind, request_id, CallbackId::OnSessionKeyReturned, args)
            .await;
    }

    /// Delivers the terminal success and drops the transient record.
    pub async fn on_finish(&self, kind: CallbackType, request_id: i64, operation_code: i32, return_data: &str) {
        let args = self.args(CallbackId::OnFinish, |w| {
            w.push_i64(ParamTag::ReqId, request_id)?;
            w.push_i32(ParamTag::OpCode, operation_code)?;
            w.push_str(ParamTag::CommData, return_data)?;
            Ok(())
        });
        self.call_request(kind, request_id, CallbackId::OnFinish, args).await;
        self.registry.remove_transient(request_id, kind);
    }

    /// Delivers the terminal failure and drops the transient record.
    pub async fn on_error(
        &self,
        kind: CallbackType,
        request_id: i64,
        operation_code: i32,
        error_code: i32,
        error_info: Option<&str>,
    ) {
        let args = self.args(CallbackId::OnError, |w| {
            w.push_i64(ParamTag::ReqId, request_id)?;
            w.push_i32(ParamTag::OpCode, operation_code)?;
            w.push_i32(ParamTag::ErrCode, error_code)?;
            if let Some(info) = error_info {
                w.push_str(ParamTag::ErrInfo, info)?;
            }
            Ok(())
        });
        self.call_request(kind, request_id, CallbackId::OnError, args).await;
        self.registry.remove_transient(request_id, kind);
    }

    /// Asks the client to confirm a request.
    ///
    /// A `DevAuth` request that no record is bound to yet is bound through the
    /// `appId` field of `req_params` first.
    pub async fn on_request(
        &self,
        kind: CallbackType,
        request_id: i64,
        operation_code: i32,
        req_params: Option<&str>,
    ) -> Option<String> {
        let id = CallbackId::OnRequest;
        let target = match self.request_target(kind, request_id, id) {
            Some(target) => target,
            None if kind == CallbackType::DevAuth => {
                self.bind_from_params(request_id, req_params)?;
                self.request_target(kind, request_id, id)?
            }
            None => {
                debug!(request_id, kind = ?kind, "No request callback registered");
                return None;
            }
        };

        let args = self.args(id, |w| {
            w.push_i64(ParamTag::ReqId, request_id)?;
            w.push_i32(ParamTag::OpCode, operation_code)?;
            if let Some(params) = req_params {
                w.push_str(ParamTag::ReqInfo, params)?;
            }
            Ok(())
        })?;
        let reply = self.invoke(target.slot, id, target.hook, args).await?;
        let mut reader = ValueReader::new(&reply);
        if reader.read_i32()? != result_code::SUCCESS {
            return None;
        }
        reader.read_cstring()
    }

    fn bind_from_params(&self, request_id: i64, req_params: Option<&str>) -> Option<()> {
        let json: serde_json::Value = match serde_json::from_str(req_params?) {
            Ok(json) => json,
            Err(e) => {
                warn!(request_id, error = %e, "Request parameters are not valid JSON");
                return None;
            }
        };
        let Some(app_id) = json.get(FIELD_APP_ID).and_then(|v| v.as_str()) else {
            warn!(request_id, "Request parameters carry no appId");
            return None;
        };
        match self.registry.bind_request(app_id, request_id) {
            Ok(()) => Some(()),
            Err(e) => {
                warn!(request_id, app_id, error = %e, "Failed to bind request to application callbacks");
                None
            }
        }
    }

    // =========================================================================
    // LISTENER BROADCASTS
    // =========================================================================

    pub async fn on_group_created(&self, group_info: &str) {
        let id = CallbackId::OnGroupCreated;
        let args = self.args(id, |w| w.push_str(ParamTag::GroupInfo, group_info).map(drop));
        self.broadcast(id, args).await;
    }

    pub async fn on_group_deleted(&self, group_info: &str) {
        let id = CallbackId::OnGroupDeleted;
        let args = self.args(id, |w| w.push_str(ParamTag::GroupInfo, group_info).map(drop));
        self.broadcast(id, args).await;
    }

    pub async fn on_device_bound(&self, peer_udid: &str, group_info: &str) {
        let id = CallbackId::OnDeviceBound;
        let args = self.args(id, |w| {
            w.push_str(ParamTag::Udid, peer_udid)?;
            w.push_str(ParamTag::GroupInfo, group_info)?;
            Ok(())
        });
        self.broadcast(id, args).await;
    }

    pub async fn on_device_unbound(&self, peer_udid: &str, group_info: &str) {
        let id = CallbackId::OnDeviceUnbound;
        let args = self.args(id, |w| {
            w.push_str(ParamTag::Udid, peer_udid)?;
            w.push_str(ParamTag::GroupInfo, group_info)?;
            Ok(())
        });
        self.broadcast(id, args).await;
    }

    pub async fn on_device_not_trusted(&self, peer_udid: &str) {
        let id = CallbackId::OnDeviceNotTrusted;
        let args = self.args(id, |w| w.push_str(ParamTag::Udid, peer_udid).map(drop));
        self.broadcast(id, args).await;
    }

    pub async fn on_last_group_deleted(&self, peer_udid: &str, group_type: i32) {
        let id = CallbackId::OnLastGroupDeleted;
        let args = self.args(id, |w| {
            w.push_str(ParamTag::Udid, peer_udid)?;
            w.push_i32(ParamTag::GroupType, group_type)?;
            Ok(())
        });
        self.broadcast(id, args).await;
    }

    pub async fn on_trusted_device_num_changed(&self, cur_num: i32) {
        let id = CallbackId::OnTrustedDeviceNumChanged;
        let args = self.args(id, |w| w.push_i32(ParamTag::DataNum, cur_num).map(drop));
        self.broadcast(id, args).await;
    }
}

impl std::fmt::Debug for CallbackInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackInvoker")
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .finish()
    }
}
