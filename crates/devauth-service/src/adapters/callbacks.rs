//! Callback sinks handed to the business layer.
//!
//! Each call is forwarded to the [`CallbackInvoker`], which resolves the
//! registered client object and issues the reverse call.

use crate::ipc::invoker::CallbackInvoker;
use crate::ports::inbound::{AuthCallbacks, GroupEventListener};
use async_trait::async_trait;
use devauth_types::CallbackType;
use std::sync::Arc;

/// Device-auth callbacks backed by either persistent or transient records.
#[derive(Debug, Clone)]
pub struct IpcAuthCallbacks {
    invoker: Arc<CallbackInvoker>,
    kind: CallbackType,
}

impl IpcAuthCallbacks {
    #[must_use]
    pub fn new(invoker: Arc<CallbackInvoker>, kind: CallbackType) -> Self {
        Self { invoker, kind }
    }

    pub fn kind(&self) -> CallbackType {
        self.kind
    }
}

#[async_trait]
impl AuthCallbacks for IpcAuthCallbacks {
    async fn on_transmit(&self, request_id: i64, data: &[u8]) -> bool {
        self.invoker.on_transmit(self.kind, request_id, data).await
    }

    async fn on_session_key_returned(&self, request_id: i64, session_key: &[u8]) {
        self.invoker
            .on_session_key_returned(self.kind, request_id, session_key)
            .await;
    }

    async fn on_finish(&self, request_id: i64, operation_code: i32, return_data: &str) {
        self.invoker
            .on_finish(self.kind, request_id, operation_code, return_data)
            .await;
    }

    async fn on_error(&self, request_id: i64, operation_code: i32, error_code: i32, error_info: Option<&str>) {
        self.invoker
            .on_error(self.kind, request_id, operation_code, error_code, error_info)
            .await;
    }

    async fn on_request(&self, request_id: i64, operation_code: i32, req_params: Option<&str>) -> Option<String> {
        self.invoker
            .on_request(self.kind, request_id, operation_code, req_params)
            .await
    }
}

/// Data-change listener broadcasting to every registered listener record.
#[derive(Debug, Clone)]
pub struct IpcGroupEventListener {
    invoker: Arc<CallbackInvoker>,
}

impl IpcGroupEventListener {
    #[must_use]
    pub fn new(invoker: Arc<CallbackInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl GroupEventListener for IpcGroupEventListener {
    async fn on_group_created(&self, group_info: &str) {
        self.invoker.on_group_created(group_info).await;
    }

    async fn on_group_deleted(&self, group_info: &str) {
        self.invoker.on_group_deleted(group_info).await;
    }

    async fn on_device_bound(&self, peer_udid: &str, group_info: &str) {
        self.invoker.on_device_bound(peer_udid, group_info).await;
    }

    async fn on_device_unbound(&self, peer_udid: &str, group_info: &str) {
        self.invoker.on_device_unbound(peer_udid, group_info).await;
    }

    async fn on_device_not_trusted(&self, peer_udid: &str) {
        self.invoker.on_device_not_trusted(peer_udid).await;
    }

    async fn on_last_group_deleted(&self, peer_udid: &str, group_type: i32) {
        self.invoker.on_last_group_deleted(peer_udid, group_type).await;
    }

    async fn on_trusted_device_num_changed(&self, cur_num: i32) {
        self.invoker.on_trusted_device_num_changed(cur_num).await;
    }
}
