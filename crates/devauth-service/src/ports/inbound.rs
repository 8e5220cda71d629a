//! Inbound (driving) ports: callback sinks the business layer calls into.
//!
//! The service hands implementations of these traits to the business layer.
//! Each call turns into a reverse call on the client that registered the
//! callbacks.

use async_trait::async_trait;

/// Device-auth callbacks of one registration.
#[async_trait]
pub trait AuthCallbacks: Send + Sync {
    /// Sends protocol data to the peer. Returns whether it was accepted.
    async fn on_transmit(&self, request_id: i64, data: &[u8]) -> bool;

    async fn on_session_key_returned(&self, request_id: i64, session_key: &[u8]);

    /// Terminal success.
    async fn on_finish(&self, request_id: i64, operation_code: i32, return_data: &str);

    /// Terminal failure.
    async fn on_error(&self, request_id: i64, operation_code: i32, error_code: i32, error_info: Option<&str>);

    /// Asks the client to confirm a request; `None` when no answer came back.
    async fn on_request(&self, request_id: i64, operation_code: i32, req_params: Option<&str>) -> Option<String>;
}

/// Group data-change notifications, broadcast to every listener.
#[async_trait]
pub trait GroupEventListener: Send + Sync {
    async fn on_group_created(&self, group_info: &str);

    async fn on_group_deleted(&self, group_info: &str);

    async fn on_device_bound(&self, peer_udid: &str, group_info: &str);

    async fn on_device_unbound(&self, peer_udid: &str, group_info: &str);

    async fn on_device_not_trusted(&self, peer_udid: &str);

    async fn on_last_group_deleted(&self, peer_udid: &str, group_type: i32);

    async fn on_trusted_device_num_changed(&self, cur_num: i32);
}
