//! Outbound (driven) ports: the business layer behind the IPC surface.
//!
//! Both tables are supplied at start-up. Results are raw `i32` result codes
//! and pass through to the client unchanged.

use crate::ports::inbound::{AuthCallbacks, GroupEventListener};
use async_trait::async_trait;
use std::sync::Arc;

/// A JSON list returned together with its element count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnList {
    pub data: String,
    pub count: u32,
}

/// Group management operations.
#[async_trait]
pub trait DeviceGroupManager: Send + Sync {
    async fn register_callback(&self, app_id: &str, callbacks: Arc<dyn AuthCallbacks>) -> i32;

    async fn unregister_callback(&self, app_id: &str) -> i32;

    async fn register_data_change_listener(&self, app_id: &str, listener: Arc<dyn GroupEventListener>) -> i32;

    async fn unregister_data_change_listener(&self, app_id: &str) -> i32;

    async fn create_group(&self, os_account_id: i32, request_id: i64, app_id: &str, create_params: &str) -> i32;

    async fn delete_group(&self, os_account_id: i32, request_id: i64, app_id: &str, del_params: &str) -> i32;

    async fn add_member_to_group(&self, os_account_id: i32, request_id: i64, app_id: &str, add_params: &str) -> i32;

    async fn delete_member_from_group(&self, os_account_id: i32, request_id: i64, app_id: &str, del_params: &str)
        -> i32;

    async fn process_data(&self, request_id: i64, data: &[u8]) -> i32;

    async fn process_credential(&self, operation_code: i32, credential: &str) -> Result<String, i32>;

    async fn get_register_info(&self, req_json: &str) -> Result<String, i32>;

    async fn check_access_to_group(&self, os_account_id: i32, app_id: &str, group_id: &str) -> i32;

    async fn get_pk_info_list(&self, os_account_id: i32, app_id: &str, query_params: &str) -> Result<ReturnList, i32>;

    async fn get_group_info_by_id(&self, os_account_id: i32, app_id: &str, group_id: &str) -> Result<String, i32>;

    async fn get_group_info(&self, os_account_id: i32, app_id: &str, query_params: &str) -> Result<ReturnList, i32>;

    async fn get_joined_groups(&self, os_account_id: i32, app_id: &str, group_type: i32) -> Result<ReturnList, i32>;

    async fn get_related_groups(&self, os_account_id: i32, app_id: &str, peer_udid: &str) -> Result<ReturnList, i32>;

    async fn get_device_info_by_id(
        &self,
        os_account_id: i32,
        app_id: &str,
        peer_udid: &str,
        group_id: &str,
    ) -> Result<String, i32>;

    async fn get_trusted_devices(&self, os_account_id: i32, app_id: &str, group_id: &str) -> Result<ReturnList, i32>;

    async fn is_device_in_group(&self, os_account_id: i32, app_id: &str, group_id: &str, udid: &str) -> bool;
}

/// Group authentication operations.
#[async_trait]
pub trait GroupAuthManager: Send + Sync {
    async fn process_data(&self, auth_req_id: i64, data: &[u8], callbacks: Arc<dyn AuthCallbacks>) -> i32;

    async fn auth_device(
        &self,
        os_account_id: i32,
        auth_req_id: i64,
        auth_params: &str,
        callbacks: Arc<dyn AuthCallbacks>,
    ) -> i32;
}
