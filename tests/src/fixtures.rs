//! # Test Fixtures
//!
//! A scriptable business layer and a harness that publishes a real
//! [`DevAuthService`] on an in-memory [`ServiceLocator`].

use async_trait::async_trait;
use devauth_sdk::{ClientConfig, DeviceAuthClient};
use devauth_service::{
    AuthCallbacks, DevAuthService, DeviceGroupManager, GroupAuthManager, GroupEventListener, ReturnList,
    ServiceConfig, ServiceError,
};
use devauth_transport::ServiceLocator;
use devauth_types::result_code;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Small tables and short timeouts.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        max_callbacks: 8,
        max_remote_objects: 8,
        callback_timeout: Duration::from_secs(2),
        ..ServiceConfig::default()
    }
}

/// Polls `condition` for up to one second.
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =============================================================================
// GROUP MANAGER
// =============================================================================

/// Group manager that records each call and answers from fixed data.
///
/// Every operation fails with `result` when it is not `SUCCESS`.
#[derive(Default)]
pub struct FakeGroupManager {
    calls: Mutex<Vec<String>>,
    auth_callbacks: Mutex<Option<Arc<dyn AuthCallbacks>>>,
    listener: Mutex<Option<Arc<dyn GroupEventListener>>>,
    result: Mutex<i32>,
}

impl FakeGroupManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn set_result(&self, result: i32) {
        *self.result.lock() = result;
    }

    /// Sink handed over by the latest `register_callback`.
    pub fn auth_callbacks(&self) -> Option<Arc<dyn AuthCallbacks>> {
        self.auth_callbacks.lock().clone()
    }

    /// Sink handed over by the latest `register_data_change_listener`.
    pub fn listener(&self) -> Option<Arc<dyn GroupEventListener>> {
        self.listener.lock().clone()
    }

    fn record(&self, call: String) -> i32 {
        self.calls.lock().push(call);
        *self.result.lock()
    }

    fn answer<T>(&self, call: String, value: impl FnOnce() -> T) -> Result<T, i32> {
        match self.record(call) {
            result_code::SUCCESS => Ok(value()),
            code => Err(code),
        }
    }
}

#[async_trait]
impl DeviceGroupManager for FakeGroupManager {
    async fn register_callback(&self, app_id: &str, callbacks: Arc<dyn AuthCallbacks>) -> i32 {
        *self.auth_callbacks.lock() = Some(callbacks);
        self.record(format!("register_callback:{app_id}"))
    }

    async fn unregister_callback(&self, app_id: &str) -> i32 {
        self.record(format!("unregister_callback:{app_id}"))
    }

    async fn register_data_change_listener(&self, app_id: &str, listener: Arc<dyn GroupEventListener>) -> i32 {
        *self.listener.lock() = Some(listener);
        self.record(format!("register_listener:{app_id}"))
    }

    async fn unregister_data_change_listener(&self, app_id: &str) -> i32 {
        self.record(format!("unregister_listener:{app_id}"))
    }

    async fn create_group(&self, os_account_id: i32, request_id: i64, app_id: &str, create_params: &str) -> i32 {
        self.record(format!("create_group:{os_account_id}:{request_id}:{app_id}:{create_params}"))
    }

    async fn delete_group(&self, os_account_id: i32, request_id: i64, app_id: &str, del_params: &str) -> i32 {
        self.record(format!("delete_group:{os_account_id}:{request_id}:{app_id}:{del_params}"))
    }

    async fn add_member_to_group(&self, os_account_id: i32, request_id: i64, app_id: &str, add_params: &str) -> i32 {
        self.record(format!("add_member:{os_account_id}:{request_id}:{app_id}:{add_params}"))
    }

    async fn delete_member_from_group(
        &self,
        os_account_id: i32,
        request_id: i64,
        app_id: &str,
        del_params: &str,
    ) -> i32 {
        self.record(format!("delete_member:{os_account_id}:{request_id}:{app_id}:{del_params}"))
    }

    async fn process_data(&self, request_id: i64, data: &[u8]) -> i32 {
        self.record(format!("gm_process_data:{request_id}:{}", data.len()))
    }

    async fn process_credential(&self, operation_code: i32, credential: &str) -> Result<String, i32> {
        self.answer(format!("process_credential:{operation_code}:{credential}"), || {
            format!("{{\"operationCode\":{operation_code}}}")
        })
    }

    async fn get_register_info(&self, req_json: &str) -> Result<String, i32> {
        self.answer(format!("get_register_info:{req_json}"), || {
            "{\"version\":\"1.0.0\",\"deviceId\":\"local\"}".to_string()
        })
    }

    async fn check_access_to_group(&self, os_account_id: i32, app_id: &str, group_id: &str) -> i32 {
        self.record(format!("check_access:{os_account_id}:{app_id}:{group_id}"))
    }

    async fn get_pk_info_list(&self, _os: i32, app_id: &str, query_params: &str) -> Result<ReturnList, i32> {
        self.answer(format!("get_pk_info_list:{app_id}:{query_params}"), || ReturnList {
            data: "[{\"pk\":\"0a0b\"}]".to_string(),
            count: 1,
        })
    }

    async fn get_group_info_by_id(&self, _os: i32, app_id: &str, group_id: &str) -> Result<String, i32> {
        self.answer(format!("get_group_info_by_id:{app_id}:{group_id}"), || {
            format!("{{\"groupId\":\"{group_id}\"}}")
        })
    }

    async fn get_group_info(&self, _os: i32, app_id: &str, query_params: &str) -> Result<ReturnList, i32> {
        self.answer(format!("get_group_info:{app_id}:{query_params}"), || ReturnList {
            data: "[{\"groupId\":\"g1\"},{\"groupId\":\"g2\"}]".to_string(),
            count: 2,
        })
    }

    async fn get_joined_groups(&self, _os: i32, app_id: &str, group_type: i32) -> Result<ReturnList, i32> {
        self.answer(format!("get_joined_groups:{app_id}:{group_type}"), || ReturnList {
            data: "[{\"groupId\":\"g1\"}]".to_string(),
            count: 1,
        })
    }

    async fn get_related_groups(&self, _os: i32, app_id: &str, peer_udid: &str) -> Result<ReturnList, i32> {
        self.answer(format!("get_related_groups:{app_id}:{peer_udid}"), || ReturnList {
            data: "[]".to_string(),
            count: 0,
        })
    }

    async fn get_device_info_by_id(
        &self,
        _os: i32,
        app_id: &str,
        peer_udid: &str,
        group_id: &str,
    ) -> Result<String, i32> {
        self.answer(format!("get_device_info_by_id:{app_id}:{peer_udid}:{group_id}"), || {
            format!("{{\"udid\":\"{peer_udid}\"}}")
        })
    }

    async fn get_trusted_devices(&self, _os: i32, app_id: &str, group_id: &str) -> Result<ReturnList, i32> {
        self.answer(format!("get_trusted_devices:{app_id}:{group_id}"), || ReturnList {
            data: "[{\"udid\":\"a\"},{\"udid\":\"b\"}]".to_string(),
            count: 2,
        })
    }

    async fn is_device_in_group(&self, _os: i32, app_id: &str, group_id: &str, udid: &str) -> bool {
        self.record(format!("is_device_in_group:{app_id}:{group_id}:{udid}"));
        udid == "member"
    }
}

// =============================================================================
// GROUP AUTH
// =============================================================================

/// What the fake group-auth layer does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScript {
    /// Accept and leave the request pending.
    Pending,
    /// Deliver `on_finish` before returning.
    Finish,
    /// Transmit the inbound data, return the session key, then finish.
    FullExchange,
    /// Deliver `on_error` with this code and no error info.
    Fail(i32),
    /// Return this code without calling back.
    Reject(i32),
}

pub struct FakeGroupAuth {
    calls: Mutex<Vec<String>>,
    script: Mutex<AuthScript>,
    transmit_accepted: Mutex<Vec<bool>>,
}

impl FakeGroupAuth {
    pub fn new(script: AuthScript) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script),
            transmit_accepted: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_script(&self, script: AuthScript) {
        *self.script.lock() = script;
    }

    /// Replies of the client's transmit callback, in order.
    pub fn transmit_accepted(&self) -> Vec<bool> {
        self.transmit_accepted.lock().clone()
    }

    async fn run(&self, request_id: i64, data: &[u8], callbacks: Arc<dyn AuthCallbacks>) -> i32 {
        let script = *self.script.lock();
        match script {
            AuthScript::Pending => result_code::SUCCESS,
            AuthScript::Finish => {
                callbacks.on_finish(request_id, 0, "{\"result\":\"ok\"}").await;
                result_code::SUCCESS
            }
            AuthScript::FullExchange => {
                let accepted = callbacks.on_transmit(request_id, data).await;
                self.transmit_accepted.lock().push(accepted);
                callbacks.on_session_key_returned(request_id, &[0x5a; 16]).await;
                callbacks.on_finish(request_id, 0, "{\"result\":\"ok\"}").await;
                result_code::SUCCESS
            }
            AuthScript::Fail(code) => {
                callbacks.on_error(request_id, 0, code, None).await;
                result_code::SUCCESS
            }
            AuthScript::Reject(code) => code,
        }
    }
}

#[async_trait]
impl GroupAuthManager for FakeGroupAuth {
    async fn process_data(&self, auth_req_id: i64, data: &[u8], callbacks: Arc<dyn AuthCallbacks>) -> i32 {
        self.calls
            .lock()
            .push(format!("ga_process_data:{auth_req_id}:{}", data.len()));
        self.run(auth_req_id, data, callbacks).await
    }

    async fn auth_device(
        &self,
        os_account_id: i32,
        auth_req_id: i64,
        auth_params: &str,
        callbacks: Arc<dyn AuthCallbacks>,
    ) -> i32 {
        self.calls
            .lock()
            .push(format!("auth_device:{os_account_id}:{auth_req_id}:{auth_params}"));
        self.run(auth_req_id, auth_params.as_bytes(), callbacks).await
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// A published service with fake business managers behind it.
pub struct Harness {
    pub locator: Arc<ServiceLocator>,
    pub service: DevAuthService,
    pub group_manager: Arc<FakeGroupManager>,
    pub group_auth: Arc<FakeGroupAuth>,
}

impl Harness {
    pub fn start() -> Result<Self, ServiceError> {
        Self::with_config(test_config(), AuthScript::Finish)
    }

    pub fn with_config(config: ServiceConfig, script: AuthScript) -> Result<Self, ServiceError> {
        let locator = Arc::new(ServiceLocator::new());
        let group_manager = FakeGroupManager::new();
        let group_auth = FakeGroupAuth::new(script);
        let service = DevAuthService::new(config, group_manager.clone(), group_auth.clone())?;
        service.publish(&locator);
        Ok(Self {
            locator,
            service,
            group_manager,
            group_auth,
        })
    }

    /// Client configuration matching the service's backend.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            backend: self.service.config().backend,
            call_timeout: Duration::from_secs(2),
            interface_token: self.service.config().interface_token.clone(),
            ..ClientConfig::default()
        }
    }

    pub fn client(&self) -> DeviceAuthClient {
        DeviceAuthClient::new(self.client_config(), Arc::clone(&self.locator))
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness").field("service", &self.service).finish()
    }
}
