//! # Device-Auth Client
//!
//! Application-facing proxy for every group-manager and group-auth operation.
//!
//! ## Call Flow
//!
//! ```text
//! op(args) ──► service running? ──► validate ──► ProxyCall ──► send ──► CallReply ──► typed result
//!                    │                  │            │            │
//!            ServiceUnavailable   InvalidParams  BuildParam   ProcFailed
//! ```
//!
//! Operations that hand the service a callback set register its closures in
//! the client [`HookTable`] first and attach one of the client's two stub
//! objects: the bind stub for per-application registrations, the auth stub
//! for per-request authentication. Hooks of a failed registration are
//! released before the error is returned.

use crate::callbacks::{DataChangeListener, DeviceAuthCallback};
use crate::config::ClientConfig;
use crate::errors::{ProxyError, SdkError};
use crate::hooks::HookTable;
use crate::proxy::{Accumulating, CallReply, Empty, Finalized, ProxyCall};
use crate::stub::{ClientCallbackStub, TransientHooks};
use devauth_transport::{LocalObject, RemoteObject, ServiceLocator};
use devauth_types::{
    result_code, DevAuthHooks, ListenerHooks, MethodId, ParamTag, DEVICE_AUTH_SERVICE_ID, MAX_COMM_DATA_LEN,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Payload of a list query together with its entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub info: String,
    pub count: u32,
}

fn require_str(value: &str, name: &'static str) -> Result<(), SdkError> {
    if value.is_empty() {
        return Err(SdkError::InvalidParams(name));
    }
    Ok(())
}

fn require_data(data: &[u8]) -> Result<(), SdkError> {
    if data.is_empty() || data.len() > MAX_COMM_DATA_LEN {
        return Err(SdkError::InvalidParams("data"));
    }
    Ok(())
}

pub struct DeviceAuthClient {
    config: ClientConfig,
    locator: Arc<ServiceLocator>,
    hooks: Arc<HookTable>,
    transient: TransientHooks,
    bind_stub: Arc<LocalObject>,
    auth_stub: Arc<LocalObject>,
    callbacks: Mutex<HashMap<String, DevAuthHooks>>,
    listeners: Mutex<HashMap<String, ListenerHooks>>,
    closed: AtomicBool,
}

impl DeviceAuthClient {
    #[must_use]
    pub fn new(config: ClientConfig, locator: Arc<ServiceLocator>) -> Self {
        let hooks = Arc::new(HookTable::new());
        let transient: TransientHooks = Arc::new(Mutex::new(HashMap::new()));
        let stub = || {
            LocalObject::new(Arc::new(ClientCallbackStub::new(
                Arc::clone(&hooks),
                Arc::clone(&transient),
                config.interface_token.clone(),
            )))
        };
        let bind_stub = stub();
        let auth_stub = stub();
        Self {
            config,
            locator,
            hooks,
            transient,
            bind_stub,
            auth_stub,
            callbacks: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Client-side hook table; holds every closure the service may call.
    pub fn hooks(&self) -> &Arc<HookTable> {
        &self.hooks
    }

    /// Number of requests whose transient callbacks are still pending.
    pub fn pending_requests(&self) -> usize {
        self.transient.lock().len()
    }

    fn service(&self) -> Result<Arc<dyn RemoteObject>, SdkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SdkError::IpcInit);
        }
        self.locator.require_service(DEVICE_AUTH_SERVICE_ID).map_err(|e| {
            warn!(error = %e, "Device-auth service is not running");
            SdkError::ServiceUnavailable
        })
    }

    fn stage(&self) -> ProxyCall<Empty> {
        ProxyCall::new(&self.config)
    }

    async fn call(
        &self,
        service: &Arc<dyn RemoteObject>,
        method: MethodId,
        staged: Result<ProxyCall<Finalized>, ProxyError>,
    ) -> Result<CallReply, SdkError> {
        let staged = staged.map_err(|e| {
            warn!(method = ?method, error = %e, "Failed to stage call");
            SdkError::from(e)
        })?;
        staged.call(service.as_ref()).await.map_err(|e| {
            warn!(method = ?method, error = %e, "Method call failed");
            SdkError::from(e)
        })
    }

    /// Call whose only reply payload is the business result.
    async fn call_result(
        &self,
        service: &Arc<dyn RemoteObject>,
        method: MethodId,
        staged: Result<ProxyCall<Finalized>, ProxyError>,
    ) -> Result<(), SdkError> {
        self.call(service, method, staged).await?.require_success()
    }

    async fn call_string(
        &self,
        service: &Arc<dyn RemoteObject>,
        method: MethodId,
        staged: Result<ProxyCall<Finalized>, ProxyError>,
        tag: ParamTag,
    ) -> Result<String, SdkError> {
        let reply = self.call(service, method, staged).await?;
        reply.require_success()?;
        reply.require_entries(1)?;
        reply.string(tag)
    }

    async fn call_list(
        &self,
        service: &Arc<dyn RemoteObject>,
        method: MethodId,
        staged: Result<ProxyCall<Finalized>, ProxyError>,
        tag: ParamTag,
    ) -> Result<QueryResult, SdkError> {
        let reply = self.call(service, method, staged).await?;
        reply.require_success()?;
        reply.require_entries(2)?;
        let info = reply.string(tag)?;
        let count = u32::try_from(reply.i32_value(ParamTag::DataNum)?).map_err(|_| SdkError::OutData)?;
        Ok(QueryResult { info, count })
    }

    // =========================================================================
    // CALLBACK REGISTRATION
    // =========================================================================

    /// Registers the persistent device-auth callbacks of `app_id`, replacing
    /// any earlier set.
    pub async fn register_callback(&self, app_id: &str, callback: DeviceAuthCallback) -> Result<(), SdkError> {
        let service = self.service()?;
        require_str(app_id, "app_id")?;

        let hooks = self.hooks.register_auth(&callback);
        let method = MethodId::RegCallback;
        let staged = self
            .stage()
            .add_str(ParamTag::AppId, app_id)
            .and_then(|c| c.add_param(ParamTag::DevAuthCb, Some(&hooks.encode())))
            .map(|c| c.attach_callback(self.bind_stub.clone()))
            .and_then(|c| c.finalize(method));
        if let Err(e) = self.call_result(&service, method, staged).await {
            self.hooks.release_auth(&hooks);
            return Err(e);
        }

        if let Some(previous) = self.callbacks.lock().insert(app_id.to_string(), hooks) {
            self.hooks.release_auth(&previous);
        }
        info!(app_id, "[DevAuth] Callbacks registered");
        Ok(())
    }

    /// Always succeeds locally; a failed service call is only logged.
    pub async fn unregister_callback(&self, app_id: &str) -> Result<(), SdkError> {
        require_str(app_id, "app_id")?;
        if let Ok(service) = self.service() {
            let method = MethodId::UnregCallback;
            let staged = self.stage().add_str(ParamTag::AppId, app_id).and_then(|c| c.finalize(method));
            if let Err(e) = self.call_result(&service, method, staged).await {
                debug!(app_id, error = %e, "Service-side unregistration failed");
            }
        }
        if let Some(hooks) = self.callbacks.lock().remove(app_id) {
            self.hooks.release_auth(&hooks);
        }
        Ok(())
    }

    pub async fn register_data_change_listener(
        &self,
        app_id: &str,
        listener: DataChangeListener,
    ) -> Result<(), SdkError> {
        let service = self.service()?;
        require_str(app_id, "app_id")?;

        let hooks = self.hooks.register_listener(&listener);
        let method = MethodId::RegListener;
        let staged = self
            .stage()
            .add_str(ParamTag::AppId, app_id)
            .and_then(|c| c.add_param(ParamTag::Listener, Some(&hooks.encode())))
            .map(|c| c.attach_callback(self.bind_stub.clone()))
            .and_then(|c| c.finalize(method));
        if let Err(e) = self.call_result(&service, method, staged).await {
            self.hooks.release_listener(&hooks);
            return Err(e);
        }

        if let Some(previous) = self.listeners.lock().insert(app_id.to_string(), hooks) {
            self.hooks.release_listener(&previous);
        }
        info!(app_id, "[DevAuth] Data change listener registered");
        Ok(())
    }

    pub async fn unregister_data_change_listener(&self, app_id: &str) -> Result<(), SdkError> {
        let service = self.service()?;
        require_str(app_id, "app_id")?;
        let method = MethodId::UnregListener;
        let staged = self.stage().add_str(ParamTag::AppId, app_id).and_then(|c| c.finalize(method));
        let result = self.call_result(&service, method, staged).await;
        if let Some(hooks) = self.listeners.lock().remove(app_id) {
            self.hooks.release_listener(&hooks);
        }
        result
    }

    // =========================================================================
    // GROUP MANAGEMENT
    // =========================================================================

    async fn group_op(
        &self,
        method: MethodId,
        os_account_id: i32,
        request_id: i64,
        app_id: &str,
        tag: ParamTag,
        params: &str,
    ) -> Result<(), SdkError> {
        let service = self.service()?;
        require_str(app_id, "app_id")?;
        require_str(params, "params")?;
        let staged = self
            .stage()
            .add_i32(ParamTag::OsAccountId, os_account_id)
            .and_then(|c| c.add_i64(ParamTag::ReqId, request_id))
            .and_then(|c| c.add_str(ParamTag::AppId, app_id))
            .and_then(|c| c.add_str(tag, params))
            .and_then(|c| c.finalize(method));
        self.call_result(&service, method, staged).await
    }

    pub async fn create_group(
        &self,
        os_account_id: i32,
        request_id: i64,
        app_id: &str,
        create_params: &str,
    ) -> Result<(), SdkError> {
        self.group_op(
            MethodId::CreateGroup,
            os_account_id,
            request_id,
            app_id,
            ParamTag::CreateParams,
            create_params,
        )
        .await
    }

    pub async fn delete_group(
        &self,
        os_account_id: i32,
        request_id: i64,
        app_id: &str,
        disband_params: &str,
    ) -> Result<(), SdkError> {
        self.group_op(
            MethodId::DeleteGroup,
            os_account_id,
            request_id,
            app_id,
            ParamTag::DelParams,
            disband_params,
        )
        .await
    }

    pub async fn add_member_to_group(
        &self,
        os_account_id: i32,
        request_id: i64,
        app_id: &str,
        add_params: &str,
    ) -> Result<(), SdkError> {
        self.group_op(
            MethodId::AddGroupMember,
            os_account_id,
            request_id,
            app_id,
            ParamTag::AddParams,
            add_params,
        )
        .await
    }

    pub async fn delete_member_from_group(
        &self,
        os_account_id: i32,
        request_id: i64,
        app_id: &str,
        delete_params: &str,
    ) -> Result<(), SdkError> {
        self.group_op(
            MethodId::DeleteGroupMember,
            os_account_id,
            request_id,
            app_id,
            ParamTag::DelParams,
            delete_params,
        )
        .await
    }

    /// Feeds a received binding message into the group manager.
    pub async fn process_data(&self, request_id: i64, data: &[u8]) -> Result<(), SdkError> {
        let service = self.service()?;
        require_data(data)?;
        let method = MethodId::GmProcessData;
        let staged = self
            .stage()
            .add_i64(ParamTag::ReqId, request_id)
            .and_then(|c| c.add_param(ParamTag::CommData, Some(data)))
            .and_then(|c| c.finalize(method));
        self.call_result(&service, method, staged).await
    }

    pub async fn process_credential(&self, operation_code: i32, credential: &str) -> Result<String, SdkError> {
        let service = self.service()?;
        require_str(credential, "credential")?;
        let method = MethodId::SaveCredential;
        let staged = self
            .stage()
            .add_i32(ParamTag::OpCode, operation_code)
            .and_then(|c| c.add_str(ParamTag::Credential, credential))
            .and_then(|c| c.finalize(method));
        self.call_string(&service, method, staged, ParamTag::ReturnData).await
    }

    /// Registration info for `req_json`. Any business failure reads as a
    /// bad parameter.
    pub async fn get_register_info(&self, req_json: &str) -> Result<String, SdkError> {
        let service = self.service()?;
        require_str(req_json, "req_json")?;
        let method = MethodId::ApplyRegisterInfo;
        let staged = self
            .stage()
            .add_str(ParamTag::ReqJson, req_json)
            .and_then(|c| c.finalize(method));
        self.call_string(&service, method, staged, ParamTag::RegInfo)
            .await
            .map_err(|e| match e {
                SdkError::Business(_) => SdkError::BadParam,
                other => other,
            })
    }

    pub async fn check_access_to_group(&self, os_account_id: i32, app_id: &str, group_id: &str) -> Result<(), SdkError> {
        let method = MethodId::CheckAccessToGroup;
        let (service, staged) =
            self.scoped_query(method, os_account_id, app_id, &[(ParamTag::GroupId, group_id, "group_id")])?;
        self.call_result(&service, method, staged).await
    }

    /// Stages the `(os account, app id)` scope every query starts with.
    fn scoped(
        &self,
        os_account_id: i32,
        app_id: &str,
    ) -> Result<ProxyCall<Accumulating>, ProxyError> {
        self.stage()
            .add_i32(ParamTag::OsAccountId, os_account_id)
            .and_then(|c| c.add_str(ParamTag::AppId, app_id))
    }

    /// Resolves the service and stages a scoped query whose remaining
    /// arguments are required strings, validated in order.
    fn scoped_query(
        &self,
        method: MethodId,
        os_account_id: i32,
        app_id: &str,
        args: &[(ParamTag, &str, &'static str)],
    ) -> Result<(Arc<dyn RemoteObject>, Result<ProxyCall<Finalized>, ProxyError>), SdkError> {
        let service = self.service()?;
        require_str(app_id, "app_id")?;
        for (_, value, name) in args {
            require_str(value, *name)?;
        }
        let staged = self
            .scoped(os_account_id, app_id)
            .and_then(|c| args.iter().try_fold(c, |c, (tag, value, _)| c.add_str(*tag, value)))
            .and_then(|c| c.finalize(method));
        Ok((service, staged))
    }

    async fn query_list(
        &self,
        method: MethodId,
        os_account_id: i32,
        app_id: &str,
        args: &[(ParamTag, &str, &'static str)],
        tag: ParamTag,
    ) -> Result<QueryResult, SdkError> {
        let (service, staged) = self.scoped_query(method, os_account_id, app_id, args)?;
        self.call_list(&service, method, staged, tag).await
    }

    async fn query_string(
        &self,
        method: MethodId,
        os_account_id: i32,
        app_id: &str,
        args: &[(ParamTag, &str, &'static str)],
        tag: ParamTag,
    ) -> Result<String, SdkError> {
        let (service, staged) = self.scoped_query(method, os_account_id, app_id, args)?;
        self.call_string(&service, method, staged, tag).await
    }

    pub async fn get_pk_info_list(
        &self,
        os_account_id: i32,
        app_id: &str,
        query_params: &str,
    ) -> Result<QueryResult, SdkError> {
        let args = [(ParamTag::QueryParams, query_params, "query_params")];
        self.query_list(MethodId::GetPkInfoList, os_account_id, app_id, &args, ParamTag::ReturnData)
            .await
    }

    pub async fn get_group_info_by_id(
        &self,
        os_account_id: i32,
        app_id: &str,
        group_id: &str,
    ) -> Result<String, SdkError> {
        let args = [(ParamTag::GroupId, group_id, "group_id")];
        self.query_string(MethodId::GetGroupInfoById, os_account_id, app_id, &args, ParamTag::GroupInfo)
            .await
    }

    /// Groups matching `query_params`.
    pub async fn get_group_info(
        &self,
        os_account_id: i32,
        app_id: &str,
        query_params: &str,
    ) -> Result<QueryResult, SdkError> {
        let args = [(ParamTag::QueryParams, query_params, "query_params")];
        self.query_list(MethodId::SearchGroups, os_account_id, app_id, &args, ParamTag::GroupInfo)
            .await
    }

    pub async fn get_joined_groups(
        &self,
        os_account_id: i32,
        app_id: &str,
        group_type: i32,
    ) -> Result<QueryResult, SdkError> {
        let service = self.service()?;
        require_str(app_id, "app_id")?;
        let method = MethodId::GetJoinedGroups;
        let staged = self
            .scoped(os_account_id, app_id)
            .and_then(|c| c.add_i32(ParamTag::GroupType, group_type))
            .and_then(|c| c.finalize(method));
        self.call_list(&service, method, staged, ParamTag::GroupInfo).await
    }

    pub async fn get_related_groups(
        &self,
        os_account_id: i32,
        app_id: &str,
        peer_udid: &str,
    ) -> Result<QueryResult, SdkError> {
        let args = [(ParamTag::Udid, peer_udid, "peer_udid")];
        self.query_list(MethodId::GetRelatedGroups, os_account_id, app_id, &args, ParamTag::GroupInfo)
            .await
    }

    pub async fn get_device_info_by_id(
        &self,
        os_account_id: i32,
        app_id: &str,
        device_id: &str,
        group_id: &str,
    ) -> Result<String, SdkError> {
        let args = [
            (ParamTag::Udid, device_id, "device_id"),
            (ParamTag::GroupId, group_id, "group_id"),
        ];
        self.query_string(MethodId::GetDeviceInfoById, os_account_id, app_id, &args, ParamTag::DeviceInfo)
            .await
    }

    pub async fn get_trusted_devices(
        &self,
        os_account_id: i32,
        app_id: &str,
        group_id: &str,
    ) -> Result<QueryResult, SdkError> {
        let args = [(ParamTag::GroupId, group_id, "group_id")];
        self.query_list(MethodId::GetTrustedDevices, os_account_id, app_id, &args, ParamTag::DeviceInfo)
            .await
    }

    /// Any failure along the way reads as "not a member".
    pub async fn is_device_in_group(&self, os_account_id: i32, app_id: &str, group_id: &str, device_id: &str) -> bool {
        self.membership(os_account_id, app_id, group_id, device_id).await.is_ok()
    }

    async fn membership(&self, os_account_id: i32, app_id: &str, group_id: &str, device_id: &str) -> Result<(), SdkError> {
        let method = MethodId::IsDeviceInGroup;
        let args = [
            (ParamTag::GroupId, group_id, "group_id"),
            (ParamTag::Udid, device_id, "device_id"),
        ];
        let (service, staged) = self.scoped_query(method, os_account_id, app_id, &args)?;
        self.call_result(&service, method, staged).await
    }

    // =========================================================================
    // GROUP AUTHENTICATION
    // =========================================================================

    /// Enters `callback` as the transient callbacks of `request_id`, then
    /// runs the call. The hooks are dropped again if the call fails.
    async fn with_transient<F>(
        &self,
        service: &Arc<dyn RemoteObject>,
        method: MethodId,
        request_id: i64,
        callback: &DeviceAuthCallback,
        stage: F,
    ) -> Result<(), SdkError>
    where
        F: FnOnce(DevAuthHooks) -> Result<ProxyCall<Finalized>, ProxyError>,
    {
        let hooks = self.hooks.register_auth(callback);
        if let Some(previous) = self.transient.lock().insert(request_id, hooks) {
            self.hooks.release_auth(&previous);
        }

        let staged = stage(hooks).map(|c| c.attach_callback(self.auth_stub.clone()));
        let result = self.call_result(service, method, staged).await;
        if result.is_err() {
            let released = {
                let mut transient = self.transient.lock();
                match transient.get(&request_id) {
                    Some(current) if *current == hooks => transient.remove(&request_id),
                    _ => None,
                }
            };
            if let Some(hooks) = released {
                self.hooks.release_auth(&hooks);
            }
        }
        result
    }

    /// Feeds an authentication message for `request_id` into group auth.
    pub async fn auth_process_data(
        &self,
        request_id: i64,
        data: &[u8],
        callback: DeviceAuthCallback,
    ) -> Result<(), SdkError> {
        let service = self.service()?;
        require_data(data)?;
        let method = MethodId::GaProcessData;
        self.with_transient(&service, method, request_id, &callback, |hooks| {
            self.stage()
                .add_i64(ParamTag::ReqId, request_id)
                .and_then(|c| c.add_param(ParamTag::CommData, Some(data)))
                .and_then(|c| c.add_param(ParamTag::DevAuthCb, Some(&hooks.encode())))
                .and_then(|c| c.finalize(method))
        })
        .await
    }

    pub async fn auth_device(
        &self,
        os_account_id: i32,
        request_id: i64,
        auth_params: &str,
        callback: DeviceAuthCallback,
    ) -> Result<(), SdkError> {
        let service = self.service()?;
        require_str(auth_params, "auth_params")?;
        let method = MethodId::AuthDevice;
        self.with_transient(&service, method, request_id, &callback, |hooks| {
            self.stage()
                .add_i32(ParamTag::OsAccountId, os_account_id)
                .and_then(|c| c.add_i64(ParamTag::ReqId, request_id))
                .and_then(|c| c.add_str(ParamTag::AuthParams, auth_params))
                .and_then(|c| c.add_param(ParamTag::DevAuthCb, Some(&hooks.encode())))
                .and_then(|c| c.finalize(method))
        })
        .await
    }

    /// Tears the client down. Later calls fail with [`SdkError::IpcInit`].
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.bind_stub.kill();
        self.auth_stub.kill();
        self.callbacks.lock().clear();
        self.listeners.lock().clear();
        self.transient.lock().clear();
        self.hooks.clear();
        info!("[DevAuth] Client shut down");
    }
}

impl std::fmt::Debug for DeviceAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAuthClient")
            .field("backend", &self.config.backend)
            .field("hooks", &self.hooks.len())
            .field("pending_requests", &self.transient.lock().len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
