//! # Method Handlers
//!
//! One handler per method id. Each reads its parameters from the decoded
//! [`ParamList`], calls the business layer and encodes the reply.
//!
//! ## Reply Convention
//!
//! - `IPC_RESULT` always carries the business result.
//! - Data-returning methods add `IPC_RESULT_NUM` and their payload only on
//!   success.
//! - A handler `Err` never reaches the business layer's result slot; the
//!   dispatcher turns it into the transport result with an empty body.

use crate::adapters::callbacks::{IpcAuthCallbacks, IpcGroupEventListener};
use crate::domain::{
    CallDispatchTable, CallbackKey, CallbackRegistry, DispatchError, HandlerFuture, ServiceConfig,
};
use crate::ipc::invoker::CallbackInvoker;
use crate::ports::inbound::{AuthCallbacks, GroupEventListener};
use crate::ports::outbound::{DeviceGroupManager, GroupAuthManager, ReturnList};
use devauth_transport::Backend;
use devauth_types::{
    result_code, CallbackFns, CallbackType, IpcError, MethodId, ParamList, ParamTag, ParamWriter, SlotHandle,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a handler may touch.
pub struct ServiceContext {
    pub registry: Arc<CallbackRegistry>,
    pub invoker: Arc<CallbackInvoker>,
    pub group_manager: Arc<dyn DeviceGroupManager>,
    pub group_auth: Arc<dyn GroupAuthManager>,
    pub backend: Backend,
    dev_auth_callbacks: Arc<dyn AuthCallbacks>,
    tmp_auth_callbacks: Arc<dyn AuthCallbacks>,
    listener: Arc<dyn GroupEventListener>,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        config: &ServiceConfig,
        group_manager: Arc<dyn DeviceGroupManager>,
        group_auth: Arc<dyn GroupAuthManager>,
    ) -> Self {
        let registry = CallbackRegistry::new(config.max_callbacks, config.max_remote_objects);
        let invoker = Arc::new(CallbackInvoker::new(Arc::clone(&registry), config));
        Self {
            dev_auth_callbacks: Arc::new(IpcAuthCallbacks::new(Arc::clone(&invoker), CallbackType::DevAuth)),
            tmp_auth_callbacks: Arc::new(IpcAuthCallbacks::new(Arc::clone(&invoker), CallbackType::TmpDevAuth)),
            listener: Arc::new(IpcGroupEventListener::new(Arc::clone(&invoker))),
            registry,
            invoker,
            group_manager,
            group_auth,
            backend: config.backend,
        }
    }

    /// Reply carrying only the business result.
    fn reply(&self, result: i32) -> Result<ParamWriter, IpcError> {
        let mut reply = self.backend.param_writer();
        reply.push_i32(ParamTag::IpcResult, result)?;
        Ok(reply)
    }

    fn reply_string(&self, result: Result<String, i32>, tag: ParamTag) -> Result<ParamWriter, IpcError> {
        let data = match result {
            Ok(data) => data,
            Err(code) => return self.reply(code),
        };
        let mut reply = self.reply(result_code::SUCCESS)?;
        reply.push_i32(ParamTag::IpcResultNum, 1)?;
        reply.push_str(tag, &data)?;
        Ok(reply)
    }

    fn reply_list(&self, result: Result<ReturnList, i32>, tag: ParamTag) -> Result<ParamWriter, IpcError> {
        let list = match result {
            Ok(list) => list,
            Err(code) => return self.reply(code),
        };
        let mut reply = self.reply(result_code::SUCCESS)?;
        reply.push_i32(ParamTag::IpcResultNum, 2)?;
        reply.push_str(tag, &list.data)?;
        reply.push_i32(ParamTag::DataNum, i32::try_from(list.count).unwrap_or(i32::MAX))?;
        Ok(reply)
    }

    /// Creates or refreshes the record at `key` and hands it the captured
    /// callback object.
    fn register_record(
        &self,
        key: CallbackKey,
        kind: CallbackType,
        params: &ParamList<'_>,
        hooks_tag: ParamTag,
    ) -> Result<(), IpcError> {
        let fns = CallbackFns::decode(kind, params.get_bytes(hooks_tag)?)?;
        let slot = params.get_slot().ok_or(IpcError::BadParam)?;
        self.registry.add_or_replace(key.clone(), kind, fns)?;
        if let Err(e) = self.registry.attach_remote_handle(&key, kind, slot) {
            self.registry.remove(&key, kind);
            return Err(e.into());
        }
        Ok(())
    }

    /// Drops a freshly registered record the business layer refused, along
    /// with its slot.
    fn settle_registration(&self, key: &CallbackKey, kind: CallbackType, result: i32) {
        if result != result_code::SUCCESS && self.registry.remove(key, kind) {
            debug!(key = %key, kind = ?kind, result, "Registration refused, record removed");
        }
    }

    fn bind_request(&self, app_id: &str, request_id: i64) {
        if let Err(e) = self.registry.bind_request(app_id, request_id) {
            warn!(app_id, request_id, error = %e, "Request not bound to application callbacks");
        }
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("registry", &self.registry)
            .field("backend", &self.backend)
            .finish()
    }
}

/// Registers every method handler.
pub fn set_call_map(table: &mut CallDispatchTable<ServiceContext>) -> Result<(), DispatchError> {
    table.register(MethodId::RegCallback.as_i32(), reg_callback)?;
    table.register(MethodId::UnregCallback.as_i32(), unreg_callback)?;
    table.register(MethodId::RegListener.as_i32(), reg_listener)?;
    table.register(MethodId::UnregListener.as_i32(), unreg_listener)?;
    table.register(MethodId::CreateGroup.as_i32(), create_group)?;
    table.register(MethodId::DeleteGroup.as_i32(), delete_group)?;
    table.register(MethodId::AddGroupMember.as_i32(), add_group_member)?;
    table.register(MethodId::DeleteGroupMember.as_i32(), delete_group_member)?;
    table.register(MethodId::GmProcessData.as_i32(), gm_process_data)?;
    table.register(MethodId::SaveCredential.as_i32(), save_credential)?;
    table.register(MethodId::ApplyRegisterInfo.as_i32(), apply_register_info)?;
    table.register(MethodId::CheckAccessToGroup.as_i32(), check_access_to_group)?;
    table.register(MethodId::GetPkInfoList.as_i32(), get_pk_info_list)?;
    table.register(MethodId::GetGroupInfoById.as_i32(), get_group_info_by_id)?;
    table.register(MethodId::SearchGroups.as_i32(), search_groups)?;
    table.register(MethodId::GetJoinedGroups.as_i32(), get_joined_groups)?;
    table.register(MethodId::GetRelatedGroups.as_i32(), get_related_groups)?;
    table.register(MethodId::GetDeviceInfoById.as_i32(), get_device_info_by_id)?;
    table.register(MethodId::GetTrustedDevices.as_i32(), get_trusted_devices)?;
    table.register(MethodId::IsDeviceInGroup.as_i32(), is_device_in_group)?;
    table.register(MethodId::GaProcessData.as_i32(), ga_process_data)?;
    table.register(MethodId::AuthDevice.as_i32(), auth_device)?;
    debug!(methods = table.len(), "Call map installed");
    Ok(())
}

// =============================================================================
// CALLBACK REGISTRATION
// =============================================================================

fn reg_callback<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let app_id = params.get_str(ParamTag::AppId)?;
        let key = CallbackKey::app(app_id);
        ctx.register_record(key.clone(), CallbackType::DevAuth, params, ParamTag::DevAuthCb)?;
        let result = ctx
            .group_manager
            .register_callback(app_id, Arc::clone(&ctx.dev_auth_callbacks))
            .await;
        ctx.settle_registration(&key, CallbackType::DevAuth, result);
        ctx.reply(result)
    })
}

fn unreg_callback<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let app_id = params.get_str(ParamTag::AppId)?;
        let result = ctx.group_manager.unregister_callback(app_id).await;
        ctx.registry.remove(&CallbackKey::app(app_id), CallbackType::DevAuth);
        ctx.reply(result)
    })
}

fn reg_listener<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let app_id = params.get_str(ParamTag::AppId)?;
        let key = CallbackKey::app(app_id);
        ctx.register_record(key.clone(), CallbackType::Listener, params, ParamTag::Listener)?;
        let result = ctx
            .group_manager
            .register_data_change_listener(app_id, Arc::clone(&ctx.listener))
            .await;
        ctx.settle_registration(&key, CallbackType::Listener, result);
        ctx.reply(result)
    })
}

fn unreg_listener<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let app_id = params.get_str(ParamTag::AppId)?;
        let result = ctx.group_manager.unregister_data_change_listener(app_id).await;
        ctx.registry.remove(&CallbackKey::app(app_id), CallbackType::Listener);
        ctx.reply(result)
    })
}

// =============================================================================
// GROUP MANAGEMENT
// =============================================================================

/// Arguments shared by the four group mutation methods.
struct GroupOpArgs<'a> {
    os_account_id: i32,
    request_id: i64,
    app_id: &'a str,
    op_params: &'a str,
}

impl<'a> GroupOpArgs<'a> {
    /// Parses the arguments and binds the request to the caller's callbacks.
    fn parse(ctx: &ServiceContext, params: &'a ParamList<'a>, op_tag: ParamTag) -> Result<Self, IpcError> {
        let args = Self {
            os_account_id: params.get_i32(ParamTag::OsAccountId)?,
            request_id: params.get_i64(ParamTag::ReqId)?,
            app_id: params.get_str(ParamTag::AppId)?,
            op_params: params.get_str(op_tag)?,
        };
        ctx.bind_request(args.app_id, args.request_id);
        Ok(args)
    }
}

fn create_group<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let args = GroupOpArgs::parse(ctx, params, ParamTag::CreateParams)?;
        let result = ctx
            .group_manager
            .create_group(args.os_account_id, args.request_id, args.app_id, args.op_params)
            .await;
        ctx.reply(result)
    })
}

fn delete_group<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let args = GroupOpArgs::parse(ctx, params, ParamTag::DelParams)?;
        let result = ctx
            .group_manager
            .delete_group(args.os_account_id, args.request_id, args.app_id, args.op_params)
            .await;
        ctx.reply(result)
    })
}

fn add_group_member<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let args = GroupOpArgs::parse(ctx, params, ParamTag::AddParams)?;
        let result = ctx
            .group_manager
            .add_member_to_group(args.os_account_id, args.request_id, args.app_id, args.op_params)
            .await;
        ctx.reply(result)
    })
}

fn delete_group_member<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let args = GroupOpArgs::parse(ctx, params, ParamTag::DelParams)?;
        let result = ctx
            .group_manager
            .delete_member_from_group(args.os_account_id, args.request_id, args.app_id, args.op_params)
            .await;
        ctx.reply(result)
    })
}

fn gm_process_data<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let request_id = params.get_i64(ParamTag::ReqId)?;
        let data = params.get_bytes(ParamTag::CommData)?;
        let result = ctx.group_manager.process_data(request_id, data).await;
        ctx.reply(result)
    })
}

fn save_credential<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let operation_code = params.get_i32(ParamTag::OpCode)?;
        let credential = params.get_str(ParamTag::Credential)?;
        let result = ctx.group_manager.process_credential(operation_code, credential).await;
        ctx.reply_string(result, ParamTag::ReturnData)
    })
}

fn apply_register_info<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let req_json = params.get_str(ParamTag::ReqJson)?;
        let result = ctx.group_manager.get_register_info(req_json).await;
        ctx.reply_string(result, ParamTag::RegInfo)
    })
}

// =============================================================================
// QUERIES
// =============================================================================

fn query_scope<'a>(params: &'a ParamList<'a>) -> Result<(i32, &'a str), IpcError> {
    Ok((params.get_i32(ParamTag::OsAccountId)?, params.get_str(ParamTag::AppId)?))
}

fn check_access_to_group<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let group_id = params.get_str(ParamTag::GroupId)?;
        let result = ctx
            .group_manager
            .check_access_to_group(os_account_id, app_id, group_id)
            .await;
        ctx.reply(result)
    })
}

fn get_pk_info_list<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let query = params.get_str(ParamTag::QueryParams)?;
        let result = ctx.group_manager.get_pk_info_list(os_account_id, app_id, query).await;
        ctx.reply_list(result, ParamTag::ReturnData)
    })
}

fn get_group_info_by_id<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let group_id = params.get_str(ParamTag::GroupId)?;
        let result = ctx
            .group_manager
            .get_group_info_by_id(os_account_id, app_id, group_id)
            .await;
        ctx.reply_string(result, ParamTag::GroupInfo)
    })
}

fn search_groups<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let query = params.get_str(ParamTag::QueryParams)?;
        let result = ctx.group_manager.get_group_info(os_account_id, app_id, query).await;
        ctx.reply_list(result, ParamTag::GroupInfo)
    })
}

fn get_joined_groups<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let group_type = params.get_i32(ParamTag::GroupType)?;
        let result = ctx
            .group_manager
            .get_joined_groups(os_account_id, app_id, group_type)
            .await;
        ctx.reply_list(result, ParamTag::GroupInfo)
    })
}

fn get_related_groups<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let peer_udid = params.get_str(ParamTag::Udid)?;
        let result = ctx
            .group_manager
            .get_related_groups(os_account_id, app_id, peer_udid)
            .await;
        ctx.reply_list(result, ParamTag::GroupInfo)
    })
}

fn get_device_info_by_id<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let peer_udid = params.get_str(ParamTag::Udid)?;
        let group_id = params.get_str(ParamTag::GroupId)?;
        let result = ctx
            .group_manager
            .get_device_info_by_id(os_account_id, app_id, peer_udid, group_id)
            .await;
        ctx.reply_string(result, ParamTag::DeviceInfo)
    })
}

fn get_trusted_devices<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let group_id = params.get_str(ParamTag::GroupId)?;
        let result = ctx
            .group_manager
            .get_trusted_devices(os_account_id, app_id, group_id)
            .await;
        ctx.reply_list(result, ParamTag::DeviceInfo)
    })
}

fn is_device_in_group<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let (os_account_id, app_id) = query_scope(params)?;
        let group_id = params.get_str(ParamTag::GroupId)?;
        let udid = params.get_str(ParamTag::Udid)?;
        let member = ctx
            .group_manager
            .is_device_in_group(os_account_id, app_id, group_id, udid)
            .await;
        ctx.reply(if member { result_code::SUCCESS } else { result_code::ERROR })
    })
}

// =============================================================================
// GROUP AUTHENTICATION
// =============================================================================

/// Registers the transient record of an authentication request.
fn register_transient(ctx: &ServiceContext, request_id: i64, params: &ParamList<'_>) -> Result<CallbackKey, IpcError> {
    let key = CallbackKey::Request(request_id);
    ctx.register_record(key.clone(), CallbackType::TmpDevAuth, params, ParamTag::DevAuthCb)?;
    Ok(key)
}

/// Drops the transient record when the business layer rejected the request.
fn settle_transient(ctx: &ServiceContext, key: &CallbackKey, result: i32) -> Result<ParamWriter, IpcError> {
    if result != result_code::SUCCESS {
        ctx.registry.remove(key, CallbackType::TmpDevAuth);
        debug!(key = %key, result, "Authentication request rejected");
    }
    ctx.reply(result)
}

fn ga_process_data<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let request_id = params.get_i64(ParamTag::ReqId)?;
        let data = params.get_bytes(ParamTag::CommData)?;
        let key = register_transient(ctx, request_id, params)?;
        let result = ctx
            .group_auth
            .process_data(request_id, data, Arc::clone(&ctx.tmp_auth_callbacks))
            .await;
        settle_transient(ctx, &key, result)
    })
}

fn auth_device<'a>(ctx: &'a ServiceContext, params: &'a ParamList<'a>) -> HandlerFuture<'a> {
    Box::pin(async move {
        let os_account_id = params.get_i32(ParamTag::OsAccountId)?;
        let request_id = params.get_i64(ParamTag::ReqId)?;
        let auth_params = params.get_str(ParamTag::AuthParams)?;
        let key = register_transient(ctx, request_id, params)?;
        let result = ctx
            .group_auth
            .auth_device(os_account_id, request_id, auth_params, Arc::clone(&ctx.tmp_auth_callbacks))
            .await;
        settle_transient(ctx, &key, result)
    })
}

/// Releases a slot captured for a request whose handler failed before
/// attaching it.
pub(crate) fn release_unclaimed(ctx: &ServiceContext, slot: Option<SlotHandle>) {
    if let Some(slot) = slot {
        ctx.registry.release_orphan_slot(slot);
    }
}
