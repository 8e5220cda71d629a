//! Service instance lifecycle.
//!
//! ```text
//! new() ──► publish(locator) ──► ... requests ... ──► shutdown(locator)
//! ```

use crate::domain::{CallDispatchTable, CallbackRegistry, ServiceConfig, ServiceError};
use crate::ipc::{set_call_map, CallbackInvoker, ServiceContext, StubRequestDispatcher};
use crate::ports::outbound::{DeviceGroupManager, GroupAuthManager};
use devauth_transport::{LocalObject, RemoteObject, ServiceLocator, TransportError};
use devauth_types::DEVICE_AUTH_SERVICE_ID;
use std::sync::Arc;
use tracing::info;

/// The device-auth service: dispatcher, registry and invoker behind one
/// remote object.
pub struct DevAuthService {
    config: ServiceConfig,
    dispatcher: Arc<StubRequestDispatcher>,
    object: Arc<LocalObject>,
}

impl DevAuthService {
    /// Builds the registry, the invoker and the full call map.
    pub fn new(
        config: ServiceConfig,
        group_manager: Arc<dyn DeviceGroupManager>,
        group_auth: Arc<dyn GroupAuthManager>,
    ) -> Result<Self, ServiceError> {
        if config.max_callbacks == 0 || config.max_remote_objects == 0 {
            return Err(ServiceError::Config("registry capacities must be positive".to_string()));
        }
        if config.interface_token.is_empty() {
            return Err(ServiceError::Config("interface token must not be empty".to_string()));
        }

        let context = Arc::new(ServiceContext::new(&config, group_manager, group_auth));
        let mut table = CallDispatchTable::new();
        set_call_map(&mut table)?;
        let dispatcher = Arc::new(StubRequestDispatcher::new(
            context,
            table,
            config.interface_token.clone(),
            config.allowed_uids.clone(),
        ));
        let object = LocalObject::new(dispatcher.clone());

        info!(
            backend = %config.backend,
            max_callbacks = config.max_callbacks,
            max_remote_objects = config.max_remote_objects,
            "[DevAuth] Service initialized"
        );
        Ok(Self {
            config,
            dispatcher,
            object,
        })
    }

    /// Publishes the service under [`DEVICE_AUTH_SERVICE_ID`].
    pub fn publish(&self, locator: &ServiceLocator) {
        locator.add_service(DEVICE_AUTH_SERVICE_ID, self.remote_object());
    }

    /// Withdraws the service, drops every callback record and kills the
    /// service object.
    pub fn shutdown(&self, locator: &ServiceLocator) -> Result<(), ServiceError> {
        let withdrawn = locator.remove_service(DEVICE_AUTH_SERVICE_ID);
        self.registry().reset();
        self.object.kill();
        info!("[DevAuth] Service stopped");
        match withdrawn {
            Some(_) => Ok(()),
            None => Err(TransportError::ServiceNotFound(DEVICE_AUTH_SERVICE_ID.to_string()).into()),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<StubRequestDispatcher> {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.dispatcher.context().registry
    }

    pub fn invoker(&self) -> &Arc<CallbackInvoker> {
        &self.dispatcher.context().invoker
    }

    pub fn remote_object(&self) -> Arc<dyn RemoteObject> {
        self.object.clone()
    }
}

impl std::fmt::Debug for DevAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevAuthService")
            .field("backend", &self.config.backend)
            .field("object", &self.object)
            .finish()
    }
}
