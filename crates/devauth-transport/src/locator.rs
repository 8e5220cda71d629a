//! Well-known-name registry of published services.

use crate::errors::TransportError;
use crate::object::RemoteObject;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
pub struct ServiceLocator {
    services: RwLock<HashMap<String, Arc<dyn RemoteObject>>>,
}

impl ServiceLocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `object` under `name`, replacing any previous holder.
    pub fn add_service(&self, name: &str, object: Arc<dyn RemoteObject>) {
        let previous = self.services.write().insert(name.to_string(), object);
        if previous.is_some() {
            warn!(service = name, "Replaced an already published service");
        } else {
            info!(service = name, "Service published");
        }
    }

    pub fn get_service(&self, name: &str) -> Option<Arc<dyn RemoteObject>> {
        self.services.read().get(name).cloned()
    }

    /// Looks up `name` and requires it to be alive.
    pub fn require_service(&self, name: &str) -> Result<Arc<dyn RemoteObject>, TransportError> {
        self.get_service(name)
            .filter(|object| object.is_alive())
            .ok_or_else(|| TransportError::ServiceNotFound(name.to_string()))
    }

    pub fn remove_service(&self, name: &str) -> Option<Arc<dyn RemoteObject>> {
        let removed = self.services.write().remove(name);
        if removed.is_some() {
            info!(service = name, "Service withdrawn");
        }
        removed
    }
}

impl std::fmt::Debug for ServiceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.services.read().keys().cloned().collect();
        f.debug_struct("ServiceLocator").field("services", &names).finish()
    }
}
