//! # Client Hook Table
//!
//! Maps [`HookId`]s to the closures they stand for. Ids are allocated from a
//! monotonic counter starting at 1 and are never reused, so a stale id from
//! a released registration can only miss.

use crate::callbacks::{
    CountFn, DataChangeListener, DeviceAuthCallback, DeviceFn, DeviceGroupFn, ErrorFn, FinishFn, GroupFn,
    LastGroupFn, RequestFn, SessionKeyFn, TransmitFn,
};
use devauth_types::{CallbackId, DevAuthHooks, HookId, ListenerHooks};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One registered closure, tagged with the callback shape it serves.
#[derive(Clone)]
pub enum ClientHook {
    Transmit(TransmitFn),
    SessionKey(SessionKeyFn),
    Finish(FinishFn),
    Error(ErrorFn),
    Request(RequestFn),
    GroupCreated(GroupFn),
    GroupDeleted(GroupFn),
    DeviceBound(DeviceGroupFn),
    DeviceUnbound(DeviceGroupFn),
    DeviceNotTrusted(DeviceFn),
    LastGroupDeleted(LastGroupFn),
    TrustedDeviceNumChanged(CountFn),
}

impl ClientHook {
    /// Callback id this hook answers to.
    pub fn callback_id(&self) -> CallbackId {
        match self {
            ClientHook::Transmit(_) => CallbackId::OnTransmit,
            ClientHook::SessionKey(_) => CallbackId::OnSessionKeyReturned,
            ClientHook::Finish(_) => CallbackId::OnFinish,
            ClientHook::Error(_) => CallbackId::OnError,
            ClientHook::Request(_) => CallbackId::OnRequest,
            ClientHook::GroupCreated(_) => CallbackId::OnGroupCreated,
            ClientHook::GroupDeleted(_) => CallbackId::OnGroupDeleted,
            ClientHook::DeviceBound(_) => CallbackId::OnDeviceBound,
            ClientHook::DeviceUnbound(_) => CallbackId::OnDeviceUnbound,
            ClientHook::DeviceNotTrusted(_) => CallbackId::OnDeviceNotTrusted,
            ClientHook::LastGroupDeleted(_) => CallbackId::OnLastGroupDeleted,
            ClientHook::TrustedDeviceNumChanged(_) => CallbackId::OnTrustedDeviceNumChanged,
        }
    }
}

impl std::fmt::Debug for ClientHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClientHook").field(&self.callback_id()).finish()
    }
}

#[derive(Debug)]
pub struct HookTable {
    next: AtomicU64,
    entries: Mutex<HashMap<HookId, ClientHook>>,
}

impl Default for HookTable {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl HookTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, hook: ClientHook) -> Option<HookId> {
        let id = HookId::new(self.next.fetch_add(1, Ordering::Relaxed))?;
        self.entries.lock().insert(id, hook);
        Some(id)
    }

    fn insert_opt<T>(&self, f: &Option<T>, wrap: impl FnOnce(T) -> ClientHook) -> Option<HookId>
    where
        T: Clone,
    {
        f.clone().and_then(|f| self.insert(wrap(f)))
    }

    /// Registers every set closure of `callback`. Unset closures get no id.
    pub fn register_auth(&self, callback: &DeviceAuthCallback) -> DevAuthHooks {
        DevAuthHooks {
            on_transmit: self.insert_opt(&callback.on_transmit, ClientHook::Transmit),
            on_session_key_returned: self.insert_opt(&callback.on_session_key_returned, ClientHook::SessionKey),
            on_finish: self.insert_opt(&callback.on_finish, ClientHook::Finish),
            on_error: self.insert_opt(&callback.on_error, ClientHook::Error),
            on_request: self.insert_opt(&callback.on_request, ClientHook::Request),
        }
    }

    pub fn register_listener(&self, listener: &DataChangeListener) -> ListenerHooks {
        ListenerHooks {
            on_group_created: self.insert_opt(&listener.on_group_created, ClientHook::GroupCreated),
            on_group_deleted: self.insert_opt(&listener.on_group_deleted, ClientHook::GroupDeleted),
            on_device_bound: self.insert_opt(&listener.on_device_bound, ClientHook::DeviceBound),
            on_device_unbound: self.insert_opt(&listener.on_device_unbound, ClientHook::DeviceUnbound),
            on_device_not_trusted: self.insert_opt(&listener.on_device_not_trusted, ClientHook::DeviceNotTrusted),
            on_last_group_deleted: self.insert_opt(&listener.on_last_group_deleted, ClientHook::LastGroupDeleted),
            on_trusted_device_num_changed: self.insert_opt(
                &listener.on_trusted_device_num_changed,
                ClientHook::TrustedDeviceNumChanged,
            ),
        }
    }

    pub fn get(&self, id: HookId) -> Option<ClientHook> {
        self.entries.lock().get(&id).cloned()
    }

    fn release(&self, ids: &[Option<HookId>]) {
        let mut entries = self.entries.lock();
        for id in ids.iter().flatten() {
            entries.remove(id);
        }
    }

    pub fn release_auth(&self, hooks: &DevAuthHooks) {
        self.release(&[
            hooks.on_transmit,
            hooks.on_session_key_returned,
            hooks.on_finish,
            hooks.on_error,
            hooks.on_request,
        ]);
    }

    pub fn release_listener(&self, hooks: &ListenerHooks) {
        self.release(&[
            hooks.on_group_created,
            hooks.on_group_deleted,
            hooks.on_device_bound,
            hooks.on_device_unbound,
            hooks.on_device_not_trusted,
            hooks.on_last_group_deleted,
            hooks.on_trusted_device_num_changed,
        ]);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
