//! Hook tables.
//!
//! A client never ships code pointers. Each callback function is kept in a
//! client-side table under a [`HookId`], and only the ids travel. A zero id
//! marks an absent callback.

use crate::errors::IpcError;
use crate::ids::{CallbackId, CallbackType};

/// Client-side handle of a registered callback function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

impl HookId {
    /// `None` for the reserved zero id.
    pub fn new(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

fn write_hooks(hooks: &[Option<HookId>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(hooks.len() * 8);
    for hook in hooks {
        out.extend_from_slice(&hook.map_or(0, HookId::get).to_le_bytes());
    }
    out
}

fn read_hooks<const N: usize>(bytes: &[u8]) -> Result<[Option<HookId>; N], IpcError> {
    if bytes.len() != N * 8 {
        return Err(IpcError::BadParam);
    }
    let mut out = [None; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *slot = HookId::new(u64::from_le_bytes(raw));
    }
    Ok(out)
}

/// Device-auth callback set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevAuthHooks {
    pub on_transmit: Option<HookId>,
    pub on_session_key_returned: Option<HookId>,
    pub on_finish: Option<HookId>,
    pub on_error: Option<HookId>,
    pub on_request: Option<HookId>,
}

impl DevAuthHooks {
    pub const ENCODED_LEN: usize = 5 * 8;

    pub fn encode(&self) -> Vec<u8> {
        write_hooks(&[
            self.on_transmit,
            self.on_session_key_returned,
            self.on_finish,
            self.on_error,
            self.on_request,
        ])
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IpcError> {
        let [on_transmit, on_session_key_returned, on_finish, on_error, on_request] = read_hooks::<5>(bytes)?;
        Ok(Self {
            on_transmit,
            on_session_key_returned,
            on_finish,
            on_error,
            on_request,
        })
    }
}

/// Data-change listener callback set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerHooks {
    pub on_group_created: Option<HookId>,
    pub on_group_deleted: Option<HookId>,
    pub on_device_bound: Option<HookId>,
    pub on_device_unbound: Option<HookId>,
    pub on_device_not_trusted: Option<HookId>,
    pub on_last_group_deleted: Option<HookId>,
    pub on_trusted_device_num_changed: Option<HookId>,
}

impl ListenerHooks {
    pub const ENCODED_LEN: usize = 7 * 8;

    pub fn encode(&self) -> Vec<u8> {
        write_hooks(&[
            self.on_group_created,
            self.on_group_deleted,
            self.on_device_bound,
            self.on_device_unbound,
            self.on_device_not_trusted,
            self.on_last_group_deleted,
            self.on_trusted_device_num_changed,
        ])
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IpcError> {
        let [on_group_created, on_group_deleted, on_device_bound, on_device_unbound, on_device_not_trusted, on_last_group_deleted, on_trusted_device_num_changed] =
            read_hooks::<7>(bytes)?;
        Ok(Self {
            on_group_created,
            on_group_deleted,
            on_device_bound,
            on_device_unbound,
            on_device_not_trusted,
            on_last_group_deleted,
            on_trusted_device_num_changed,
        })
    }
}

/// Callback functions held by a registry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFns {
    DeviceAuth(DevAuthHooks),
    Listener(ListenerHooks),
}

impl CallbackFns {
    /// Decodes the hook table carried for a record of `kind`.
    pub fn decode(kind: CallbackType, bytes: &[u8]) -> Result<Self, IpcError> {
        match kind {
            CallbackType::DevAuth | CallbackType::TmpDevAuth => DevAuthHooks::decode(bytes).map(Self::DeviceAuth),
            CallbackType::Listener => ListenerHooks::decode(bytes).map(Self::Listener),
        }
    }

    pub fn matches(&self, kind: CallbackType) -> bool {
        matches!(
            (self, kind),
            (CallbackFns::DeviceAuth(_), CallbackType::DevAuth | CallbackType::TmpDevAuth)
                | (CallbackFns::Listener(_), CallbackType::Listener)
        )
    }

    /// Hook registered for `id`, if this set has one.
    pub fn hook_for(&self, id: CallbackId) -> Option<HookId> {
        match self {
            CallbackFns::DeviceAuth(h) => match id {
                CallbackId::OnTransmit => h.on_transmit,
                CallbackId::OnSessionKeyReturned => h.on_session_key_returned,
                CallbackId::OnFinish => h.on_finish,
                CallbackId::OnError => h.on_error,
                CallbackId::OnRequest => h.on_request,
                _ => None,
            },
            CallbackFns::Listener(h) => match id {
                CallbackId::OnGroupCreated => h.on_group_created,
                CallbackId::OnGroupDeleted => h.on_group_deleted,
                CallbackId::OnDeviceBound => h.on_device_bound,
                CallbackId::OnDeviceUnbound => h.on_device_unbound,
                CallbackId::OnDeviceNotTrusted => h.on_device_not_trusted,
                CallbackId::OnLastGroupDeleted => h.on_last_group_deleted,
                CallbackId::OnTrustedDeviceNumChanged => h.on_trusted_device_num_changed,
                _ => None,
            },
        }
    }
}
