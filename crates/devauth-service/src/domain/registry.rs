//! # Callback Registry
//!
//! Bounded table of callback records plus the remote object slots they own,
//! guarded by one mutex.
//!
//! ## Record Lifetime
//!
//! | Kind | Key | Ends when |
//! |------|-----|-----------|
//! | `DevAuth` | application id | unregistered, or its remote object dies |
//! | `TmpDevAuth` | request id | finish/error delivered, or the request is rejected |
//! | `Listener` | application id | unregistered, or its remote object dies |
//!
//! Re-registering an existing key and kind replaces the hooks in place and
//! releases the previously attached slot.
//!
//! The lock is held only while the tables are read or mutated. Callers take
//! snapshots ([`ReverseTarget`]) and issue reverse calls after it is released.

use crate::domain::errors::RegistryError;
use crate::domain::slots::RemoteObjectSlotTable;
use devauth_telemetry::metrics::{DEATH_NOTIFICATIONS, REGISTRY_RECORDS, REMOTE_SLOTS_IN_USE};
use devauth_transport::{DeathRecipient, RemoteObject};
use devauth_types::{CallbackFns, CallbackId, CallbackType, HookId, SlotHandle, MAX_APP_ID_LEN};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Lookup key of a callback record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    App(String),
    Request(i64),
}

impl CallbackKey {
    pub fn app(app_id: impl Into<String>) -> Self {
        CallbackKey::App(app_id.into())
    }
}

impl fmt::Display for CallbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKey::App(app_id) => write!(f, "app '{app_id}'"),
            CallbackKey::Request(request_id) => write!(f, "request {request_id}"),
        }
    }
}

/// One registered callback set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRecord {
    pub app_id: Option<String>,
    pub request_id: Option<i64>,
    pub kind: CallbackType,
    pub fns: CallbackFns,
    pub remote: Option<SlotHandle>,
    /// Deleted right after a terminal callback.
    pub transient: bool,
}

impl CallbackRecord {
    fn matches(&self, key: &CallbackKey, kind: CallbackType) -> bool {
        self.kind == kind
            && match key {
                CallbackKey::App(app_id) => self.app_id.as_deref() == Some(app_id.as_str()),
                CallbackKey::Request(request_id) => self.request_id == Some(*request_id),
            }
    }
}

/// Where to send one reverse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverseTarget {
    pub slot: SlotHandle,
    pub hook: HookId,
}

struct Inner {
    records: Vec<Option<CallbackRecord>>,
    slots: RemoteObjectSlotTable,
}

impl Inner {
    fn position(&self, key: &CallbackKey, kind: CallbackType) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.as_ref().map_or(false, |r| r.matches(key, kind)))
    }

    fn record_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    /// Clears entry `index` and frees its slot.
    fn drop_record(&mut self, index: usize) -> Option<CallbackRecord> {
        let record = self.records.get_mut(index)?.take()?;
        if let Some(slot) = record.remote {
            self.slots.release(slot);
        }
        Some(record)
    }

    fn publish_gauges(&self) {
        REGISTRY_RECORDS.set(self.record_count() as f64);
        REMOTE_SLOTS_IN_USE.set(self.slots.in_use() as f64);
    }
}

/// Registry of client callbacks and their remote objects.
pub struct CallbackRegistry {
    inner: Mutex<Inner>,
    me: Weak<CallbackRegistry>,
}

impl CallbackRegistry {
    #[must_use]
    pub fn new(max_records: usize, max_remote_objects: usize) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            inner: Mutex::new(Inner {
                records: vec![None; max_records],
                slots: RemoteObjectSlotTable::with_capacity(max_remote_objects),
            }),
            me: me.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().record_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slots_in_use(&self) -> usize {
        self.inner.lock().slots.in_use()
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Installs `fns` for `key`/`kind`, replacing an existing record's hooks.
    pub fn add_or_replace(&self, key: CallbackKey, kind: CallbackType, fns: CallbackFns) -> Result<(), RegistryError> {
        if !fns.matches(kind) {
            return Err(RegistryError::KindMismatch(kind));
        }
        if let CallbackKey::App(app_id) = &key {
            if app_id.is_empty() || app_id.len() >= MAX_APP_ID_LEN {
                return Err(RegistryError::InvalidAppId { max: MAX_APP_ID_LEN - 1 });
            }
        }

        let mut inner = self.inner.lock();
        if let Some(index) = inner.position(&key, kind) {
            let previous = inner.records[index].as_mut().and_then(|record| {
                record.fns = fns;
                record.remote.take()
            });
            if let Some(slot) = previous {
                inner.slots.release(slot);
            }
            debug!(key = %key, kind = ?kind, "Callback record replaced");
            inner.publish_gauges();
            return Ok(());
        }

        let capacity = inner.records.len();
        let free = inner
            .records
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryError::Full { capacity })?;

        let (app_id, request_id, transient) = match key {
            CallbackKey::App(app_id) => (Some(app_id), None, false),
            CallbackKey::Request(request_id) => (None, Some(request_id), true),
        };
        inner.records[free] = Some(CallbackRecord {
            app_id,
            request_id,
            kind,
            fns,
            remote: None,
            transient,
        });
        debug!(index = free, kind = ?kind, transient, "Callback record added");
        inner.publish_gauges();
        Ok(())
    }

    /// Associates a captured slot with an existing record.
    ///
    /// Persistent records also get a death recipient on the slot's object,
    /// so the record disappears with the client.
    pub fn attach_remote_handle(&self, key: &CallbackKey, kind: CallbackType, slot: SlotHandle) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let index = inner.position(key, kind).ok_or_else(|| RegistryError::NotFound {
            key: key.to_string(),
            kind,
        })?;
        let object = inner.slots.get(slot).ok_or(RegistryError::StaleSlot(slot))?;

        let previous = inner.records[index]
            .as_mut()
            .and_then(|record| record.remote.replace(slot));
        if let Some(previous) = previous.filter(|p| *p != slot) {
            inner.slots.release(previous);
        }
        inner.slots.mark_attached(slot);

        if kind.tracks_remote_death() {
            let recipient: Arc<dyn DeathRecipient> = Arc::new(RegistryDeathRecipient {
                registry: self.me.clone(),
                slot,
            });
            // Installed under the registry lock: a death notification waits
            // here until the slot has recorded its recipient.
            if object.add_death_recipient(Arc::clone(&recipient)) {
                inner.slots.watch(slot, recipient);
            } else {
                warn!(key = %key, slot = %slot, "Callback object already dead, dropping record");
                inner.drop_record(index);
            }
        }
        inner.publish_gauges();
        debug!(key = %key, kind = ?kind, slot = %slot, "Remote handle attached");
        Ok(())
    }

    /// Binds `request_id` to the `DevAuth` record of `app_id` and makes it
    /// persistent.
    pub fn bind_request(&self, app_id: &str, request_id: i64) -> Result<(), RegistryError> {
        let key = CallbackKey::app(app_id);
        let mut inner = self.inner.lock();
        let index = inner
            .position(&key, CallbackType::DevAuth)
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
                kind: CallbackType::DevAuth,
            })?;
        if let Some(record) = inner.records[index].as_mut() {
            record.request_id = Some(request_id);
            record.transient = false;
        }
        debug!(app_id, request_id, "Request bound to application callbacks");
        Ok(())
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    pub fn lookup(&self, key: &CallbackKey, kind: CallbackType) -> Option<CallbackRecord> {
        let inner = self.inner.lock();
        inner.position(key, kind).and_then(|index| inner.records[index].clone())
    }

    pub fn contains(&self, key: &CallbackKey, kind: CallbackType) -> bool {
        self.inner.lock().position(key, kind).is_some()
    }

    /// Slot and hook for callback `id` of the record at `key`/`kind`.
    pub fn target(&self, key: &CallbackKey, kind: CallbackType, id: CallbackId) -> Option<ReverseTarget> {
        let inner = self.inner.lock();
        let record = inner.position(key, kind).and_then(|index| inner.records[index].as_ref())?;
        Some(ReverseTarget {
            slot: record.remote?,
            hook: record.fns.hook_for(id)?,
        })
    }

    /// Targets of callback `id` across every listener record.
    pub fn listener_targets(&self, id: CallbackId) -> Vec<ReverseTarget> {
        let inner = self.inner.lock();
        inner
            .records
            .iter()
            .flatten()
            .filter(|record| record.kind == CallbackType::Listener)
            .filter_map(|record| {
                Some(ReverseTarget {
                    slot: record.remote?,
                    hook: record.fns.hook_for(id)?,
                })
            })
            .collect()
    }

    /// The remote object in `slot`, if the slot is still in use.
    pub fn remote_for(&self, slot: SlotHandle) -> Option<Arc<dyn RemoteObject>> {
        self.inner.lock().slots.get(slot)
    }

    // =========================================================================
    // REMOVAL
    // =========================================================================

    /// Removes the record at `key`/`kind`. Idempotent.
    pub fn remove(&self, key: &CallbackKey, kind: CallbackType) -> bool {
        let mut inner = self.inner.lock();
        let removed = match inner.position(key, kind) {
            Some(index) => inner.drop_record(index).is_some(),
            None => false,
        };
        if removed {
            debug!(key = %key, kind = ?kind, "Callback record removed");
            inner.publish_gauges();
        }
        removed
    }

    /// Removes the record for `request_id` only if it is transient.
    pub fn remove_transient(&self, request_id: i64, kind: CallbackType) -> bool {
        let key = CallbackKey::Request(request_id);
        let mut inner = self.inner.lock();
        let index = match inner.position(&key, kind) {
            Some(index) => index,
            None => return false,
        };
        if !inner.records[index].as_ref().map_or(false, |r| r.transient) {
            return false;
        }
        inner.drop_record(index);
        inner.publish_gauges();
        debug!(request_id, kind = ?kind, "Transient callback record removed");
        true
    }

    /// Death path: drops whichever record owns `slot` and frees the slot.
    pub fn remove_by_slot(&self, slot: SlotHandle) -> bool {
        let mut inner = self.inner.lock();
        let owner = inner
            .records
            .iter()
            .position(|r| r.as_ref().map_or(false, |r| r.remote == Some(slot)));
        let removed = match owner {
            Some(index) => inner.drop_record(index).is_some(),
            None => inner.slots.release(slot).is_some(),
        };
        inner.publish_gauges();
        removed
    }

    // =========================================================================
    // SLOTS
    // =========================================================================

    pub fn allocate_slot(&self, object: Arc<dyn RemoteObject>) -> Result<SlotHandle, RegistryError> {
        let mut inner = self.inner.lock();
        let slot = inner.slots.allocate(object)?;
        inner.publish_gauges();
        Ok(slot)
    }

    /// Frees `slot` unless a record has taken ownership of it.
    pub fn release_orphan_slot(&self, slot: SlotHandle) -> bool {
        let mut inner = self.inner.lock();
        if !inner.slots.is_in_use(slot) || inner.slots.is_attached(slot) {
            return false;
        }
        inner.slots.release(slot);
        inner.publish_gauges();
        debug!(slot = %slot, "Released unclaimed callback object");
        true
    }

    /// Drops every record and slot.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        for record in inner.records.iter_mut() {
            *record = None;
        }
        let released = inner.slots.clear();
        inner.publish_gauges();
        info!(released_objects = released.len(), "Callback registry reset");
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CallbackRegistry")
            .field("records", &inner.record_count())
            .field("slots", &inner.slots)
            .finish()
    }
}

/// Removes the owning record when a client's callback object dies.
struct RegistryDeathRecipient {
    registry: Weak<CallbackRegistry>,
    slot: SlotHandle,
}

impl DeathRecipient for RegistryDeathRecipient {
    fn on_remote_died(&self, object_id: u64) {
        DEATH_NOTIFICATIONS.inc();
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = registry.remove_by_slot(self.slot);
        info!(object_id, slot = %self.slot, removed, "Callback object died");
    }
}
