//! # Remote Object Slots
//!
//! Bounded arena of remote callback objects. Every slot carries a generation
//! that is bumped on release, so a [`SlotHandle`] taken before the release
//! never resolves to whatever occupies the index afterwards.
//!
//! ```text
//! allocate ──► [in use, gen g] ──release──► [free, gen g+1] ──allocate──► [in use, gen g+1]
//! ```

use crate::domain::errors::RegistryError;
use devauth_transport::{DeathRecipient, RemoteObject};
use devauth_types::SlotHandle;
use std::sync::Arc;

struct Slot {
    generation: u32,
    object: Option<Arc<dyn RemoteObject>>,
    /// Owned by a callback record.
    attached: bool,
    /// Installed on `object`; detached when the slot is freed.
    recipient: Option<Arc<dyn DeathRecipient>>,
}

impl Slot {
    fn vacate(&mut self) -> Option<Arc<dyn RemoteObject>> {
        let object = self.object.take()?;
        if let Some(recipient) = self.recipient.take() {
            object.remove_death_recipient(&recipient);
        }
        self.attached = false;
        self.generation = self.generation.wrapping_add(1).max(1);
        Some(object)
    }
}

/// Generation-checked slot table. Not synchronized; the registry owns it
/// behind its mutex.
pub struct RemoteObjectSlotTable {
    slots: Vec<Slot>,
    in_use: usize,
}

impl RemoteObjectSlotTable {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                generation: 1,
                object: None,
                attached: false,
                recipient: None,
            })
            .collect();
        Self { slots, in_use: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Stores `object` in the lowest free slot.
    pub fn allocate(&mut self, object: Arc<dyn RemoteObject>) -> Result<SlotHandle, RegistryError> {
        let capacity = self.slots.len();
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.object.is_none())
            .ok_or(RegistryError::SlotsExhausted { capacity })?;
        slot.object = Some(object);
        slot.attached = false;
        slot.recipient = None;
        self.in_use += 1;
        Ok(SlotHandle::new(index as u32, slot.generation))
    }

    fn slot(&self, handle: SlotHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.object.is_some())
    }

    fn slot_mut(&mut self, handle: SlotHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.object.is_some())
    }

    pub fn is_in_use(&self, handle: SlotHandle) -> bool {
        self.slot(handle).is_some()
    }

    pub fn get(&self, handle: SlotHandle) -> Option<Arc<dyn RemoteObject>> {
        self.slot(handle).and_then(|slot| slot.object.clone())
    }

    pub fn is_attached(&self, handle: SlotHandle) -> bool {
        self.slot(handle).map_or(false, |slot| slot.attached)
    }

    pub fn mark_attached(&mut self, handle: SlotHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.attached = true;
                true
            }
            None => false,
        }
    }

    /// Records the death recipient installed on the slot's object, detaching
    /// any recipient recorded before it.
    pub fn watch(&mut self, handle: SlotHandle, recipient: Arc<dyn DeathRecipient>) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        if let (Some(object), Some(old)) = (slot.object.as_ref(), slot.recipient.replace(recipient)) {
            object.remove_death_recipient(&old);
        }
        true
    }

    /// Frees the slot if `handle` is current. Stale handles are ignored.
    ///
    /// A recorded death recipient is detached from the object.
    pub fn release(&mut self, handle: SlotHandle) -> Option<Arc<dyn RemoteObject>> {
        let object = self.slot_mut(handle)?.vacate();
        self.in_use -= 1;
        object
    }

    /// Frees every slot, returning the objects that were held.
    pub fn clear(&mut self) -> Vec<Arc<dyn RemoteObject>> {
        let released: Vec<_> = self.slots.iter_mut().filter_map(Slot::vacate).collect();
        self.in_use = 0;
        released
    }
}

impl std::fmt::Debug for RemoteObjectSlotTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteObjectSlotTable")
            .field("capacity", &self.slots.len())
            .field("in_use", &self.in_use)
            .finish()
    }
}
