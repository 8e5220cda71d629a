//! # Remote Objects
//!
//! A [`RemoteObject`] is the caller's view of something living in another
//! process; a [`RemoteStub`] is the receiving side. [`LocalObject`] joins the
//! two inside one process so both ends of the IPC layer can run under test.
//!
//! ```text
//! caller ── send_request ──► LocalObject ── on_remote_request ──► RemoteStub
//!                                 │
//!                               kill() ──► DeathRecipient::on_remote_died
//! ```

use crate::errors::TransportError;
use crate::parcel::{CallMode, MessageParcel};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to an object in another process.
#[async_trait]
pub trait RemoteObject: Send + Sync {
    /// Substrate-wide identity of the object.
    fn object_id(&self) -> u64;

    fn is_alive(&self) -> bool;

    /// Delivers `parcel` under transport opcode `code`.
    ///
    /// Returns the reply for synchronous calls and `None` for asynchronous
    /// ones.
    async fn send_request(
        &self,
        code: u32,
        parcel: MessageParcel,
        mode: CallMode,
    ) -> Result<Option<MessageParcel>, TransportError>;

    /// Arranges for `recipient` to hear about the object's death.
    ///
    /// Returns `false` when the object is already dead.
    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool;

    /// Detaches a recipient added earlier, matched by identity.
    ///
    /// Returns `false` when it was not attached, including after the
    /// object died and its recipients were notified.
    fn remove_death_recipient(&self, recipient: &Arc<dyn DeathRecipient>) -> bool;
}

/// Receiving end of remote calls.
#[async_trait]
pub trait RemoteStub: Send + Sync {
    async fn on_remote_request(&self, code: u32, parcel: MessageParcel) -> MessageParcel;
}

/// Notified on the substrate's context when a remote object dies.
pub trait DeathRecipient: Send + Sync {
    fn on_remote_died(&self, object_id: u64);
}

/// In-process remote object backed by a stub.
pub struct LocalObject {
    id: u64,
    stub: Arc<dyn RemoteStub>,
    alive: AtomicBool,
    recipients: Mutex<Vec<Arc<dyn DeathRecipient>>>,
}

impl LocalObject {
    #[must_use]
    pub fn new(stub: Arc<dyn RemoteStub>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            stub,
            alive: AtomicBool::new(true),
            recipients: Mutex::new(Vec::new()),
        })
    }

    /// Marks the object dead and notifies every recipient once.
    pub fn kill(&self) {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        let recipients = std::mem::take(&mut *self.recipients.lock());
        info!(object_id = self.id, recipients = recipients.len(), "Remote object died");
        for recipient in recipients {
            recipient.on_remote_died(self.id);
        }
    }

    /// Recipients still waiting for this object's death.
    pub fn death_recipient_count(&self) -> usize {
        self.recipients.lock().len()
    }
}

fn same_recipient(a: &Arc<dyn DeathRecipient>, b: &Arc<dyn DeathRecipient>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

#[async_trait]
impl RemoteObject for LocalObject {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn send_request(
        &self,
        code: u32,
        parcel: MessageParcel,
        mode: CallMode,
    ) -> Result<Option<MessageParcel>, TransportError> {
        if !self.is_alive() {
            return Err(TransportError::DeadObject(self.id));
        }
        match mode {
            CallMode::Sync { timeout } => {
                let reply = tokio::time::timeout(timeout, self.stub.on_remote_request(code, parcel))
                    .await
                    .map_err(|_| TransportError::Timeout(timeout))?;
                Ok(Some(reply))
            }
            CallMode::Async => {
                let stub = Arc::clone(&self.stub);
                let id = self.id;
                tokio::spawn(async move {
                    let _ = stub.on_remote_request(code, parcel).await;
                    debug!(object_id = id, code, "Async request delivered");
                });
                Ok(None)
            }
        }
    }

    fn add_death_recipient(&self, recipient: Arc<dyn DeathRecipient>) -> bool {
        let mut recipients = self.recipients.lock();
        // Checked under the lock so a concurrent kill() cannot miss it.
        if !self.is_alive() {
            return false;
        }
        recipients.push(recipient);
        true
    }

    fn remove_death_recipient(&self, recipient: &Arc<dyn DeathRecipient>) -> bool {
        let mut recipients = self.recipients.lock();
        match recipients.iter().position(|r| same_recipient(r, recipient)) {
            Some(index) => {
                recipients.swap_remove(index);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for LocalObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalObject")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
