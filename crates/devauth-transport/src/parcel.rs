//! Message parcels exchanged over the substrate.

use crate::object::RemoteObject;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identity the substrate attaches to every incoming call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallerInfo {
    pub uid: u32,
    pub pid: u32,
}

/// How a request is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Wait for the reply up to `timeout`.
    Sync { timeout: Duration },
    /// Fire and forget; no reply is produced.
    Async,
}

/// One request or reply.
#[derive(Clone, Default)]
pub struct MessageParcel {
    pub interface_token: String,
    pub caller: CallerInfo,
    pub data: Vec<u8>,
    /// Remote object carried alongside the data, if any.
    pub object: Option<Arc<dyn RemoteObject>>,
}

impl MessageParcel {
    #[must_use]
    pub fn new(interface_token: impl Into<String>, caller: CallerInfo, data: Vec<u8>) -> Self {
        Self {
            interface_token: interface_token.into(),
            caller,
            data,
            object: None,
        }
    }

    /// Reply parcel carrying only data.
    #[must_use]
    pub fn reply(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_object(mut self, object: Arc<dyn RemoteObject>) -> Self {
        self.object = Some(object);
        self
    }
}

impl fmt::Debug for MessageParcel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageParcel")
            .field("interface_token", &self.interface_token)
            .field("caller", &self.caller)
            .field("data_len", &self.data.len())
            .field("object", &self.object.as_ref().map(|o| o.object_id()))
            .finish()
    }
}
