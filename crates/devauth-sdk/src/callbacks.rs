//! Application callback sets.
//!
//! Callbacks are plain closures. The client never ships them; it keeps them
//! in its [`HookTable`](crate::hooks::HookTable) and sends only their ids.

use std::sync::Arc;

/// `(request_id, data) -> accepted`
pub type TransmitFn = Arc<dyn Fn(i64, &[u8]) -> bool + Send + Sync>;
/// `(request_id, session_key)`
pub type SessionKeyFn = Arc<dyn Fn(i64, &[u8]) + Send + Sync>;
/// `(request_id, operation_code, return_data)`
pub type FinishFn = Arc<dyn Fn(i64, i32, &str) + Send + Sync>;
/// `(request_id, operation_code, error_code, error_info)`
pub type ErrorFn = Arc<dyn Fn(i64, i32, i32, Option<&str>) + Send + Sync>;
/// `(request_id, operation_code, request_params) -> confirmation`
pub type RequestFn = Arc<dyn Fn(i64, i32, Option<&str>) -> Option<String> + Send + Sync>;

/// `(group_info)`
pub type GroupFn = Arc<dyn Fn(&str) + Send + Sync>;
/// `(peer_udid, group_info)`
pub type DeviceGroupFn = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// `(peer_udid)`
pub type DeviceFn = Arc<dyn Fn(&str) + Send + Sync>;
/// `(peer_udid, group_type)`
pub type LastGroupFn = Arc<dyn Fn(&str, i32) + Send + Sync>;
/// `(current_count)`
pub type CountFn = Arc<dyn Fn(i32) + Send + Sync>;

/// Device-auth callbacks. Any subset may be set.
#[derive(Clone, Default)]
pub struct DeviceAuthCallback {
    pub on_transmit: Option<TransmitFn>,
    pub on_session_key_returned: Option<SessionKeyFn>,
    pub on_finish: Option<FinishFn>,
    pub on_error: Option<ErrorFn>,
    pub on_request: Option<RequestFn>,
}

impl DeviceAuthCallback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transmit(mut self, f: impl Fn(i64, &[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.on_transmit = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_session_key(mut self, f: impl Fn(i64, &[u8]) + Send + Sync + 'static) -> Self {
        self.on_session_key_returned = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_finish(mut self, f: impl Fn(i64, i32, &str) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_error(mut self, f: impl Fn(i64, i32, i32, Option<&str>) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_request(mut self, f: impl Fn(i64, i32, Option<&str>) -> Option<String> + Send + Sync + 'static) -> Self {
        self.on_request = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for DeviceAuthCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceAuthCallback")
            .field("on_transmit", &self.on_transmit.is_some())
            .field("on_session_key_returned", &self.on_session_key_returned.is_some())
            .field("on_finish", &self.on_finish.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_request", &self.on_request.is_some())
            .finish()
    }
}

/// Trust-data change listener. Any subset may be set.
#[derive(Clone, Default)]
pub struct DataChangeListener {
    pub on_group_created: Option<GroupFn>,
    pub on_group_deleted: Option<GroupFn>,
    pub on_device_bound: Option<DeviceGroupFn>,
    pub on_device_unbound: Option<DeviceGroupFn>,
    pub on_device_not_trusted: Option<DeviceFn>,
    pub on_last_group_deleted: Option<LastGroupFn>,
    pub on_trusted_device_num_changed: Option<CountFn>,
}

impl DataChangeListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_group_created(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_group_created = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_group_deleted(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_group_deleted = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_device_bound(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_device_bound = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_device_unbound(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_device_unbound = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_device_not_trusted(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_device_not_trusted = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_last_group_deleted(mut self, f: impl Fn(&str, i32) + Send + Sync + 'static) -> Self {
        self.on_last_group_deleted = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_trusted_device_num_changed(mut self, f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.on_trusted_device_num_changed = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for DataChangeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChangeListener")
            .field("on_group_created", &self.on_group_created.is_some())
            .field("on_group_deleted", &self.on_group_deleted.is_some())
            .field("on_device_bound", &self.on_device_bound.is_some())
            .field("on_device_unbound", &self.on_device_unbound.is_some())
            .field("on_device_not_trusted", &self.on_device_not_trusted.is_some())
            .field("on_last_group_deleted", &self.on_last_group_deleted.is_some())
            .field(
                "on_trusted_device_num_changed",
                &self.on_trusted_device_num_changed.is_some(),
            )
            .finish()
    }
}
