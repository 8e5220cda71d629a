//! # Adapters Layer
//!
//! - `callbacks`: `AuthCallbacks` and `GroupEventListener` implementations
//!   that forward to the reverse-call invoker
//! - `service`: `DevAuthService` construction, publication and shutdown

pub mod callbacks;
pub mod service;

pub use callbacks::{IpcAuthCallbacks, IpcGroupEventListener};
pub use service::DevAuthService;
