//! # Device-Auth Client SDK
//!
//! Client half of the device-auth IPC layer. Applications call
//! [`DeviceAuthClient`] operations; each one is staged through a typestate
//! [`ProxyCall`] and sent to the published service.
//!
//! ## Reverse Calls
//!
//! ```text
//! service invoker ──[callbackId, hook]──► ClientCallbackStub ──► HookTable ──► closure
//! ```
//!
//! Closures never leave the process. Registration enters them into the
//! [`HookTable`] and only their [`HookId`](devauth_types::HookId)s go on the
//! wire. Transient hooks of an authentication request are released once its
//! finish or error callback has run.
//!
//! ## Error Mapping
//!
//! | Failure | [`SdkError`] |
//! |---------|--------------|
//! | Empty string, bad data length | `InvalidParams` |
//! | Service not published or dead | `ServiceUnavailable` |
//! | Client shut down | `IpcInit` |
//! | Parameter staging | `BuildParam` |
//! | Transport or rejected call | `ProcFailed` |
//! | No `IPC_RESULT` in reply | `UnknownReply` |
//! | Too few result entries | `OutDataNum` |
//! | Missing payload | `OutData` |
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = DeviceAuthClient::new(ClientConfig::from_env(), locator);
//! client
//!     .register_callback("svc.demo", DeviceAuthCallback::new().with_finish(|req, op, data| {
//!         println!("request {req} finished: {op} {data}");
//!     }))
//!     .await?;
//! client.create_group(0, 1, "svc.demo", r#"{"groupName":"g"}"#).await?;
//! ```

#![warn(missing_debug_implementations)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod callbacks;
pub mod client;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod proxy;
pub mod stub;

pub use callbacks::{DataChangeListener, DeviceAuthCallback};
pub use client::{DeviceAuthClient, QueryResult};
pub use config::{ClientConfig, DEFAULT_CALL_TIMEOUT};
pub use errors::{ProxyError, SdkError};
pub use hooks::{ClientHook, HookTable};
pub use proxy::{Accumulating, CallReply, Empty, Finalized, ProxyCall, Staged};
pub use stub::{ClientCallbackStub, TransientHooks};
