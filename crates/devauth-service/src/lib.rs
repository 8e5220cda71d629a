//! # Device-Auth Service
//!
//! Service side of the device-auth IPC layer. Client method calls arrive as
//! parameter-encoded requests, are routed to the business layer, and the
//! business layer's callbacks travel back to the client as reverse calls.
//!
//! ## Request Pipeline
//!
//! ```text
//! Received → TokenChecked → PermissionChecked → MethodResolved
//!          → ParamsDecoded → [CallbackCaptured] → Invoked → ReplyWritten
//! ```
//!
//! | Failure | Result code |
//! |---------|-------------|
//! | Transport opcode other than `DEV_AUTH_CALL_REQUEST` | `IPC_UNKNOWN_OPCODE` |
//! | Interface token mismatch | `IPC_BAD_MESSAGE` |
//! | Caller uid not allowed | `IPC_PERMISSION_DENIED` |
//! | Method id not registered | `IPC_METHOD_INVALID` |
//! | Declared count negative, above 8, or not matching the body | `IPC_BAD_PARAM_NUM` |
//! | Callback object on the wire | `IPC_BAD_PARAM` |
//!
//! ## Callback Records
//!
//! | Kind | Key | Removed when |
//! |------|-----|--------------|
//! | `DevAuth` | application id | unregistered or remote object died |
//! | `TmpDevAuth` | request id | finish/error delivered or request rejected |
//! | `Listener` | application id | unregistered or remote object died |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/service.rs   - DevAuthService lifecycle               │
//! │  adapters/callbacks.rs - business-facing callback sinks         │
//! │  ipc/                  - dispatcher, handlers, invoker, checks  │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - AuthCallbacks, GroupEventListener          │
//! │  ports/outbound.rs - DeviceGroupManager, GroupAuthManager       │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/slots.rs          - generation-checked object arena     │
//! │  domain/registry.rs       - CallbackRegistry                    │
//! │  domain/dispatch_table.rs - CallDispatchTable                   │
//! │  domain/config.rs         - ServiceConfig                       │
//! │  domain/errors.rs         - RegistryError, ServiceError         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let service = DevAuthService::new(ServiceConfig::from_env(), group_manager, group_auth)?;
//! service.publish(&locator);
//! // ...
//! service.shutdown(&locator)?;
//! ```

#![warn(missing_debug_implementations)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ipc;
pub mod ports;

pub use adapters::*;
pub use domain::*;
pub use ipc::*;
pub use ports::*;
