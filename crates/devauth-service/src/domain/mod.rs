//! # Domain Layer - Device-Auth Service
//!
//! State the service owns, free of transport plumbing.
//!
//! ## Components
//!
//! - `slots`: generation-checked remote object arena
//! - `registry`: callback records and their slots behind one mutex
//! - `dispatch_table`: method id → handler map
//! - `config`: `ServiceConfig`
//! - `errors`: `RegistryError`, `DispatchError`, `ServiceError`

pub mod config;
pub mod dispatch_table;
pub mod errors;
pub mod registry;
pub mod slots;

pub use config::*;
pub use dispatch_table::*;
pub use errors::*;
pub use registry::*;
pub use slots::*;
