//! # IPC Layer
//!
//! - `security`: interface token and caller checks
//! - `dispatcher`: inbound request pipeline
//! - `handlers`: per-method handlers and the call map
//! - `invoker`: reverse calls to client callback objects

pub mod dispatcher;
pub mod handlers;
pub mod invoker;
pub mod security;

pub use dispatcher::StubRequestDispatcher;
pub use handlers::{set_call_map, ServiceContext};
pub use invoker::CallbackInvoker;
pub use security::AuthorizationRules;
