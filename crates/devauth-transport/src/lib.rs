//! # Device-Auth Transport
//!
//! The substrate the IPC layer is written against, rendered in-process.
//!
//! | Type | Role |
//! |------|------|
//! | [`RemoteObject`] | Caller-side handle; sync or async `send_request`, death recipients |
//! | [`RemoteStub`] | Receiver of remote calls |
//! | [`LocalObject`] | In-process object joining a handle to a stub |
//! | [`ServiceLocator`] | Well-known-name registry |
//! | [`Backend`] | Lite or standard profile: staging bound and reply framing |

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod backend;
mod errors;
mod locator;
mod object;
mod parcel;

pub use backend::Backend;
pub use errors::TransportError;
pub use locator::ServiceLocator;
pub use object::{DeathRecipient, LocalObject, RemoteObject, RemoteStub};
pub use parcel::{CallMode, CallerInfo, MessageParcel};
