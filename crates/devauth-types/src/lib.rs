//! # Device-Auth Types
//!
//! Everything that crosses the IPC boundary between the device-auth service
//! and its clients.
//!
//! ## Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `ids` | Method opcodes, parameter tags, reverse-call ids, callback kinds |
//! | `errors` | Wire result codes and [`IpcError`] |
//! | `codec` | Parameter codec, [`ParamList`], [`ParamWriter`], [`SlotHandle`] |
//! | `framing` | Request, reply and reverse-call headers |
//! | `hooks` | Hook id tables standing in for client function pointers |
//!
//! ## Wire Record
//!
//! ```text
//! [methodId: i32][bodyLength: i32][paramCount: i32]
//!   [tag: i32][length: i32][body, word padded, min one word]
//!   [tag: i32][length: i32][body ...]
//! ```

#![warn(missing_debug_implementations)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod errors;
pub mod framing;
pub mod hooks;
pub mod ids;

pub use codec::{
    decode_param, encode_param, DecodeError, EncodeError, ParamEntry, ParamList, ParamReader, ParamValue,
    ParamWriter, RawParam, SlotHandle,
};
pub use errors::{check_business, result_code, IpcError};
pub use framing::{ReplyFraming, LITE_STAGING_CAPACITY};
pub use hooks::{CallbackFns, DevAuthHooks, HookId, ListenerHooks};
pub use ids::*;
