//! # Message Framing
//!
//! Headers wrapped around parameter bodies.
//!
//! | Message | Layout |
//! |---------|--------|
//! | Request | `[methodId: i32][bodyLength: i32][paramCount: i32][params]` |
//! | Reply (standard) | `[result: i32][bodyLength: i32][params]` |
//! | Reply (lite) | `[result: i32][bodyLength: u32][params]` |
//! | Reverse call | `[callbackId: i32][hook: u64][bodyLength: i32][paramCount: i32][params]` |

use crate::codec::{read_i32_at, EncodeError};
use crate::errors::IpcError;

pub const REQUEST_HEADER_LEN: usize = 12;
pub const REPLY_HEADER_LEN: usize = 8;
pub const CALLBACK_HEADER_LEN: usize = 20;

/// Staging bound of the lightweight backend.
pub const LITE_STAGING_CAPACITY: usize = 1024;

fn len_i32(len: usize) -> Result<i32, EncodeError> {
    i32::try_from(len).map_err(|_| EncodeError::TooLarge { len })
}

fn body_len_i32(body: &[u8]) -> Result<i32, EncodeError> {
    len_i32(body.len())
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub method_id: i32,
    pub body_len: i32,
    pub param_count: i32,
}

pub fn write_request(method_id: i32, param_count: i32, body: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let body_len = body_len_i32(body)?;
    let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + body.len());
    out.extend_from_slice(&method_id.to_le_bytes());
    out.extend_from_slice(&body_len.to_le_bytes());
    out.extend_from_slice(&param_count.to_le_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Splits a request into its header and body.
pub fn read_request(buf: &[u8]) -> Result<(RequestHeader, &[u8]), IpcError> {
    if buf.len() < REQUEST_HEADER_LEN {
        return Err(IpcError::BadMessage("short request header"));
    }
    let header = RequestHeader {
        method_id: read_i32_at(buf, 0),
        body_len: read_i32_at(buf, 4),
        param_count: read_i32_at(buf, 8),
    };
    let rest = &buf[REQUEST_HEADER_LEN..];
    let body_len = usize::try_from(header.body_len)
        .map_err(|_| IpcError::BadMessage("negative body length"))?;
    if body_len > rest.len() {
        return Err(IpcError::BadMessage("request body truncated"));
    }
    Ok((header, &rest[..body_len]))
}

// =============================================================================
// REPLIES
// =============================================================================

/// Reply header convention of a transport backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFraming {
    /// Signed length, body accepted only when it fills the rest exactly.
    Standard,
    /// Unsigned length, zero means no body, body capped at the staging bound.
    Lite,
}

impl ReplyFraming {
    pub fn write_reply(self, result: i32, body: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(REPLY_HEADER_LEN + body.len());
        out.extend_from_slice(&result.to_le_bytes());
        match self {
            ReplyFraming::Standard => {
                out.extend_from_slice(&body_len_i32(body)?.to_le_bytes());
            }
            ReplyFraming::Lite => {
                if body.len() > LITE_STAGING_CAPACITY {
                    return Err(EncodeError::CapacityExceeded {
                        needed: body.len(),
                        limit: LITE_STAGING_CAPACITY,
                    });
                }
                let len = u32::try_from(body.len()).map_err(|_| EncodeError::TooLarge { len: body.len() })?;
                out.extend_from_slice(&len.to_le_bytes());
            }
        }
        out.extend_from_slice(body);
        Ok(out)
    }

    /// Reads the leading result code and, when the framing accepts it, the
    /// parameter body.
    pub fn read_reply(self, buf: &[u8]) -> Result<(i32, Option<&[u8]>), IpcError> {
        if buf.len() < 4 {
            return Err(IpcError::BadMessage("reply without result code"));
        }
        let result = read_i32_at(buf, 0);
        if buf.len() < REPLY_HEADER_LEN {
            return Ok((result, None));
        }
        let rest = &buf[REPLY_HEADER_LEN..];
        let body = match self {
            ReplyFraming::Standard => {
                let declared = read_i32_at(buf, 4);
                match usize::try_from(declared) {
                    Ok(len) if len > 0 && len == rest.len() => Some(rest),
                    _ => None,
                }
            }
            ReplyFraming::Lite => {
                let declared = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
                if declared == 0 {
                    None
                } else {
                    let len = declared.min(rest.len()).min(LITE_STAGING_CAPACITY);
                    Some(&rest[..len])
                }
            }
        };
        Ok((result, body))
    }
}

// =============================================================================
// REVERSE CALLS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackHeader {
    pub callback_id: i32,
    pub hook: u64,
    pub body_len: i32,
    pub param_count: i32,
}

pub fn write_callback(callback_id: i32, hook: u64, param_count: i32, body: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let body_len = body_len_i32(body)?;
    let mut out = Vec::with_capacity(CALLBACK_HEADER_LEN + body.len());
    out.extend_from_slice(&callback_id.to_le_bytes());
    out.extend_from_slice(&hook.to_le_bytes());
    out.extend_from_slice(&body_len.to_le_bytes());
    out.extend_from_slice(&param_count.to_le_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

pub fn read_callback(buf: &[u8]) -> Result<(CallbackHeader, &[u8]), IpcError> {
    if buf.len() < CALLBACK_HEADER_LEN {
        return Err(IpcError::BadMessage("short callback header"));
    }
    let mut hook = [0u8; 8];
    hook.copy_from_slice(&buf[4..12]);
    let header = CallbackHeader {
        callback_id: read_i32_at(buf, 0),
        hook: u64::from_le_bytes(hook),
        body_len: read_i32_at(buf, 12),
        param_count: read_i32_at(buf, 16),
    };
    let rest = &buf[CALLBACK_HEADER_LEN..];
    let body_len = usize::try_from(header.body_len)
        .map_err(|_| IpcError::BadMessage("negative body length"))?;
    if body_len > rest.len() {
        return Err(IpcError::BadMessage("callback body truncated"));
    }
    Ok((header, &rest[..body_len]))
}

// =============================================================================
// PLAIN VALUES
// =============================================================================

/// Cursor for the small reply payloads of synchronous reverse calls.
#[derive(Debug)]
pub struct ValueReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ValueReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        if self.buf.len() - self.pos < 4 {
            return None;
        }
        let value = read_i32_at(self.buf, self.pos);
        self.pos += 4;
        Some(value)
    }

    /// `[len: i32][bytes]`; a negative length is an absent string.
    pub fn read_cstring(&mut self) -> Option<String> {
        let len = usize::try_from(self.read_i32()?).ok()?;
        if self.buf.len() - self.pos < len {
            return None;
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        String::from_utf8(bytes.to_vec()).ok()
    }
}

pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Fails without touching `out` when the string overflows the length field.
pub fn write_cstring(out: &mut Vec<u8>, value: Option<&str>) -> Result<(), EncodeError> {
    match value {
        Some(s) => {
            write_i32(out, len_i32(s.len())?);
            out.extend_from_slice(s.as_bytes());
        }
        None => write_i32(out, -1),
    }
    Ok(())
}
