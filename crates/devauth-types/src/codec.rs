//! # Parameter Codec
//!
//! Flat sequence of tagged parameters:
//!
//! ```text
//! ┌───────────┬──────────────┬──────────────────────────────────┐
//! │ tag: i32  │ length: i32  │ body: length bytes, word padded │
//! └───────────┴──────────────┴──────────────────────────────────┘
//! ```
//!
//! The body always occupies at least one word, so an absent value is encoded
//! as `length = 0` followed by a zeroed placeholder word. All integers are
//! little-endian.
//!
//! Decoding never copies borrowed parameters. Scalars are copied on access
//! through [`ParamList::get_i32`] / [`ParamList::get_i64`].

use crate::errors::IpcError;
use crate::ids::{DecodePolicy, ParamTag};
use thiserror::Error;

/// Size of the `[tag][length]` record header.
pub const PARAM_HEADER_LEN: usize = 8;

const WORD: usize = 4;

/// Encoded size of a body of `len` bytes.
#[inline]
pub fn padded_len(len: usize) -> usize {
    ((len + WORD - 1) / WORD * WORD).max(WORD)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("value of {len} bytes does not fit the length field")]
    TooLarge { len: usize },

    #[error("staging buffer full: need {needed} bytes, limit is {limit}")]
    CapacityExceeded { needed: usize, limit: usize },
}

impl From<EncodeError> for IpcError {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::TooLarge { .. } => IpcError::BadParam,
            EncodeError::CapacityExceeded { .. } => IpcError::AllocationFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed parameter header ({remaining} bytes remaining)")]
    BadHeader { remaining: usize },

    #[error("declared length {declared} exceeds {remaining} remaining bytes")]
    Truncated { declared: usize, remaining: usize },
}

impl From<DecodeError> for IpcError {
    fn from(_: DecodeError) -> Self {
        IpcError::BadMessage("parameter decode failed")
    }
}

/// Appends one encoded parameter to `buf`, returning the bytes written.
pub fn encode_param(buf: &mut Vec<u8>, tag: i32, value: Option<&[u8]>) -> Result<usize, EncodeError> {
    let value = value.unwrap_or(&[]);
    let len = i32::try_from(value.len()).map_err(|_| EncodeError::TooLarge { len: value.len() })?;
    let body = padded_len(value.len());

    buf.reserve(PARAM_HEADER_LEN + body);
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value);
    buf.resize(buf.len() + (body - value.len()), 0);
    Ok(PARAM_HEADER_LEN + body)
}

/// One parameter as it sits in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawParam<'a> {
    pub tag: i32,
    pub value: &'a [u8],
}

impl RawParam<'_> {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Decodes the parameter at the front of `buf`.
///
/// Returns the parameter and the number of bytes consumed. Trailing padding
/// that the buffer does not hold is tolerated.
pub fn decode_param(buf: &[u8]) -> Result<(RawParam<'_>, usize), DecodeError> {
    if buf.len() < PARAM_HEADER_LEN {
        return Err(DecodeError::BadHeader { remaining: buf.len() });
    }
    let tag = read_i32_at(buf, 0);
    let declared = read_i32_at(buf, 4);
    let declared = usize::try_from(declared).map_err(|_| DecodeError::BadHeader { remaining: buf.len() })?;

    let rest = &buf[PARAM_HEADER_LEN..];
    if declared > rest.len() {
        return Err(DecodeError::Truncated {
            declared,
            remaining: rest.len(),
        });
    }
    let consumed = PARAM_HEADER_LEN + padded_len(declared).min(rest.len());
    Ok((
        RawParam {
            tag,
            value: &rest[..declared],
        },
        consumed,
    ))
}

/// Sequential reader over an encoded parameter body.
#[derive(Debug, Clone)]
pub struct ParamReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ParamReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

impl<'a> Iterator for ParamReader<'a> {
    type Item = Result<RawParam<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        match decode_param(&self.buf[self.pos..]) {
            Ok((param, consumed)) => {
                self.pos += consumed;
                Some(Ok(param))
            }
            Err(err) => {
                // Stop after the first malformed record.
                self.pos = self.buf.len();
                Some(Err(err))
            }
        }
    }
}

// =============================================================================
// SLOT HANDLES
// =============================================================================

/// Generation-checked reference to a remote object slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pub index: u32,
    pub generation: u32,
}

impl SlotHandle {
    pub const ENCODED_LEN: usize = 8;

    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn to_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..4].copy_from_slice(&self.index.to_le_bytes());
        out[4..].copy_from_slice(&self.generation.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return None;
        }
        let index = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let generation = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Some(Self { index, generation })
    }
}

impl std::fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

// =============================================================================
// DECODED PARAMETER LISTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValue<'a> {
    Bytes(&'a [u8]),
    Slot(SlotHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamEntry<'a> {
    pub tag: i32,
    pub value: ParamValue<'a>,
}

impl<'a> ParamEntry<'a> {
    fn from_raw(raw: RawParam<'a>) -> Result<Self, IpcError> {
        let policy = ParamTag::try_from(raw.tag)
            .map(ParamTag::policy)
            .unwrap_or(DecodePolicy::Borrowed);
        let value = match policy {
            DecodePolicy::SlotIndex => {
                ParamValue::Slot(SlotHandle::from_bytes(raw.value).ok_or(IpcError::BadParam)?)
            }
            DecodePolicy::Borrowed | DecodePolicy::Scalar => ParamValue::Bytes(raw.value),
        };
        Ok(Self { tag: raw.tag, value })
    }
}

/// Decoded parameters of one message, borrowing from its buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamList<'a> {
    entries: Vec<ParamEntry<'a>>,
}

impl<'a> ParamList<'a> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Decodes a request body whose header declared `declared` parameters.
    ///
    /// The declared count must lie in `0..=max` and match the number of
    /// records the body actually holds.
    pub fn decode_counted(body: &'a [u8], declared: i32, max: usize) -> Result<Self, IpcError> {
        let expected = usize::try_from(declared).map_err(|_| IpcError::BadParamNum(declared))?;
        if expected > max {
            return Err(IpcError::BadParamNum(declared));
        }
        let mut entries = Vec::with_capacity(expected);
        for raw in ParamReader::new(body) {
            let raw = raw?;
            if entries.len() == expected {
                return Err(IpcError::BadParamNum(declared));
            }
            entries.push(ParamEntry::from_raw(raw)?);
        }
        if entries.len() != expected {
            return Err(IpcError::BadParamNum(declared));
        }
        Ok(Self { entries })
    }

    /// Decodes records until the body ends or a malformed record is met.
    pub fn decode_prefix(body: &'a [u8]) -> Self {
        let entries = ParamReader::new(body)
            .map_while(Result::ok)
            .filter_map(|raw| ParamEntry::from_raw(raw).ok())
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamEntry<'a>> {
        self.entries.iter()
    }

    pub fn push_slot(&mut self, slot: SlotHandle) {
        self.entries.push(ParamEntry {
            tag: ParamTag::CbObject.as_i32(),
            value: ParamValue::Slot(slot),
        });
    }

    pub fn contains(&self, tag: ParamTag) -> bool {
        self.entries.iter().any(|e| e.tag == tag.as_i32())
    }

    /// Borrowed bytes of the first parameter carrying `tag`.
    pub fn get_bytes(&self, tag: ParamTag) -> Result<&'a [u8], IpcError> {
        self.entries
            .iter()
            .find(|e| e.tag == tag.as_i32())
            .and_then(|e| match e.value {
                ParamValue::Bytes(bytes) => Some(bytes),
                ParamValue::Slot(_) => None,
            })
            .ok_or(IpcError::BadMsgType(tag.as_i32()))
    }

    /// Non-empty UTF-8 string, trailing terminator stripped.
    pub fn get_str(&self, tag: ParamTag) -> Result<&'a str, IpcError> {
        match self.get_opt_str(tag)? {
            Some(s) => Ok(s),
            None => Err(IpcError::BadParam),
        }
    }

    /// Like [`get_str`](Self::get_str) but treats an empty value as absent.
    /// A missing tag is still an error.
    pub fn get_opt_str(&self, tag: ParamTag) -> Result<Option<&'a str>, IpcError> {
        let bytes = strip_nul(self.get_bytes(tag)?);
        if bytes.is_empty() {
            return Ok(None);
        }
        std::str::from_utf8(bytes).map(Some).map_err(|_| IpcError::BadParam)
    }

    pub fn get_i32(&self, tag: ParamTag) -> Result<i32, IpcError> {
        copy_scalar::<4>(self.get_bytes(tag)?).map(i32::from_le_bytes)
    }

    pub fn get_i64(&self, tag: ParamTag) -> Result<i64, IpcError> {
        copy_scalar::<8>(self.get_bytes(tag)?).map(i64::from_le_bytes)
    }

    pub fn get_slot(&self) -> Option<SlotHandle> {
        self.entries.iter().find_map(|e| match e.value {
            ParamValue::Slot(slot) => Some(slot),
            ParamValue::Bytes(_) => None,
        })
    }
}

/// Copies a scalar into an `N`-byte buffer.
///
/// Fails when the value is empty or wider than the destination.
fn copy_scalar<const N: usize>(bytes: &[u8]) -> Result<[u8; N], IpcError> {
    if bytes.is_empty() || bytes.len() > N {
        return Err(IpcError::BadParam);
    }
    let mut out = [0u8; N];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

fn strip_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

#[inline]
pub(crate) fn read_i32_at(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

// =============================================================================
// PARAMETER WRITER
// =============================================================================

/// Accumulates encoded parameters for a request, reply or reverse call.
#[derive(Debug, Clone, Default)]
pub struct ParamWriter {
    buf: Vec<u8>,
    count: i32,
    limit: Option<usize>,
}

impl ParamWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer whose body may never exceed `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit),
            count: 0,
            limit: Some(limit),
        }
    }

    pub fn push(&mut self, tag: ParamTag, value: Option<&[u8]>) -> Result<&mut Self, EncodeError> {
        let needed = self.buf.len() + PARAM_HEADER_LEN + padded_len(value.map_or(0, <[u8]>::len));
        if let Some(limit) = self.limit {
            if needed > limit {
                return Err(EncodeError::CapacityExceeded { needed, limit });
            }
        }
        encode_param(&mut self.buf, tag.as_i32(), value)?;
        self.count += 1;
        Ok(self)
    }

    /// Pushes a string with its NUL terminator.
    pub fn push_str(&mut self, tag: ParamTag, value: &str) -> Result<&mut Self, EncodeError> {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.push(tag, Some(&bytes))
    }

    pub fn push_i32(&mut self, tag: ParamTag, value: i32) -> Result<&mut Self, EncodeError> {
        self.push(tag, Some(&value.to_le_bytes()))
    }

    pub fn push_i64(&mut self, tag: ParamTag, value: i64) -> Result<&mut Self, EncodeError> {
        self.push(tag, Some(&value.to_le_bytes()))
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_parts(self) -> (Vec<u8>, i32) {
        (self.buf, self.count)
    }
}
