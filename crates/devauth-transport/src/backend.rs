//! Transport profiles.

use devauth_types::{ParamWriter, ReplyFraming, LITE_STAGING_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two substrates the IPC layer runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded transport with bounded staging buffers.
    Lite,
    /// Full system transport.
    #[default]
    Standard,
}

impl Backend {
    pub fn reply_framing(self) -> ReplyFraming {
        match self {
            Backend::Lite => ReplyFraming::Lite,
            Backend::Standard => ReplyFraming::Standard,
        }
    }

    /// Upper bound on a staged parameter body, if any.
    pub fn staging_limit(self) -> Option<usize> {
        match self {
            Backend::Lite => Some(LITE_STAGING_CAPACITY),
            Backend::Standard => None,
        }
    }

    /// Parameter writer honoring this backend's staging bound.
    pub fn param_writer(self) -> ParamWriter {
        match self.staging_limit() {
            Some(limit) => ParamWriter::with_limit(limit),
            None => ParamWriter::new(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lite" => Some(Backend::Lite),
            "standard" => Some(Backend::Standard),
            _ => None,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Lite => f.write_str("lite"),
            Backend::Standard => f.write_str("standard"),
        }
    }
}
