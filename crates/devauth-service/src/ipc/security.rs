//! Security boundary of the stub dispatcher.
//!
//! Both checks run before the method is resolved, so a rejected caller never
//! reaches the dispatch table.
//!
//! # Authorization Rules
//!
//! | Check | Rejects with |
//! |-------|--------------|
//! | Interface token differs from the configured descriptor | `BadMessage` |
//! | Caller uid not in a non-empty allow list | `PermissionDenied` |

use devauth_types::IpcError;

/// Authorization rules for inbound method calls.
#[derive(Debug, Clone)]
pub struct AuthorizationRules;

impl AuthorizationRules {
    /// Validates the interface descriptor carried by the request.
    pub fn validate_interface_token(expected: &str, received: &str) -> Result<(), IpcError> {
        if expected != received {
            return Err(IpcError::BadMessage("interface token mismatch"));
        }
        Ok(())
    }

    /// Validates the caller uid against the allow list.
    ///
    /// An empty list admits every caller.
    pub fn validate_caller(allowed: &[u32], uid: u32) -> Result<(), IpcError> {
        if !allowed.is_empty() && !allowed.contains(&uid) {
            return Err(IpcError::PermissionDenied);
        }
        Ok(())
    }
}
