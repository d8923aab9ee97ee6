//! Scriptgate error types.

use thiserror::Error;

/// Errors that can occur during store, issuance, and link operations.
///
/// Content-gating denials are deliberately *not* represented here: a denied
/// access check is an expected outcome and is returned as a tagged
/// [`AccessDecision`](crate::policy::access::AccessDecision) value instead.
#[derive(Debug, Error)]
pub enum ScriptGateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed input from the caller (empty name, out-of-range duration, ...).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requester does not own the script targeted by a mutating operation.
    #[error("Operation forbidden: requester does not own the script")]
    Forbidden,

    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// The kind of entity that was looked up ("script", "key", "link").
        entity: &'static str,
    },

    /// A redemption token failed to decode or its signature did not verify.
    #[error("Redemption token malformed or tampered")]
    TokenInvalid,

    /// Snapshot persistence I/O error.
    #[error("Snapshot I/O error: {0}")]
    SnapshotIO(String),
}
