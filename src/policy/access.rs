//! Access validator: the request-time gate over script content.
//!
//! Checks are evaluated in strict order and the first matching terminal
//! wins:
//! 1. Script must exist.
//! 2. Unprotected scripts grant unconditionally.
//! 3. A whitelisted username is a standing override (bypasses key expiry).
//! 4. Otherwise a key is required.
//! 5. The key must belong to the requested script and be live.
//!
//! Whitelisting superseding key state is product policy: owners get a fast
//! path to grant trusted users without key-rotation overhead, while
//! time-boxed keys serve the general public.
//!
//! Denial is an expected outcome, not a fault, so the validator never
//! returns an error: every input maps to a tagged [`AccessDecision`].

use crate::crypto::digest::content_digest_hex;
use crate::issuer::keys::{KeyId, KeyIssuer, KeyStatus};
use crate::registry::whitelist::WhitelistRegistry;
use crate::store::scripts::{ScriptId, ScriptStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why an access request was denied.
///
/// The serialized form of each variant is the reason code rendered verbatim
/// to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// The referenced script does not exist.
    ScriptNotFound,

    /// The script is protected and no usable key was presented.
    KeyRequired,

    /// The presented key authorizes a different script.
    KeyScriptMismatch,

    /// The presented key is past its expiry instant.
    Expired,

    /// The presented key was revoked by the owner.
    Revoked,

    /// A blob redemption token was already claimed.
    AlreadyRedeemed,

    /// The requester does not own the targeted script.
    Forbidden,
}

impl DenialReason {
    /// The reason code rendered verbatim to callers.
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::ScriptNotFound => "ScriptNotFound",
            DenialReason::KeyRequired => "KeyRequired",
            DenialReason::KeyScriptMismatch => "KeyScriptMismatch",
            DenialReason::Expired => "Expired",
            DenialReason::Revoked => "Revoked",
            DenialReason::AlreadyRedeemed => "AlreadyRedeemed",
            DenialReason::Forbidden => "Forbidden",
        }
    }
}

/// Script content released by a granted access check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContent {
    /// The script the content belongs to.
    pub script_id: ScriptId,

    /// The script's display name.
    pub name: String,

    /// The script bytes.
    pub content: Vec<u8>,

    /// Hex SHA-256 of `content`, for out-of-band integrity checks.
    pub digest: String,
}

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access granted; content released.
    Granted(ResolvedContent),

    /// Access denied with a typed reason.
    Denied(DenialReason),
}

impl AccessDecision {
    /// Whether this decision grants access.
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }
}

/// The request-time gate consulting the script store, key issuer, and
/// whitelist registry.
pub struct AccessValidator {
    scripts: Arc<ScriptStore>,
    issuer: Arc<KeyIssuer>,
    whitelist: Arc<WhitelistRegistry>,
}

impl AccessValidator {
    /// Wire a validator over the shared stores.
    pub fn new(
        scripts: Arc<ScriptStore>,
        issuer: Arc<KeyIssuer>,
        whitelist: Arc<WhitelistRegistry>,
    ) -> Self {
        Self {
            scripts,
            issuer,
            whitelist,
        }
    }

    /// Decide whether to release a script's content.
    ///
    /// A `Granted` outcome via the key path increments the key's usage
    /// counter as an observable side effect.
    pub fn decide(
        &self,
        script_id: ScriptId,
        key_id: Option<KeyId>,
        username: Option<&str>,
    ) -> AccessDecision {
        // 1. Script must exist.
        let Ok(script) = self.scripts.get(script_id) else {
            return AccessDecision::Denied(DenialReason::ScriptNotFound);
        };

        // 2. Unprotected scripts short-circuit to always-grant.
        if !script.protected {
            return Self::granted(script.id, script.name, script.content);
        }

        // 3. Whitelist is a standing override, independent of key state.
        if self.whitelist.has_entries(script_id) {
            if let Some(username) = username {
                if self.whitelist.is_whitelisted(script_id, username) {
                    return Self::granted(script.id, script.name, script.content);
                }
            }
        }

        // 4. A key is required from here on.
        let Some(key_id) = key_id else {
            return AccessDecision::Denied(DenialReason::KeyRequired);
        };

        // 5. The key must be bound to this script and currently live.
        match self.issuer.peek(key_id) {
            None => return AccessDecision::Denied(DenialReason::KeyRequired),
            Some(key) if key.script_id != script_id => {
                return AccessDecision::Denied(DenialReason::KeyScriptMismatch)
            }
            Some(_) => {}
        }

        match self.issuer.validate(key_id) {
            KeyStatus::Valid => Self::granted(script.id, script.name, script.content),
            KeyStatus::Expired => AccessDecision::Denied(DenialReason::Expired),
            KeyStatus::Revoked => AccessDecision::Denied(DenialReason::Revoked),
            // Key removed between peek and validate (cascade delete race)
            KeyStatus::Unknown => AccessDecision::Denied(DenialReason::KeyRequired),
        }
    }

    fn granted(script_id: ScriptId, name: String, content: Vec<u8>) -> AccessDecision {
        let digest = content_digest_hex(&content);
        AccessDecision::Granted(ResolvedContent {
            script_id,
            name,
            content,
            digest,
        })
    }
}
