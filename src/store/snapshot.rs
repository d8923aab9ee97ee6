//! Serializable snapshot of the full platform state.
//!
//! Snapshots carry scripts, keys (with revocation flags and usage counts),
//! whitelist entries, and links, but never outstanding blob redemption
//! claims: tokens are short-lived and bound to the instance that minted
//! them.

use crate::clock::Clock;
use crate::issuer::keys::AccessKey;
use crate::links::generator::GeneratedLink;
use crate::registry::whitelist::WhitelistEntry;
use crate::store::scripts::Script;
use crate::ScriptGateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time export of all stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,

    /// All scripts, in creation order.
    pub scripts: Vec<Script>,

    /// All keys, in issuance order.
    pub keys: Vec<AccessKey>,

    /// All whitelist pairs, ordered by script then username.
    pub whitelist: Vec<WhitelistEntry>,

    /// All generated links, in creation order.
    pub links: Vec<GeneratedLink>,
}

impl Snapshot {
    /// Assemble a snapshot stamped with the clock's current time.
    pub fn new(
        scripts: Vec<Script>,
        keys: Vec<AccessKey>,
        whitelist: Vec<WhitelistEntry>,
        links: Vec<GeneratedLink>,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            saved_at: clock.now_utc(),
            scripts,
            keys,
            whitelist,
            links,
        }
    }

    /// Serialize the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, ScriptGateError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ScriptGateError::SnapshotIO(format!("Failed to serialize snapshot: {}", e)))
    }

    /// Deserialize a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, ScriptGateError> {
        serde_json::from_str(json).map_err(|e| {
            ScriptGateError::SnapshotIO(format!("Failed to deserialize snapshot: {}", e))
        })
    }
}
