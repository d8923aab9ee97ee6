//! Whitelist registry: per-script sets of authorized usernames.
//!
//! A whitelisted username is a standing grant for that script only. The
//! access validator treats it as a superseding override: it bypasses key
//! expiry entirely. Entries are inert for unprotected scripts but remain
//! stored.

use crate::store::scripts::{ScriptId, ScriptStore, UserId};
use crate::ScriptGateError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// A single `(script, username)` whitelist pair, as exported in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// The script the entry applies to.
    pub script_id: ScriptId,

    /// The authorized username.
    pub username: String,
}

/// Thread-safe registry of per-script whitelists.
pub struct WhitelistRegistry {
    scripts: Arc<ScriptStore>,
    inner: RwLock<HashMap<ScriptId, BTreeSet<String>>>,
}

impl WhitelistRegistry {
    /// Create an empty registry backed by the given script store for
    /// ownership checks.
    pub fn new(scripts: Arc<ScriptStore>) -> Self {
        Self {
            scripts,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Add a username to a script's whitelist. Idempotent: re-adding an
    /// existing pair is a no-op, not an error.
    ///
    /// # Errors
    /// `NotFound` if the script does not exist, `Forbidden` unless the
    /// requester owns it, `Validation` on an empty username.
    pub fn add(
        &self,
        script_id: ScriptId,
        requester: UserId,
        username: impl Into<String>,
    ) -> Result<(), ScriptGateError> {
        let username = username.into();
        if username.is_empty() {
            return Err(ScriptGateError::Validation(
                "username cannot be empty".to_string(),
            ));
        }
        self.check_owner(script_id, requester)?;

        let mut inner = self.inner.write().expect("whitelist lock poisoned");
        inner.entry(script_id).or_default().insert(username);
        Ok(())
    }

    /// Remove a username from a script's whitelist. Removing an absent pair
    /// is a no-op.
    pub fn remove(
        &self,
        script_id: ScriptId,
        requester: UserId,
        username: &str,
    ) -> Result<(), ScriptGateError> {
        self.check_owner(script_id, requester)?;

        let mut inner = self.inner.write().expect("whitelist lock poisoned");
        if let Some(set) = inner.get_mut(&script_id) {
            set.remove(username);
            if set.is_empty() {
                inner.remove(&script_id);
            }
        }
        Ok(())
    }

    /// Whether a username is whitelisted for a script.
    pub fn is_whitelisted(&self, script_id: ScriptId, username: &str) -> bool {
        let inner = self.inner.read().expect("whitelist lock poisoned");
        inner
            .get(&script_id)
            .is_some_and(|set| set.contains(username))
    }

    /// Whether a script has any whitelist entries at all.
    pub fn has_entries(&self, script_id: ScriptId) -> bool {
        let inner = self.inner.read().expect("whitelist lock poisoned");
        inner.get(&script_id).is_some_and(|set| !set.is_empty())
    }

    /// The whitelisted usernames for a script, sorted.
    pub fn list(&self, script_id: ScriptId) -> Vec<String> {
        let inner = self.inner.read().expect("whitelist lock poisoned");
        inner
            .get(&script_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all entries for a script (cascade on script deletion).
    /// Returns the number of entries removed.
    pub fn remove_for_script(&self, script_id: ScriptId) -> usize {
        let mut inner = self.inner.write().expect("whitelist lock poisoned");
        inner.remove(&script_id).map(|set| set.len()).unwrap_or(0)
    }

    /// Total number of `(script, username)` pairs across all scripts.
    pub fn entry_count(&self) -> usize {
        let inner = self.inner.read().expect("whitelist lock poisoned");
        inner.values().map(|set| set.len()).sum()
    }

    /// Export all entries for a snapshot, ordered by script then username.
    pub fn export(&self) -> Vec<WhitelistEntry> {
        let inner = self.inner.read().expect("whitelist lock poisoned");
        let mut entries: Vec<WhitelistEntry> = inner
            .iter()
            .flat_map(|(script_id, set)| {
                set.iter().map(|username| WhitelistEntry {
                    script_id: *script_id,
                    username: username.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| (a.script_id, &a.username).cmp(&(b.script_id, &b.username)));
        entries
    }

    /// Replace the registry contents from a snapshot.
    pub fn import(&self, entries: Vec<WhitelistEntry>) {
        let mut inner = self.inner.write().expect("whitelist lock poisoned");
        inner.clear();
        for entry in entries {
            inner
                .entry(entry.script_id)
                .or_default()
                .insert(entry.username);
        }
    }

    fn check_owner(&self, script_id: ScriptId, requester: UserId) -> Result<(), ScriptGateError> {
        if self.scripts.owner_of(script_id)? != requester {
            return Err(ScriptGateError::Forbidden);
        }
        Ok(())
    }
}
