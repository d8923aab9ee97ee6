//! In-memory script store.
//!
//! Leaf dependency of every other component: the whitelist registry, key
//! issuer, and link generator all check ownership and existence here.
//! Referential integrity is maintained by the cascading delete orchestrated
//! in [`ScriptGate`](crate::manager::ScriptGate), not detected at read time.

use crate::clock::Clock;
use crate::ScriptGateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Identifier of a script owner.
pub type UserId = Uuid;

/// Identifier of a stored script.
pub type ScriptId = Uuid;

/// A protected (or unprotected) script owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Unique id, generated at creation.
    pub id: ScriptId,

    /// Exclusive owner. Only the owner may mutate or delete the script.
    pub owner: UserId,

    /// Display name, non-empty.
    pub name: String,

    /// Opaque script bytes, non-empty.
    pub content: Vec<u8>,

    /// If false, the access validator short-circuits to always-grant.
    pub protected: bool,

    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Owner-supplied partial update for a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptPatch {
    /// New name, if changing.
    pub name: Option<String>,

    /// New content bytes, if changing.
    pub content: Option<Vec<u8>>,

    /// New protection flag, if changing.
    pub protected: Option<bool>,
}

struct ScriptRecord {
    script: Script,
    seq: u64,
}

/// Thread-safe in-memory store of scripts.
pub struct ScriptStore {
    inner: RwLock<HashMap<ScriptId, ScriptRecord>>,
    clock: Arc<dyn Clock>,
    seq: AtomicU64,
}

impl ScriptStore {
    /// Create an empty store using the given clock for creation timestamps.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            clock,
            seq: AtomicU64::new(0),
        }
    }

    /// Create a script and return the freshly committed entity.
    ///
    /// # Errors
    /// `Validation` if `name` or `content` is empty.
    pub fn create(
        &self,
        owner: UserId,
        name: impl Into<String>,
        content: Vec<u8>,
        protected: bool,
    ) -> Result<Script, ScriptGateError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ScriptGateError::Validation(
                "script name cannot be empty".to_string(),
            ));
        }
        if content.is_empty() {
            return Err(ScriptGateError::Validation(
                "script content cannot be empty".to_string(),
            ));
        }

        let script = Script {
            id: Uuid::new_v4(),
            owner,
            name,
            content,
            protected,
            created_at: self.clock.now_utc(),
        };

        let mut inner = self.inner.write().expect("script store lock poisoned");
        inner.insert(
            script.id,
            ScriptRecord {
                script: script.clone(),
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        Ok(script)
    }

    /// Fetch a script by id.
    pub fn get(&self, id: ScriptId) -> Result<Script, ScriptGateError> {
        let inner = self.inner.read().expect("script store lock poisoned");
        inner
            .get(&id)
            .map(|r| r.script.clone())
            .ok_or(ScriptGateError::NotFound { entity: "script" })
    }

    /// Fetch the owner of a script by id.
    pub fn owner_of(&self, id: ScriptId) -> Result<UserId, ScriptGateError> {
        let inner = self.inner.read().expect("script store lock poisoned");
        inner
            .get(&id)
            .map(|r| r.script.owner)
            .ok_or(ScriptGateError::NotFound { entity: "script" })
    }

    /// All scripts of one owner, most recently created first.
    pub fn list_by_owner(&self, owner: UserId) -> Vec<Script> {
        let inner = self.inner.read().expect("script store lock poisoned");
        let mut records: Vec<_> = inner
            .values()
            .filter(|r| r.script.owner == owner)
            .map(|r| (r.seq, r.script.clone()))
            .collect();
        records.sort_by(|a, b| b.0.cmp(&a.0));
        records.into_iter().map(|(_, s)| s).collect()
    }

    /// Apply a partial update. Only the owner may update.
    ///
    /// # Errors
    /// `NotFound` if the script does not exist, `Forbidden` on ownership
    /// mismatch, `Validation` if the patch would empty the name or content.
    pub fn update(
        &self,
        id: ScriptId,
        requester: UserId,
        patch: ScriptPatch,
    ) -> Result<Script, ScriptGateError> {
        if let Some(name) = &patch.name {
            if name.is_empty() {
                return Err(ScriptGateError::Validation(
                    "script name cannot be empty".to_string(),
                ));
            }
        }
        if let Some(content) = &patch.content {
            if content.is_empty() {
                return Err(ScriptGateError::Validation(
                    "script content cannot be empty".to_string(),
                ));
            }
        }

        let mut inner = self.inner.write().expect("script store lock poisoned");
        let record = inner
            .get_mut(&id)
            .ok_or(ScriptGateError::NotFound { entity: "script" })?;
        if record.script.owner != requester {
            return Err(ScriptGateError::Forbidden);
        }

        if let Some(name) = patch.name {
            record.script.name = name;
        }
        if let Some(content) = patch.content {
            record.script.content = content;
        }
        if let Some(protected) = patch.protected {
            record.script.protected = protected;
        }
        Ok(record.script.clone())
    }

    /// Remove a script. Only the owner may delete.
    ///
    /// Cascading removal of keys, whitelist entries, and links is
    /// orchestrated by the gate facade after this returns.
    pub fn remove(&self, id: ScriptId, requester: UserId) -> Result<Script, ScriptGateError> {
        let mut inner = self.inner.write().expect("script store lock poisoned");
        let record = inner
            .get(&id)
            .ok_or(ScriptGateError::NotFound { entity: "script" })?;
        if record.script.owner != requester {
            return Err(ScriptGateError::Forbidden);
        }
        Ok(inner.remove(&id).map(|r| r.script).expect("checked above"))
    }

    /// Total number of stored scripts.
    pub fn count(&self) -> usize {
        self.inner.read().expect("script store lock poisoned").len()
    }

    /// Number of stored scripts with protection enabled.
    pub fn protected_count(&self) -> usize {
        let inner = self.inner.read().expect("script store lock poisoned");
        inner.values().filter(|r| r.script.protected).count()
    }

    /// Export all scripts in creation order for a snapshot.
    pub fn export(&self) -> Vec<Script> {
        let inner = self.inner.read().expect("script store lock poisoned");
        let mut records: Vec<_> = inner.values().map(|r| (r.seq, r.script.clone())).collect();
        records.sort_by_key(|(seq, _)| *seq);
        records.into_iter().map(|(_, s)| s).collect()
    }

    /// Replace the store contents from a snapshot, preserving order.
    pub fn import(&self, scripts: Vec<Script>) {
        let mut inner = self.inner.write().expect("script store lock poisoned");
        inner.clear();
        for script in scripts {
            inner.insert(
                script.id,
                ScriptRecord {
                    script,
                    seq: self.seq.fetch_add(1, Ordering::Relaxed),
                },
            );
        }
    }
}
