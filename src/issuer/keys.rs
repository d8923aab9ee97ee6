//! Key issuer: creates, tracks, expires, and revokes access keys.
//!
//! Expiry is evaluated lazily at validation time against the injected
//! clock; there is no background sweep. Live records share `revoked` as an
//! `AtomicBool` and the usage counter as an `AtomicU64`, so a validation in
//! flight observes either the pre- or post-revoke state and concurrent
//! successful validations never lose counter updates.

use crate::clock::Clock;
use crate::store::scripts::{ScriptId, ScriptStore, UserId};
use crate::ScriptGateError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Identifier of an access key. The id itself is the credential a consumer
/// presents.
pub type KeyId = Uuid;

/// Minimum key lifetime in days.
pub const MIN_DURATION_DAYS: i64 = 1;

/// Maximum key lifetime in days (ten years).
pub const MAX_DURATION_DAYS: i64 = 3650;

/// Point-in-time view of an access key, as returned to callers and stored
/// in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKey {
    /// Unique id; doubles as the presented credential.
    pub id: KeyId,

    /// The single script this key authorizes.
    pub script_id: ScriptId,

    /// Optional owner-facing note ("VIP User Access").
    pub description: Option<String>,

    /// Issuance timestamp.
    pub created_at: DateTime<Utc>,

    /// Expiry instant: `created_at` plus the requested duration in days.
    pub expires_at: DateTime<Utc>,

    /// Whether the key has been explicitly revoked.
    pub revoked: bool,

    /// Successful validations so far. Informational only, never enforced
    /// as a limit.
    pub usage_count: u64,
}

/// Outcome of validating a key id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    /// Key exists, is unrevoked, and has not expired. The usage counter has
    /// been incremented.
    Valid,

    /// Key exists but its expiry instant has passed.
    Expired,

    /// Key exists but was revoked by the owner.
    Revoked,

    /// No key with this id is on record.
    Unknown,
}

struct KeyRecord {
    id: KeyId,
    script_id: ScriptId,
    description: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    seq: u64,
    revoked: AtomicBool,
    usage: AtomicU64,
}

impl KeyRecord {
    fn view(&self) -> AccessKey {
        AccessKey {
            id: self.id,
            script_id: self.script_id,
            description: self.description.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked: self.revoked.load(Ordering::SeqCst),
            usage_count: self.usage.load(Ordering::SeqCst),
        }
    }
}

/// Thread-safe issuer and tracker of access keys.
pub struct KeyIssuer {
    scripts: Arc<ScriptStore>,
    clock: Arc<dyn Clock>,
    inner: RwLock<HashMap<KeyId, Arc<KeyRecord>>>,
    seq: AtomicU64,
}

impl KeyIssuer {
    /// Create an empty issuer backed by the given script store and clock.
    pub fn new(scripts: Arc<ScriptStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scripts,
            clock,
            inner: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Issue a new key for a script, expiring `duration_days` from now.
    ///
    /// # Errors
    /// `NotFound` if the script does not exist, `Forbidden` unless the
    /// requester owns it, `Validation` if `duration_days` is outside
    /// `1..=3650`.
    pub fn issue(
        &self,
        script_id: ScriptId,
        requester: UserId,
        duration_days: i64,
        description: Option<String>,
    ) -> Result<AccessKey, ScriptGateError> {
        if !(MIN_DURATION_DAYS..=MAX_DURATION_DAYS).contains(&duration_days) {
            return Err(ScriptGateError::Validation(format!(
                "duration must be between {} and {} days, got {}",
                MIN_DURATION_DAYS, MAX_DURATION_DAYS, duration_days
            )));
        }
        if self.scripts.owner_of(script_id)? != requester {
            return Err(ScriptGateError::Forbidden);
        }

        let created_at = self.clock.now_utc();
        let record = Arc::new(KeyRecord {
            id: Uuid::new_v4(),
            script_id,
            description,
            created_at,
            expires_at: created_at + Duration::days(duration_days),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            revoked: AtomicBool::new(false),
            usage: AtomicU64::new(0),
        });

        let view = record.view();
        let mut inner = self.inner.write().expect("key table lock poisoned");
        inner.insert(record.id, record);
        Ok(view)
    }

    /// Revoke a key. Ownership of the underlying script is re-checked via
    /// the key's `script_id`. Idempotent on an already-revoked key.
    ///
    /// # Errors
    /// `NotFound` if the key (or its script) does not exist, `Forbidden`
    /// on ownership mismatch.
    pub fn revoke(&self, key_id: KeyId, requester: UserId) -> Result<(), ScriptGateError> {
        let record = self
            .record(key_id)
            .ok_or(ScriptGateError::NotFound { entity: "key" })?;
        if self.scripts.owner_of(record.script_id)? != requester {
            return Err(ScriptGateError::Forbidden);
        }
        record.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Validate a key by id.
    ///
    /// Expiry dominates: a key past its expiry reports [`KeyStatus::Expired`]
    /// even if it was also revoked. A `Valid` outcome increments the usage
    /// counter as an observable side effect.
    pub fn validate(&self, key_id: KeyId) -> KeyStatus {
        let Some(record) = self.record(key_id) else {
            return KeyStatus::Unknown;
        };

        if self.clock.now_utc() >= record.expires_at {
            return KeyStatus::Expired;
        }
        if record.revoked.load(Ordering::SeqCst) {
            return KeyStatus::Revoked;
        }
        record.usage.fetch_add(1, Ordering::SeqCst);
        KeyStatus::Valid
    }

    /// Fetch a point-in-time view of a key without validating it.
    pub fn peek(&self, key_id: KeyId) -> Option<AccessKey> {
        self.record(key_id).map(|r| r.view())
    }

    /// All keys issued for a script, most recent first. This ordering is a
    /// contract surfaced to listing UIs.
    pub fn list_for_script(&self, script_id: ScriptId) -> Vec<AccessKey> {
        let inner = self.inner.read().expect("key table lock poisoned");
        let mut records: Vec<_> = inner
            .values()
            .filter(|r| r.script_id == script_id)
            .map(|r| (r.seq, r.view()))
            .collect();
        records.sort_by(|a, b| b.0.cmp(&a.0));
        records.into_iter().map(|(_, k)| k).collect()
    }

    /// Drop all keys for a script (cascade on script deletion). Returns the
    /// number of keys removed.
    pub fn remove_for_script(&self, script_id: ScriptId) -> usize {
        let mut inner = self.inner.write().expect("key table lock poisoned");
        let before = inner.len();
        inner.retain(|_, r| r.script_id != script_id);
        before - inner.len()
    }

    /// Number of currently valid keys (unrevoked and unexpired).
    pub fn active_count(&self) -> usize {
        let now = self.clock.now_utc();
        let inner = self.inner.read().expect("key table lock poisoned");
        inner
            .values()
            .filter(|r| !r.revoked.load(Ordering::SeqCst) && now < r.expires_at)
            .count()
    }

    /// Export all keys in issuance order for a snapshot.
    pub fn export(&self) -> Vec<AccessKey> {
        let inner = self.inner.read().expect("key table lock poisoned");
        let mut records: Vec<_> = inner.values().map(|r| (r.seq, r.view())).collect();
        records.sort_by_key(|(seq, _)| *seq);
        records.into_iter().map(|(_, k)| k).collect()
    }

    /// Replace the issuer contents from a snapshot, preserving issuance
    /// order, revocation flags, and usage counts.
    pub fn import(&self, keys: Vec<AccessKey>) {
        let mut inner = self.inner.write().expect("key table lock poisoned");
        inner.clear();
        for key in keys {
            let record = Arc::new(KeyRecord {
                id: key.id,
                script_id: key.script_id,
                description: key.description,
                created_at: key.created_at,
                expires_at: key.expires_at,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
                revoked: AtomicBool::new(key.revoked),
                usage: AtomicU64::new(key.usage_count),
            });
            inner.insert(record.id, record);
        }
    }

    fn record(&self, key_id: KeyId) -> Option<Arc<KeyRecord>> {
        let inner = self.inner.read().expect("key table lock poisoned");
        inner.get(&key_id).cloned()
    }
}
