//! Link generator: distributable retrieval handles over scripts.
//!
//! Two kinds of link exist. A `raw` link resolves directly to script bytes
//! once authorization succeeds. A `blob` link resolves in two phases: phase
//! 1 returns a signed single-use redemption token only if validation
//! succeeds at that instant; phase 2 redeems the token and re-runs full
//! validation before releasing bytes. The indirection lets a blob link be
//! distributed publicly while keeping content retrieval gated on a fresh
//! authorization check every time.

use crate::clock::Clock;
use crate::crypto::freshness::token_is_fresh;
use crate::issuer::keys::{KeyId, KeyIssuer};
use crate::links::token::TokenSigner;
use crate::policy::access::{AccessDecision, AccessValidator, DenialReason, ResolvedContent};
use crate::store::scripts::{ScriptId, ScriptStore, UserId};
use crate::ScriptGateError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Identifier of a generated link.
pub type LinkId = Uuid;

/// Delivery mode of a generated link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Resolves directly to script bytes.
    Raw,

    /// Resolves to a signed single-use redemption token first.
    Blob,
}

/// A distributable retrieval handle referencing a script and optionally a
/// bound key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLink {
    /// Unique id, generated at creation.
    pub id: LinkId,

    /// The script this link delivers.
    pub script_id: ScriptId,

    /// Delivery mode.
    pub kind: LinkKind,

    /// Key embedded in the link. When absent the consumer must supply one.
    /// Binding may outlive the key's validity; validity is re-checked at
    /// resolution, not at generation.
    pub bound_key: Option<KeyId>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Phase-1 outcome of resolving a blob link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionGrant {
    /// The signed single-use token. Present it to `redeem` to obtain bytes.
    pub token: String,

    /// Instant after which the token is no longer redeemable.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of resolving a link or redeeming a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Authorization succeeded; content released.
    Content(ResolvedContent),

    /// Blob phase 1 succeeded; redeem the token for content.
    Redemption(RedemptionGrant),

    /// Authorization failed with a typed reason.
    Denied(DenialReason),
}

struct LinkRecord {
    link: GeneratedLink,
    seq: u64,
}

struct PendingClaim {
    script_id: ScriptId,
    issued_at: DateTime<Utc>,
}

/// Thread-safe generator and resolver of script links.
pub struct LinkGenerator {
    scripts: Arc<ScriptStore>,
    issuer: Arc<KeyIssuer>,
    validator: Arc<AccessValidator>,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    inner: RwLock<HashMap<LinkId, LinkRecord>>,
    claims: RwLock<HashMap<Uuid, PendingClaim>>,
    seq: AtomicU64,
}

impl LinkGenerator {
    /// Create an empty generator over the shared stores.
    pub fn new(
        scripts: Arc<ScriptStore>,
        issuer: Arc<KeyIssuer>,
        validator: Arc<AccessValidator>,
        signer: TokenSigner,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            scripts,
            issuer,
            validator,
            signer,
            clock,
            ttl,
            inner: RwLock::new(HashMap::new()),
            claims: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Generate a link for a script.
    ///
    /// # Errors
    /// `NotFound` if the script (or a supplied `key_id`) does not exist,
    /// `Forbidden` unless the requester owns the script, `Validation` if
    /// the bound key belongs to a different script. The bound key need not
    /// currently be valid.
    pub fn generate(
        &self,
        script_id: ScriptId,
        requester: UserId,
        kind: LinkKind,
        key_id: Option<KeyId>,
    ) -> Result<GeneratedLink, ScriptGateError> {
        if self.scripts.owner_of(script_id)? != requester {
            return Err(ScriptGateError::Forbidden);
        }
        if let Some(key_id) = key_id {
            let key = self
                .issuer
                .peek(key_id)
                .ok_or(ScriptGateError::NotFound { entity: "key" })?;
            if key.script_id != script_id {
                return Err(ScriptGateError::Validation(
                    "bound key belongs to a different script".to_string(),
                ));
            }
        }

        let link = GeneratedLink {
            id: Uuid::new_v4(),
            script_id,
            kind,
            bound_key: key_id,
            created_at: self.clock.now_utc(),
        };

        let mut inner = self.inner.write().expect("link table lock poisoned");
        inner.insert(
            link.id,
            LinkRecord {
                link: link.clone(),
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        Ok(link)
    }

    /// Resolve a link.
    ///
    /// Raw links delegate to the access validator and return content on
    /// success. Blob links run the same validation and, on success, return
    /// a redemption token instead (phase 1).
    ///
    /// # Errors
    /// `NotFound` if no link with this id exists. Authorization failures
    /// are not errors; they surface as [`Resolution::Denied`].
    pub fn resolve(
        &self,
        link_id: LinkId,
        supplied_key: Option<KeyId>,
        username: Option<&str>,
    ) -> Result<Resolution, ScriptGateError> {
        let link = self
            .get(link_id)
            .ok_or(ScriptGateError::NotFound { entity: "link" })?;
        let key_id = link.bound_key.or(supplied_key);

        match self.validator.decide(link.script_id, key_id, username) {
            AccessDecision::Denied(reason) => Ok(Resolution::Denied(reason)),
            AccessDecision::Granted(content) => match link.kind {
                LinkKind::Raw => Ok(Resolution::Content(content)),
                LinkKind::Blob => {
                    let (payload, token) =
                        self.signer.mint(link.id, link.script_id, self.clock.as_ref())?;
                    self.register_claim(payload.token_id, link.script_id, payload.issued_at);
                    Ok(Resolution::Redemption(RedemptionGrant {
                        token,
                        expires_at: payload.issued_at
                            + chrono::Duration::seconds(self.ttl.as_secs() as i64),
                    }))
                }
            },
        }
    }

    /// Redeem a blob token (phase 2).
    ///
    /// The token's claim is consumed exactly once, even when the subsequent
    /// re-validation denies; concurrent duplicate redemptions yield one
    /// success and the rest `Denied(AlreadyRedeemed)`.
    ///
    /// # Errors
    /// `TokenInvalid` if the token is malformed or its signature does not
    /// verify.
    pub fn redeem(
        &self,
        token: &str,
        supplied_key: Option<KeyId>,
        username: Option<&str>,
    ) -> Result<Resolution, ScriptGateError> {
        let payload = self.signer.decode_and_verify(token)?;

        // Single-use claim: exactly one redemption may take it.
        if !self.take_claim(payload.token_id) {
            return Ok(Resolution::Denied(DenialReason::AlreadyRedeemed));
        }

        if !token_is_fresh(payload.issued_at, self.ttl, self.clock.as_ref()) {
            return Ok(Resolution::Denied(DenialReason::Expired));
        }

        let Some(link) = self.get(payload.link_id) else {
            // Link cascaded away between phases
            return Ok(Resolution::Denied(DenialReason::ScriptNotFound));
        };
        let key_id = link.bound_key.or(supplied_key);

        match self.validator.decide(link.script_id, key_id, username) {
            AccessDecision::Granted(content) => Ok(Resolution::Content(content)),
            AccessDecision::Denied(reason) => Ok(Resolution::Denied(reason)),
        }
    }

    /// Fetch a link by id.
    pub fn get(&self, link_id: LinkId) -> Option<GeneratedLink> {
        let inner = self.inner.read().expect("link table lock poisoned");
        inner.get(&link_id).map(|r| r.link.clone())
    }

    /// All links for a script, most recent first.
    pub fn list_for_script(&self, script_id: ScriptId) -> Vec<GeneratedLink> {
        let inner = self.inner.read().expect("link table lock poisoned");
        let mut records: Vec<_> = inner
            .values()
            .filter(|r| r.link.script_id == script_id)
            .map(|r| (r.seq, r.link.clone()))
            .collect();
        records.sort_by(|a, b| b.0.cmp(&a.0));
        records.into_iter().map(|(_, l)| l).collect()
    }

    /// Drop all links and outstanding claims for a script (cascade on
    /// script deletion). Returns the number of links removed.
    pub fn remove_for_script(&self, script_id: ScriptId) -> usize {
        let mut inner = self.inner.write().expect("link table lock poisoned");
        let before = inner.len();
        inner.retain(|_, r| r.link.script_id != script_id);
        let removed = before - inner.len();
        drop(inner);

        let mut claims = self.claims.write().expect("claim table lock poisoned");
        claims.retain(|_, c| c.script_id != script_id);
        removed
    }

    /// Total number of generated links.
    pub fn count(&self) -> usize {
        self.inner.read().expect("link table lock poisoned").len()
    }

    /// Export all links in creation order for a snapshot. Outstanding
    /// redemption claims are deliberately not exported: a token must be
    /// redeemed against the instance that minted it.
    pub fn export(&self) -> Vec<GeneratedLink> {
        let inner = self.inner.read().expect("link table lock poisoned");
        let mut records: Vec<_> = inner.values().map(|r| (r.seq, r.link.clone())).collect();
        records.sort_by_key(|(seq, _)| *seq);
        records.into_iter().map(|(_, l)| l).collect()
    }

    /// Replace the link table from a snapshot. All outstanding redemption
    /// claims are dropped: a token minted before the restore is no longer
    /// redeemable.
    pub fn import(&self, links: Vec<GeneratedLink>) {
        let mut inner = self.inner.write().expect("link table lock poisoned");
        inner.clear();
        for link in links {
            inner.insert(
                link.id,
                LinkRecord {
                    link,
                    seq: self.seq.fetch_add(1, Ordering::Relaxed),
                },
            );
        }
        drop(inner);

        let mut claims = self.claims.write().expect("claim table lock poisoned");
        claims.clear();
    }

    fn register_claim(&self, token_id: Uuid, script_id: ScriptId, issued_at: DateTime<Utc>) {
        let mut claims = self.claims.write().expect("claim table lock poisoned");
        // Stale claims can never be redeemed; drop them while we hold the lock
        let now = self.clock.now_utc();
        let ttl_secs = self.ttl.as_secs() as i64;
        claims.retain(|_, c| (now - c.issued_at).num_seconds() <= ttl_secs);
        claims.insert(
            token_id,
            PendingClaim {
                script_id,
                issued_at,
            },
        );
    }

    fn take_claim(&self, token_id: Uuid) -> bool {
        let mut claims = self.claims.write().expect("claim table lock poisoned");
        claims.remove(&token_id).is_some()
    }
}
