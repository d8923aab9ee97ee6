//! Script gate - the main public API.
//!
//! `ScriptGate` wires the script store, whitelist registry, key issuer,
//! link generator, and access validator together behind one facade whose
//! methods mirror the platform's request surface. Every mutating call
//! returns the freshly committed entity, so callers can refresh their view
//! without a follow-up read.

use crate::clock::{Clock, SystemClock};
use crate::config::GateConfig;
use crate::issuer::keys::{AccessKey, KeyId, KeyIssuer};
use crate::links::generator::{GeneratedLink, LinkGenerator, LinkId, LinkKind, Resolution};
use crate::links::token::TokenSigner;
use crate::policy::access::{AccessDecision, AccessValidator};
use crate::registry::whitelist::WhitelistRegistry;
use crate::store::scripts::{Script, ScriptId, ScriptPatch, ScriptStore, UserId};
use crate::store::snapshot::Snapshot;
use crate::ScriptGateError;
use std::sync::Arc;
use tracing::{debug, info};

/// Aggregate counters surfaced to dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStats {
    /// Total stored scripts.
    pub total_scripts: usize,

    /// Stored scripts with protection enabled.
    pub protected_scripts: usize,

    /// Keys currently valid (unrevoked and unexpired).
    pub active_keys: usize,

    /// Total `(script, username)` whitelist pairs. A username whitelisted
    /// on several scripts counts once per script.
    pub whitelist_entries: usize,

    /// Total generated links.
    pub links: usize,
}

/// Main entry point for the access-control core.
///
/// Create one instance per platform and share it; all operations are
/// synchronous and thread-safe.
pub struct ScriptGate {
    config: GateConfig,
    clock: Arc<dyn Clock>,
    scripts: Arc<ScriptStore>,
    whitelist: Arc<WhitelistRegistry>,
    issuer: Arc<KeyIssuer>,
    validator: Arc<AccessValidator>,
    links: Arc<LinkGenerator>,
}

impl ScriptGate {
    /// Create a gate with the given configuration and the system clock.
    ///
    /// # Errors
    /// Returns an error if configuration validation fails or the signing
    /// seed cannot be decoded.
    pub fn new(config: GateConfig) -> Result<Self, ScriptGateError> {
        config.validate()?;
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a gate with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: GateConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScriptGateError> {
        config.validate()?;
        Self::with_clock(config, clock)
    }

    fn with_clock(config: GateConfig, clock: Arc<dyn Clock>) -> Result<Self, ScriptGateError> {
        let signer = TokenSigner::from_seed_hex(&config.signing_seed_hex)?;
        let scripts = Arc::new(ScriptStore::new(clock.clone()));
        let whitelist = Arc::new(WhitelistRegistry::new(scripts.clone()));
        let issuer = Arc::new(KeyIssuer::new(scripts.clone(), clock.clone()));
        let validator = Arc::new(AccessValidator::new(
            scripts.clone(),
            issuer.clone(),
            whitelist.clone(),
        ));
        let links = Arc::new(LinkGenerator::new(
            scripts.clone(),
            issuer.clone(),
            validator.clone(),
            signer,
            clock.clone(),
            config.redemption_ttl,
        ));

        Ok(Self {
            config,
            clock,
            scripts,
            whitelist,
            issuer,
            validator,
            links,
        })
    }

    // --- Scripts ---

    /// Create a script owned by `owner`.
    pub fn create_script(
        &self,
        owner: UserId,
        name: impl Into<String>,
        content: Vec<u8>,
        protected: bool,
    ) -> Result<Script, ScriptGateError> {
        let script = self.scripts.create(owner, name, content, protected)?;
        info!(script = %script.id, protected, "script created");
        Ok(script)
    }

    /// Fetch a script by id.
    pub fn get_script(&self, id: ScriptId) -> Result<Script, ScriptGateError> {
        self.scripts.get(id)
    }

    /// All scripts of one owner, most recently created first.
    pub fn list_scripts(&self, owner: UserId) -> Vec<Script> {
        self.scripts.list_by_owner(owner)
    }

    /// Apply a partial update to a script. Owner only.
    pub fn update_script(
        &self,
        id: ScriptId,
        requester: UserId,
        patch: ScriptPatch,
    ) -> Result<Script, ScriptGateError> {
        let script = self.scripts.update(id, requester, patch)?;
        info!(script = %script.id, "script updated");
        Ok(script)
    }

    /// Delete a script and cascade to all of its keys, whitelist entries,
    /// links, and outstanding redemption claims. Owner only.
    pub fn delete_script(&self, id: ScriptId, requester: UserId) -> Result<(), ScriptGateError> {
        self.scripts.remove(id, requester)?;
        let keys = self.issuer.remove_for_script(id);
        let entries = self.whitelist.remove_for_script(id);
        let links = self.links.remove_for_script(id);
        info!(script = %id, keys, entries, links, "script deleted with cascade");
        Ok(())
    }

    // --- Keys ---

    /// Issue a key for a script, expiring `duration_days` from now.
    pub fn issue_key(
        &self,
        script_id: ScriptId,
        requester: UserId,
        duration_days: i64,
        description: Option<String>,
    ) -> Result<AccessKey, ScriptGateError> {
        let key = self.issuer.issue(script_id, requester, duration_days, description)?;
        info!(key = %key.id, script = %script_id, duration_days, "key issued");
        Ok(key)
    }

    /// Revoke a key. Idempotent. Owner only.
    pub fn revoke_key(&self, key_id: KeyId, requester: UserId) -> Result<(), ScriptGateError> {
        self.issuer.revoke(key_id, requester)?;
        info!(key = %key_id, "key revoked");
        Ok(())
    }

    /// All keys issued for a script, most recent first.
    pub fn list_keys(&self, script_id: ScriptId) -> Vec<AccessKey> {
        self.issuer.list_for_script(script_id)
    }

    // --- Whitelist ---

    /// Whitelist a username for a script. Idempotent. Owner only.
    pub fn whitelist_add(
        &self,
        script_id: ScriptId,
        requester: UserId,
        username: impl Into<String>,
    ) -> Result<(), ScriptGateError> {
        let username = username.into();
        self.whitelist.add(script_id, requester, username.clone())?;
        info!(script = %script_id, username = %username, "whitelist entry added");
        Ok(())
    }

    /// Remove a username from a script's whitelist. Owner only.
    pub fn whitelist_remove(
        &self,
        script_id: ScriptId,
        requester: UserId,
        username: &str,
    ) -> Result<(), ScriptGateError> {
        self.whitelist.remove(script_id, requester, username)?;
        info!(script = %script_id, username = %username, "whitelist entry removed");
        Ok(())
    }

    /// The whitelisted usernames for a script, sorted.
    pub fn whitelist(&self, script_id: ScriptId) -> Vec<String> {
        self.whitelist.list(script_id)
    }

    // --- Links ---

    /// Generate a raw or blob link for a script. Owner only.
    pub fn generate_link(
        &self,
        script_id: ScriptId,
        requester: UserId,
        kind: LinkKind,
        key_id: Option<KeyId>,
    ) -> Result<GeneratedLink, ScriptGateError> {
        let link = self.links.generate(script_id, requester, kind, key_id)?;
        info!(link = %link.id, script = %script_id, ?kind, "link generated");
        Ok(link)
    }

    /// All links for a script, most recent first.
    pub fn list_links(&self, script_id: ScriptId) -> Vec<GeneratedLink> {
        self.links.list_for_script(script_id)
    }

    /// Resolve a link: content for raw links, a redemption token for blob
    /// links (phase 1), or a typed denial.
    pub fn resolve_link(
        &self,
        link_id: LinkId,
        supplied_key: Option<KeyId>,
        username: Option<&str>,
    ) -> Result<Resolution, ScriptGateError> {
        let resolution = self.links.resolve(link_id, supplied_key, username)?;
        if let Resolution::Denied(reason) = &resolution {
            debug!(link = %link_id, code = reason.code(), "link resolution denied");
        }
        Ok(resolution)
    }

    /// Redeem a blob token for content (phase 2). Single use.
    pub fn redeem(
        &self,
        token: &str,
        supplied_key: Option<KeyId>,
        username: Option<&str>,
    ) -> Result<Resolution, ScriptGateError> {
        let resolution = self.links.redeem(token, supplied_key, username)?;
        if let Resolution::Denied(reason) = &resolution {
            debug!(code = reason.code(), "token redemption denied");
        }
        Ok(resolution)
    }

    // --- Validation ---

    /// Run the access state machine directly, outside any link.
    pub fn validate_access(
        &self,
        script_id: ScriptId,
        key_id: Option<KeyId>,
        username: Option<&str>,
    ) -> AccessDecision {
        let decision = self.validator.decide(script_id, key_id, username);
        if let AccessDecision::Denied(reason) = &decision {
            debug!(script = %script_id, code = reason.code(), "access denied");
        }
        decision
    }

    // --- Stats & snapshots ---

    /// Aggregate counters across all stores.
    pub fn stats(&self) -> GateStats {
        GateStats {
            total_scripts: self.scripts.count(),
            protected_scripts: self.scripts.protected_count(),
            active_keys: self.issuer.active_count(),
            whitelist_entries: self.whitelist.entry_count(),
            links: self.links.count(),
        }
    }

    /// Export all stored records as a snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.scripts.export(),
            self.issuer.export(),
            self.whitelist.export(),
            self.links.export(),
            self.clock.as_ref(),
        )
    }

    /// Replace all stored records from a snapshot. Outstanding blob
    /// redemption claims are not restored; unredeemed tokens from before
    /// the restore cannot be redeemed afterwards.
    pub fn restore(&self, snapshot: Snapshot) {
        self.scripts.import(snapshot.scripts);
        self.issuer.import(snapshot.keys);
        self.whitelist.import(snapshot.whitelist);
        self.links.import(snapshot.links);
        info!("snapshot restored");
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::policy::access::DenialReason;
    use chrono::Duration;
    use uuid::Uuid;

    const TEST_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    fn gate() -> (Arc<MockClock>, ScriptGate) {
        let clock = Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z"));
        let gate = ScriptGate::new_with_clock(GateConfig::new(TEST_SEED), clock.clone()).unwrap();
        (clock, gate)
    }

    #[test]
    fn gate_creation() {
        let gate = ScriptGate::new(GateConfig::new(TEST_SEED));
        assert!(gate.is_ok());
    }

    #[test]
    fn gate_rejects_bad_config() {
        let result = ScriptGate::new(GateConfig::new("short"));
        assert!(matches!(result, Err(ScriptGateError::ConfigError(_))));
    }

    #[test]
    fn config_accessor() {
        let (_, gate) = gate();
        assert_eq!(gate.config().signing_seed_hex, TEST_SEED);
    }

    #[test]
    fn issued_key_grants_then_expires() {
        // S1 protected, owned by U1; key K1 with one day of validity.
        let (clock, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        let key = gate.issue_key(script.id, owner, 1, None).unwrap();

        assert!(gate.validate_access(script.id, Some(key.id), None).is_granted());

        clock.advance(Duration::days(1) + Duration::seconds(1));
        assert_eq!(
            gate.validate_access(script.id, Some(key.id), None),
            AccessDecision::Denied(DenialReason::Expired)
        );
    }

    #[test]
    fn whitelist_scenario() {
        let (_, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        gate.whitelist_add(script.id, owner, "alice").unwrap();

        assert!(gate
            .validate_access(script.id, None, Some("alice"))
            .is_granted());
        assert_eq!(
            gate.validate_access(script.id, None, Some("bob")),
            AccessDecision::Denied(DenialReason::KeyRequired)
        );
    }

    #[test]
    fn raw_link_bound_to_key_expires_with_it() {
        let (clock, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        let key = gate.issue_key(script.id, owner, 1, None).unwrap();
        let link = gate
            .generate_link(script.id, owner, LinkKind::Raw, Some(key.id))
            .unwrap();

        assert!(matches!(
            gate.resolve_link(link.id, None, None).unwrap(),
            Resolution::Content(_)
        ));

        clock.advance(Duration::days(2));
        assert_eq!(
            gate.resolve_link(link.id, None, None).unwrap(),
            Resolution::Denied(DenialReason::Expired)
        );
    }

    #[test]
    fn blob_link_full_two_phase_flow() {
        let (_, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        let key = gate.issue_key(script.id, owner, 30, None).unwrap();
        let link = gate
            .generate_link(script.id, owner, LinkKind::Blob, Some(key.id))
            .unwrap();

        let Resolution::Redemption(grant) = gate.resolve_link(link.id, None, None).unwrap()
        else {
            panic!("expected redemption grant");
        };

        let Resolution::Content(content) = gate.redeem(&grant.token, None, None).unwrap() else {
            panic!("expected content");
        };
        assert_eq!(content.content, b"print(1)");

        assert_eq!(
            gate.redeem(&grant.token, None, None).unwrap(),
            Resolution::Denied(DenialReason::AlreadyRedeemed)
        );
    }

    #[test]
    fn delete_script_cascades_everywhere() {
        let (_, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        let key = gate.issue_key(script.id, owner, 30, None).unwrap();
        gate.whitelist_add(script.id, owner, "alice").unwrap();
        let link = gate
            .generate_link(script.id, owner, LinkKind::Raw, Some(key.id))
            .unwrap();

        gate.delete_script(script.id, owner).unwrap();

        assert!(gate.get_script(script.id).is_err());
        assert!(gate.list_keys(script.id).is_empty());
        assert!(gate.whitelist(script.id).is_empty());
        assert!(matches!(
            gate.resolve_link(link.id, None, None),
            Err(ScriptGateError::NotFound { entity: "link" })
        ));
        assert_eq!(
            gate.validate_access(script.id, Some(key.id), None),
            AccessDecision::Denied(DenialReason::ScriptNotFound)
        );
    }

    #[test]
    fn unprotected_script_ignores_key_and_whitelist_state() {
        let (_, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "open", b"print(1)".to_vec(), false)
            .unwrap();
        // Keys and whitelist entries stay stored but are inert
        gate.issue_key(script.id, owner, 30, None).unwrap();
        gate.whitelist_add(script.id, owner, "alice").unwrap();

        assert!(gate.validate_access(script.id, None, None).is_granted());
        assert!(gate.validate_access(script.id, None, Some("bob")).is_granted());
        assert_eq!(gate.list_keys(script.id).len(), 1);
        assert_eq!(gate.whitelist(script.id), vec!["alice".to_string()]);
    }

    #[test]
    fn stats_reflect_stores() {
        let (_, gate) = gate();
        let owner = Uuid::new_v4();
        let a = gate
            .create_script(owner, "a", b"x".to_vec(), true)
            .unwrap();
        gate.create_script(owner, "b", b"y".to_vec(), false).unwrap();
        let key = gate.issue_key(a.id, owner, 30, None).unwrap();
        gate.issue_key(a.id, owner, 30, None).unwrap();
        gate.revoke_key(key.id, owner).unwrap();
        gate.whitelist_add(a.id, owner, "alice").unwrap();
        gate.generate_link(a.id, owner, LinkKind::Raw, None).unwrap();

        assert_eq!(
            gate.stats(),
            GateStats {
                total_scripts: 2,
                protected_scripts: 1,
                active_keys: 1,
                whitelist_entries: 1,
                links: 1,
            }
        );
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let (clock, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        let key = gate.issue_key(script.id, owner, 30, None).unwrap();
        gate.whitelist_add(script.id, owner, "alice").unwrap();
        let link = gate
            .generate_link(script.id, owner, LinkKind::Raw, Some(key.id))
            .unwrap();
        gate.validate_access(script.id, Some(key.id), None);

        let snapshot = gate.snapshot();

        // A second gate restored from the snapshot behaves identically
        let other =
            ScriptGate::new_with_clock(GateConfig::new(TEST_SEED), clock.clone()).unwrap();
        other.restore(snapshot);

        assert_eq!(other.get_script(script.id).unwrap().name, "loader");
        assert_eq!(other.list_keys(script.id)[0].usage_count, 1);
        assert!(other
            .validate_access(script.id, None, Some("alice"))
            .is_granted());
        assert!(matches!(
            other.resolve_link(link.id, None, None).unwrap(),
            Resolution::Content(_)
        ));
    }

    #[test]
    fn restore_invalidates_outstanding_tokens() {
        let (_, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        let key = gate.issue_key(script.id, owner, 30, None).unwrap();
        let link = gate
            .generate_link(script.id, owner, LinkKind::Blob, Some(key.id))
            .unwrap();
        let Resolution::Redemption(grant) = gate.resolve_link(link.id, None, None).unwrap()
        else {
            panic!("expected redemption grant");
        };

        gate.restore(gate.snapshot());

        // The token predates the restore; it must no longer redeem even
        // though the link itself was carried over.
        assert_eq!(
            gate.redeem(&grant.token, None, None).unwrap(),
            Resolution::Denied(DenialReason::AlreadyRedeemed)
        );

        // A fresh phase-1 pass against the restored link works as usual
        let Resolution::Redemption(fresh) = gate.resolve_link(link.id, None, None).unwrap()
        else {
            panic!("expected redemption grant");
        };
        assert!(matches!(
            gate.redeem(&fresh.token, None, None).unwrap(),
            Resolution::Content(_)
        ));
    }

    #[test]
    fn snapshot_survives_file_store() {
        use crate::store::file::SnapshotStore;
        use tempfile::TempDir;

        let (clock, gate) = gate();
        let owner = Uuid::new_v4();
        let script = gate
            .create_script(owner, "loader", b"print(1)".to_vec(), true)
            .unwrap();
        gate.issue_key(script.id, owner, 30, None).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        store.save(&gate.snapshot()).unwrap();

        let other =
            ScriptGate::new_with_clock(GateConfig::new(TEST_SEED), clock.clone()).unwrap();
        other.restore(store.load().unwrap().unwrap());
        assert_eq!(other.list_keys(script.id).len(), 1);
    }
}
