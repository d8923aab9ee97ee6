//! End-to-end access flows through the public `ScriptGate` API.
//!
//! These run against the real system clock, so they only cover behavior
//! that does not depend on time passing; expiry and token-staleness paths
//! are exercised with the mock clock in the unit tests.

use scriptgate::{
    AccessDecision, DenialReason, GateConfig, LinkKind, Resolution, ScriptGate, ScriptGateError,
    ScriptPatch,
};
use uuid::Uuid;

const SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

fn gate() -> ScriptGate {
    ScriptGate::new(GateConfig::new(SEED)).expect("valid config")
}

#[test]
fn protected_script_requires_credentials() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();

    assert_eq!(
        gate.validate_access(script.id, None, None),
        AccessDecision::Denied(DenialReason::KeyRequired)
    );
}

#[test]
fn key_lifecycle_issue_use_revoke() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, Some("beta".into())).unwrap();

    assert!(gate.validate_access(script.id, Some(key.id), None).is_granted());
    assert_eq!(gate.list_keys(script.id)[0].usage_count, 1);

    gate.revoke_key(key.id, owner).unwrap();
    assert_eq!(
        gate.validate_access(script.id, Some(key.id), None),
        AccessDecision::Denied(DenialReason::Revoked)
    );
    // Revocation is idempotent
    gate.revoke_key(key.id, owner).unwrap();
}

#[test]
fn whitelist_bypasses_key_machinery() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, None).unwrap();
    gate.revoke_key(key.id, owner).unwrap();
    gate.whitelist_add(script.id, owner, "alice").unwrap();

    // A whitelisted user gets in even presenting a revoked key, and the
    // key's usage counter does not move.
    assert!(gate
        .validate_access(script.id, Some(key.id), Some("alice"))
        .is_granted());
    assert_eq!(gate.list_keys(script.id)[0].usage_count, 0);
}

#[test]
fn key_scoped_to_its_script() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let a = gate.create_script(owner, "a", b"x".to_vec(), true).unwrap();
    let b = gate.create_script(owner, "b", b"y".to_vec(), true).unwrap();
    let key = gate.issue_key(a.id, owner, 30, None).unwrap();

    assert_eq!(
        gate.validate_access(b.id, Some(key.id), None),
        AccessDecision::Denied(DenialReason::KeyScriptMismatch)
    );
}

#[test]
fn ownership_enforced_across_surface() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, None).unwrap();

    assert!(matches!(
        gate.update_script(script.id, stranger, ScriptPatch::default()),
        Err(ScriptGateError::Forbidden)
    ));
    assert!(matches!(
        gate.issue_key(script.id, stranger, 30, None),
        Err(ScriptGateError::Forbidden)
    ));
    assert!(matches!(
        gate.revoke_key(key.id, stranger),
        Err(ScriptGateError::Forbidden)
    ));
    assert!(matches!(
        gate.whitelist_add(script.id, stranger, "mallory"),
        Err(ScriptGateError::Forbidden)
    ));
    assert!(matches!(
        gate.generate_link(script.id, stranger, LinkKind::Raw, None),
        Err(ScriptGateError::Forbidden)
    ));
    assert!(matches!(
        gate.delete_script(script.id, stranger),
        Err(ScriptGateError::Forbidden)
    ));
}

#[test]
fn raw_link_with_supplied_key() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, None).unwrap();
    // Link generated unbound; consumer supplies the key at request time
    let link = gate
        .generate_link(script.id, owner, LinkKind::Raw, None)
        .unwrap();

    assert_eq!(
        gate.resolve_link(link.id, None, None).unwrap(),
        Resolution::Denied(DenialReason::KeyRequired)
    );

    let Resolution::Content(resolved) = gate.resolve_link(link.id, Some(key.id), None).unwrap()
    else {
        panic!("expected content");
    };
    assert_eq!(resolved.content, b"print(1)");
    assert_eq!(resolved.digest.len(), 64);
}

#[test]
fn blob_token_is_single_use() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, None).unwrap();
    let link = gate
        .generate_link(script.id, owner, LinkKind::Blob, Some(key.id))
        .unwrap();

    let Resolution::Redemption(grant) = gate.resolve_link(link.id, None, None).unwrap() else {
        panic!("expected redemption grant");
    };

    assert!(matches!(
        gate.redeem(&grant.token, None, None).unwrap(),
        Resolution::Content(_)
    ));
    assert_eq!(
        gate.redeem(&grant.token, None, None).unwrap(),
        Resolution::Denied(DenialReason::AlreadyRedeemed)
    );
}

#[test]
fn blob_phase_one_denies_without_token() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let link = gate
        .generate_link(script.id, owner, LinkKind::Blob, None)
        .unwrap();

    // Phase 1 fails validation, so no token is ever minted
    assert_eq!(
        gate.resolve_link(link.id, None, None).unwrap(),
        Resolution::Denied(DenialReason::KeyRequired)
    );
}

#[test]
fn tampered_token_rejected() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, None).unwrap();
    let link = gate
        .generate_link(script.id, owner, LinkKind::Blob, Some(key.id))
        .unwrap();

    let Resolution::Redemption(grant) = gate.resolve_link(link.id, None, None).unwrap() else {
        panic!("expected redemption grant");
    };

    let mut tampered = grant.token.clone();
    let last = tampered.pop().expect("token is non-empty");
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    assert!(matches!(
        gate.redeem(&tampered, None, None),
        Err(ScriptGateError::TokenInvalid)
    ));

    // The genuine token is still redeemable afterwards
    assert!(matches!(
        gate.redeem(&grant.token, None, None).unwrap(),
        Resolution::Content(_)
    ));
}

#[test]
fn delete_cascade_through_public_api() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();
    let key = gate.issue_key(script.id, owner, 30, None).unwrap();
    gate.whitelist_add(script.id, owner, "alice").unwrap();
    let link = gate
        .generate_link(script.id, owner, LinkKind::Blob, Some(key.id))
        .unwrap();
    let Resolution::Redemption(grant) = gate.resolve_link(link.id, None, None).unwrap() else {
        panic!("expected redemption grant");
    };

    gate.delete_script(script.id, owner).unwrap();

    // Nothing referencing the script survives, including the pending claim
    assert!(gate.list_keys(script.id).is_empty());
    assert!(gate.whitelist(script.id).is_empty());
    assert!(gate.list_links(script.id).is_empty());
    assert_eq!(
        gate.redeem(&grant.token, None, None).unwrap(),
        Resolution::Denied(DenialReason::AlreadyRedeemed)
    );
}

#[test]
fn update_toggles_protection() {
    let gate = gate();
    let owner = Uuid::new_v4();
    let script = gate
        .create_script(owner, "loader", b"print(1)".to_vec(), true)
        .unwrap();

    assert!(!gate.validate_access(script.id, None, None).is_granted());

    let patch = ScriptPatch {
        protected: Some(false),
        ..ScriptPatch::default()
    };
    gate.update_script(script.id, owner, patch).unwrap();
    assert!(gate.validate_access(script.id, None, None).is_granted());
}
