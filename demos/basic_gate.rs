//! Basic access-control example.
//!
//! Demonstrates the full lifecycle: store a protected script, issue an
//! access key, generate raw and blob links, and serve the content through
//! both delivery modes.
//!
//! # Running
//!
//! ```bash
//! cargo run --example basic_gate
//! ```
//!
//! # Note
//!
//! In production the signing seed should come from a secret store, not a
//! compile-time constant. Anyone holding the seed can mint redemption
//! tokens for any script.

use scriptgate::{GateConfig, LinkKind, Resolution, ScriptGate};
use uuid::Uuid;

// Hard-coded here to demonstrate the pattern.
const SIGNING_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

fn main() {
    let gate = match ScriptGate::new(GateConfig::new(SIGNING_SEED)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let owner = Uuid::new_v4();

    // Store a protected script and issue a 30-day key for it
    let script = gate
        .create_script(owner, "loader", b"print('hello')".to_vec(), true)
        .expect("script creation");
    let key = gate
        .issue_key(script.id, owner, 30, Some("demo key".to_string()))
        .expect("key issuance");
    println!("script {} protected by key {}", script.id, key.id);

    // Raw delivery: the link is bound to the key, so consumers need
    // nothing beyond the link id.
    let raw = gate
        .generate_link(script.id, owner, LinkKind::Raw, Some(key.id))
        .expect("link generation");
    match gate.resolve_link(raw.id, None, None).expect("resolution") {
        Resolution::Content(resolved) => {
            println!("raw link served {} bytes (sha256 {})", resolved.content.len(), resolved.digest)
        }
        Resolution::Redemption(_) => unreachable!("raw links never hand out tokens"),
        Resolution::Denied(reason) => println!("raw link denied: {}", reason.code()),
    }

    // Blob delivery: phase 1 validates and returns a short-lived token,
    // phase 2 redeems it exactly once.
    let blob = gate
        .generate_link(script.id, owner, LinkKind::Blob, Some(key.id))
        .expect("link generation");
    let grant = match gate.resolve_link(blob.id, None, None).expect("resolution") {
        Resolution::Redemption(grant) => grant,
        Resolution::Content(_) => unreachable!("blob links never serve content directly"),
        Resolution::Denied(reason) => {
            eprintln!("blob link denied: {}", reason.code());
            std::process::exit(1);
        }
    };
    println!("redemption token valid until {}", grant.expires_at);

    match gate.redeem(&grant.token, None, None).expect("redemption") {
        Resolution::Content(resolved) => {
            println!("blob redeemed: {}", String::from_utf8_lossy(&resolved.content))
        }
        _ => unreachable!("fresh tokens redeem to content"),
    }

    // A second redemption of the same token is refused
    match gate.redeem(&grant.token, None, None).expect("redemption") {
        Resolution::Denied(reason) => println!("replay refused: {}", reason.code()),
        _ => unreachable!("tokens are single use"),
    }

    let stats = gate.stats();
    println!(
        "{} scripts ({} protected), {} active keys, {} links",
        stats.total_scripts, stats.protected_scripts, stats.active_keys, stats.links
    );
}
