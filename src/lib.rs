#![deny(warnings)]
#![deny(missing_docs)]
//! # scriptgate
//!
//! Access-control core for script protection: decides, for every request,
//! whether a stored script's content may be served, and produces the
//! shareable links and access keys that requests arrive through.
//!
//! ## Features
//!
//! - **Script store**: per-owner script records with a protection flag
//! - **Access keys**: time-limited, revocable, per-script keys with usage
//!   counting
//! - **Whitelist**: per-script username grants that bypass keys entirely
//! - **Links**: raw (direct content) and blob (two-phase, single-use
//!   Ed25519-signed redemption tokens) delivery
//! - **Validator**: one state machine deciding grant or a typed denial
//! - **Snapshots**: JSON export/restore of all stored records
//!
//! ## Quickstart
//!
//! ```no_run
//! use scriptgate::{GateConfig, LinkKind, Resolution, ScriptGate};
//! use uuid::Uuid;
//!
//! # fn main() -> Result<(), scriptgate::ScriptGateError> {
//! let seed = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
//! let gate = ScriptGate::new(GateConfig::new(seed))?;
//!
//! let owner = Uuid::new_v4();
//! let script = gate.create_script(owner, "loader", b"print('hi')".to_vec(), true)?;
//! let key = gate.issue_key(script.id, owner, 30, None)?;
//! let link = gate.generate_link(script.id, owner, LinkKind::Raw, Some(key.id))?;
//!
//! match gate.resolve_link(link.id, None, None)? {
//!     Resolution::Content(resolved) => println!("served {} bytes", resolved.content.len()),
//!     Resolution::Redemption(_) => unreachable!("raw links never hand out tokens"),
//!     Resolution::Denied(reason) => println!("denied: {}", reason.code()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Denials vs errors
//!
//! Policy outcomes (expired key, missing whitelist entry, spent token) are
//! values: [`AccessDecision::Denied`] or [`Resolution::Denied`] carrying a
//! [`DenialReason`]. [`ScriptGateError`] is reserved for caller mistakes
//! and infrastructure failure, so a `?` never swallows a policy decision.
//!
//! ## Testing seams
//!
//! With the `test-seams` feature, [`MockClock`] and
//! [`ScriptGate::new_with_clock`] let tests freeze and advance time.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod issuer;
pub mod links;
pub mod manager;
pub mod policy;
pub mod registry;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use config::{GateConfig, DEFAULT_REDEMPTION_TTL};
pub use errors::ScriptGateError;
pub use issuer::keys::{AccessKey, KeyId, KeyIssuer, KeyStatus};
pub use links::generator::{
    GeneratedLink, LinkGenerator, LinkId, LinkKind, RedemptionGrant, Resolution,
};
pub use links::token::{TokenPayload, TokenSigner};
pub use manager::{GateStats, ScriptGate};
pub use policy::access::{AccessDecision, AccessValidator, DenialReason, ResolvedContent};
pub use registry::whitelist::{WhitelistEntry, WhitelistRegistry};
pub use store::file::SnapshotStore;
pub use store::scripts::{Script, ScriptId, ScriptPatch, ScriptStore, UserId};
pub use store::snapshot::Snapshot;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
