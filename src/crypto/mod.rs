//! Cryptographic primitives for redemption tokens and content digests.

pub mod digest;
pub mod freshness;
pub mod signing;
pub mod verify;
