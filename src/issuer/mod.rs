//! Access key issuance, expiry, and revocation.

pub mod keys;
