//! Per-script whitelist of authorized usernames.

pub mod whitelist;
