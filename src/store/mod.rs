//! Script storage and snapshot persistence.

pub mod file;
pub mod scripts;
pub mod snapshot;
