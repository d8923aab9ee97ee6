//! Link generation and two-phase blob resolution.

pub mod generator;
pub mod token;
