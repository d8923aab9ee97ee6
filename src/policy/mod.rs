//! Request-time access policy.

pub mod access;
