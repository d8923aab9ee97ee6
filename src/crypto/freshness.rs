//! Redemption token freshness enforcement.
//!
//! A blob redemption token is only a claim on a *fresh* authorization.
//! Tokens older than the configured TTL are rejected; tokens dated in the
//! future indicate clock tampering and are rejected outright.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Tolerance for tokens dated slightly in the future (60 seconds).
pub const MAX_FUTURE_TOLERANCE_SECONDS: i64 = 60;

/// Whether a token issued at `issued_at` is still within its TTL.
///
/// Returns `false` for stale tokens and for tokens from the future beyond
/// the clock-skew tolerance.
pub fn token_is_fresh<C: Clock + ?Sized>(
    issued_at: DateTime<Utc>,
    ttl: Duration,
    clock: &C,
) -> bool {
    // Millisecond precision: whole-second truncation would stretch the
    // effective TTL by up to a second.
    let now = clock.now_utc();
    let age_ms = (now - issued_at).num_milliseconds();

    if age_ms > ttl.as_millis() as i64 {
        return false;
    }
    if age_ms < -MAX_FUTURE_TOLERANCE_SECONDS * 1000 {
        return false;
    }
    true
}
