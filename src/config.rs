//! Scriptgate configuration.

use std::time::Duration;

/// Default lifetime of a blob redemption token (5 minutes).
pub const DEFAULT_REDEMPTION_TTL: Duration = Duration::from_secs(5 * 60);

/// Configuration for a [`ScriptGate`](crate::manager::ScriptGate) instance.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Ed25519 signing seed for blob redemption tokens (hex-encoded, 64
    /// characters). Redemption tokens minted by one gate instance can only
    /// be redeemed by instances sharing the same seed.
    pub signing_seed_hex: String,

    /// How long a blob redemption token stays redeemable after phase-1
    /// resolution. Kept short: the token is a fresh-authorization claim,
    /// not a cacheable grant.
    pub redemption_ttl: Duration,
}

impl GateConfig {
    /// Build a configuration with the default redemption TTL.
    pub fn new(signing_seed_hex: impl Into<String>) -> Self {
        Self {
            signing_seed_hex: signing_seed_hex.into(),
            redemption_ttl: DEFAULT_REDEMPTION_TTL,
        }
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), crate::ScriptGateError> {
        if self.signing_seed_hex.len() != 64 {
            return Err(crate::ScriptGateError::ConfigError(format!(
                "signing_seed_hex must be 64 hex characters, got {}",
                self.signing_seed_hex.len()
            )));
        }
        if hex::decode(&self.signing_seed_hex).is_err() {
            return Err(crate::ScriptGateError::ConfigError(
                "signing_seed_hex is not valid hex".to_string(),
            ));
        }
        if self.redemption_ttl.is_zero() {
            return Err(crate::ScriptGateError::ConfigError(
                "redemption_ttl must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
