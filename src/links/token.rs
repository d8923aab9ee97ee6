//! Signed blob redemption tokens.
//!
//! Phase-1 resolution of a blob link mints one of these instead of the
//! content. The wire form is `base64url(payload-json).base64url(signature)`
//! where the signature covers the canonical signing string of all payload
//! fields, so the token cannot be re-bound to another link or script.

use crate::clock::Clock;
use crate::crypto::signing::build_token_signing_string;
use crate::crypto::verify::{decode_public_key, sign_ed25519, verify_ed25519};
use crate::ScriptGateError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The signed fields of a redemption token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Single-use claim id; consumed at redemption.
    pub token_id: Uuid,

    /// The blob link this token was minted for.
    pub link_id: Uuid,

    /// The script behind the link.
    pub script_id: Uuid,

    /// Minting instant; freshness is checked against this.
    pub issued_at: DateTime<Utc>,
}

/// Mints and verifies redemption tokens with the platform signing key.
pub struct TokenSigner {
    signing_key: SigningKey,
    public_key_hex: String,
}

impl TokenSigner {
    /// Build a signer from a hex-encoded Ed25519 seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self, ScriptGateError> {
        let signing_key = crate::crypto::verify::decode_signing_seed(seed_hex)?;
        let public_key_hex = hex::encode(signing_key.verifying_key().to_bytes());
        Ok(Self {
            signing_key,
            public_key_hex,
        })
    }

    /// Mint a signed token for a link at the clock's current instant.
    pub fn mint(
        &self,
        link_id: Uuid,
        script_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(TokenPayload, String), ScriptGateError> {
        let payload = TokenPayload {
            token_id: Uuid::new_v4(),
            link_id,
            script_id,
            issued_at: clock.now_utc(),
        };

        let json = serde_json::to_vec(&payload).map_err(|e| {
            ScriptGateError::Validation(format!("Failed to serialize token payload: {}", e))
        })?;
        let signing_string = build_token_signing_string(
            payload.token_id,
            payload.link_id,
            payload.script_id,
            payload.issued_at,
        );
        let signature = sign_ed25519(&signing_string, &self.signing_key);

        let token = format!("{}.{}", URL_SAFE_NO_PAD.encode(json), signature);
        Ok((payload, token))
    }

    /// Decode a token string and verify its signature.
    ///
    /// # Errors
    /// `TokenInvalid` for anything that does not decode to a payload signed
    /// by this platform's key. Freshness and single-use are checked by the
    /// caller, not here.
    pub fn decode_and_verify(&self, token: &str) -> Result<TokenPayload, ScriptGateError> {
        let (payload_b64, signature_b64) = token
            .split_once('.')
            .ok_or(ScriptGateError::TokenInvalid)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| ScriptGateError::TokenInvalid)?;
        let payload: TokenPayload =
            serde_json::from_slice(&json).map_err(|_| ScriptGateError::TokenInvalid)?;

        let signing_string = build_token_signing_string(
            payload.token_id,
            payload.link_id,
            payload.script_id,
            payload.issued_at,
        );
        let verifying_key = decode_public_key(&self.public_key_hex)?;
        verify_ed25519(signature_b64, &signing_string, &verifying_key)?;

        Ok(payload)
    }
}
