//! Ed25519 signing and verification for redemption tokens.

use crate::ScriptGateError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::RwLock;

/// Cache for decoded verifying keys.
static KEY_CACHE: OnceCell<RwLock<HashMap<String, VerifyingKey>>> = OnceCell::new();

fn decode_hex32(hex_input: &str, what: &str) -> Result<[u8; 32], ScriptGateError> {
    let bytes = hex::decode(hex_input)
        .map_err(|e| ScriptGateError::ConfigError(format!("Invalid {} hex: {}", what, e)))?;
    bytes
        .try_into()
        .map_err(|_| ScriptGateError::ConfigError(format!("{} must be 32 bytes", what)))
}

/// Decode a hex-encoded Ed25519 signing seed into a keypair.
pub fn decode_signing_seed(hex_seed: &str) -> Result<SigningKey, ScriptGateError> {
    let seed = decode_hex32(hex_seed, "signing seed")?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Decode a hex-encoded Ed25519 public key, caching the result.
pub fn decode_public_key(hex_key: &str) -> Result<VerifyingKey, ScriptGateError> {
    let cache = KEY_CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    if let Ok(guard) = cache.read() {
        if let Some(key) = guard.get(hex_key) {
            return Ok(*key);
        }
    }

    let key_bytes = decode_hex32(hex_key, "public key")?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| ScriptGateError::ConfigError(format!("Invalid Ed25519 public key: {}", e)))?;

    // Best-effort insert; a poisoned lock only costs us the caching
    if let Ok(mut guard) = cache.write() {
        guard.insert(hex_key.to_string(), verifying_key);
    }

    Ok(verifying_key)
}

/// Sign a signing string and return the URL-safe base64 signature.
pub fn sign_ed25519(signing_string: &str, signing_key: &SigningKey) -> String {
    let signature = signing_key.sign(signing_string.as_bytes());
    URL_SAFE_NO_PAD.encode(signature.to_bytes())
}

/// Verify a URL-safe base64 Ed25519 signature against a signing string.
///
/// Every failure mode collapses to `TokenInvalid`: callers never learn
/// whether decoding or verification failed.
pub fn verify_ed25519(
    signature_b64: &str,
    signing_string: &str,
    verifying_key: &VerifyingKey,
) -> Result<(), ScriptGateError> {
    let sig_array: [u8; 64] = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| ScriptGateError::TokenInvalid)?
        .try_into()
        .map_err(|_| ScriptGateError::TokenInvalid)?;

    verifying_key
        .verify(
            signing_string.as_bytes(),
            &Signature::from_bytes(&sig_array),
        )
        .map_err(|_| ScriptGateError::TokenInvalid)
}
