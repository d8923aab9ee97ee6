//! SHA-256 content digests.
//!
//! Every granted access carries the digest of the delivered bytes so a
//! consumer can verify download integrity out of band.

use sha2::{Digest, Sha256};

/// Compute the hex-encoded SHA-256 digest of script content.
pub fn content_digest_hex(content: &[u8]) -> String {
    let hash = Sha256::digest(content);
    hex::encode(hash)
}
