//! Signing string construction for blob redemption tokens.
//!
//! The signing string binds every field of the token payload:
//! ```text
//! token: <token uuid>
//! link: <link uuid>
//! script: <script uuid>
//! issued: <RFC 3339 timestamp>
//! ```
//! Components are newline-delimited with no trailing newline, so any
//! re-binding of the token to another link or script invalidates the
//! signature.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Build the signing string for a redemption token.
pub fn build_token_signing_string(
    token_id: Uuid,
    link_id: Uuid,
    script_id: Uuid,
    issued_at: DateTime<Utc>,
) -> String {
    format!(
        "token: {}\nlink: {}\nscript: {}\nissued: {}",
        token_id,
        link_id,
        script_id,
        issued_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
