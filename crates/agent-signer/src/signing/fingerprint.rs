//! Key fingerprints and fingerprint-based key selection.
//!
//! Targets may be given as MD5 hex (`MD5:`-prefixed or bare, with or
//! without colons) or as SHA-256 base64 (`SHA256:`-prefixed, with or
//! without colons). Both digests are computed for every candidate.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::agent::AgentKey;
use crate::error::{Result, SignerError};

pub const MD5_PREFIX: &str = "MD5:";
pub const SHA256_PREFIX: &str = "SHA256:";

/// Strips a leading `MD5:` then a leading `SHA256:` prefix and removes every colon.
pub fn normalize(fingerprint: &str) -> String {
    let stripped = fingerprint.strip_prefix(MD5_PREFIX).unwrap_or(fingerprint);
    let stripped = stripped.strip_prefix(SHA256_PREFIX).unwrap_or(stripped);
    stripped.replace(':', "")
}

/// Lowercase hex MD5 of the key blob.
pub fn md5_hex(blob: &[u8]) -> String {
    hex::encode(md5::compute(blob).0)
}

/// Unpadded standard base64 SHA-256 of the key blob.
pub fn sha256_base64(blob: &[u8]) -> String {
    STANDARD_NO_PAD.encode(Sha256::digest(blob))
}

/// `SHA256:` followed by the base64 digest with a colon between every pair of characters.
pub fn format_sha256(blob: &[u8]) -> String {
    let digest = sha256_base64(blob);
    let mut formatted = String::with_capacity(SHA256_PREFIX.len() + digest.len() * 3 / 2);
    formatted.push_str(SHA256_PREFIX);
    for (i, c) in digest.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            formatted.push(':');
        }
        formatted.push(c);
    }
    formatted
}

/// True if `normalized` equals either digest of `key`.
pub fn matches(key: &AgentKey, normalized: &str) -> bool {
    md5_hex(key.blob()) == normalized || sha256_base64(key.blob()) == normalized
}

/// Picks the key whose MD5 or SHA-256 fingerprint equals `target`.
///
/// The whole list is scanned and the last match wins; well-formed
/// fingerprints never match more than one key.
pub fn match_key(keys: Vec<AgentKey>, target: &str) -> Result<AgentKey> {
    let normalized = normalize(target);
    let mut matched = None;
    let mut match_count = 0usize;

    for key in keys {
        if matches(&key, &normalized) {
            match_count += 1;
            matched = Some(key);
        }
    }

    if match_count > 1 {
        warn!(fingerprint = target, match_count, "several agent keys match; using the last one");
    }

    let key = matched.ok_or_else(|| SignerError::KeyNotFound(target.to_owned()))?;
    debug!(fingerprint = target, key = ?key, "matched agent key");
    Ok(key)
}
