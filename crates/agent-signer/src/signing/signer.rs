use crate::error::Result;

/// Trait for producing HTTP signature authentication headers.
///
/// Implementations are sync: every call may block on a key agent
/// round-trip. For async callers, use `spawn_blocking`.
pub trait RequestSigner: Send + Sync {
    /// Sign `date: <date_header>` and return the `Authorization` header value.
    fn sign(&self, date_header: &str) -> Result<String>;

    /// Sign arbitrary text. Returns `(signature, algorithm)`.
    fn sign_raw(&self, payload: &str) -> Result<(String, String)>;

    /// Canonical `SHA256:` fingerprint of the signing key.
    fn key_fingerprint(&self) -> &str;

    /// Algorithm label learned when the signer was built (e.g. "rsa-sha256").
    fn default_algorithm(&self) -> &str;
}
