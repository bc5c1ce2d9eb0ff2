//! SSH agent access: the [`KeyAgent`] capability and its socket client.

mod client;
pub mod protocol;

use std::fmt;

pub use client::AgentClient;
use ssh_encoding::Decode;
use ssh_key::Algorithm;

use crate::error::AgentError;

/// Suffix OpenSSH appends to a key algorithm name for certificate identities.
const CERT_SUFFIX: &str = "-cert-v01@openssh.com";

/// The two operations the signer needs from a key agent.
///
/// Implementations block until the agent answers. Tests substitute scripted
/// implementations for the socket client.
pub trait KeyAgent: Send + Sync {
    /// Enumerate the public keys the agent holds.
    fn list(&self) -> Result<Vec<AgentKey>, AgentError>;

    /// Ask the agent to sign `data` with the private half of `key`.
    fn sign(&self, key: &AgentKey, data: &[u8], flags: SignFlags) -> Result<AgentSignature, AgentError>;
}

/// A public key as reported by the agent: its SSH wire encoding and comment.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentKey {
    blob: Vec<u8>,
    comment: String,
    algorithm: Option<Algorithm>,
}

impl AgentKey {
    pub fn new(blob: Vec<u8>, comment: String) -> Self {
        let algorithm = blob_algorithm(&blob);
        Self {
            blob,
            comment,
            algorithm,
        }
    }

    /// Canonical wire encoding; fingerprints are computed over these bytes.
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Key algorithm named by the blob's leading string. Certificate
    /// identities report the algorithm of the certified key.
    pub fn algorithm(&self) -> Option<&Algorithm> {
        self.algorithm.as_ref()
    }

    /// Flags to send with a sign request for this key. RSA keys ask for
    /// SHA-256 signatures instead of the legacy SHA-1 default.
    pub fn sign_flags(&self) -> SignFlags {
        match self.algorithm {
            Some(Algorithm::Rsa { .. }) => SignFlags::RSA_SHA2_256,
            _ => SignFlags::NONE,
        }
    }
}

fn blob_algorithm(mut blob: &[u8]) -> Option<Algorithm> {
    let name = String::decode(&mut blob).ok()?;
    let name = name.strip_suffix(CERT_SUFFIX).unwrap_or(&name);
    Algorithm::new(name).ok()
}

impl fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentKey")
            .field("algorithm", &self.algorithm.as_ref().map(Algorithm::as_str))
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

/// Raw signature reply: the format tag and the undecoded signature blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSignature {
    pub format: String,
    pub blob: Vec<u8>,
}

/// Sign request flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SignFlags(u32);

impl SignFlags {
    pub const NONE: Self = Self(0);
    pub const RSA_SHA2_256: Self = Self(2);
    pub const RSA_SHA2_512: Self = Self(4);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}
