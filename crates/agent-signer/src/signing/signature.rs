//! Normalization of agent signature replies.
//!
//! The agent answers every sign request with a format tag and a blob whose
//! layout depends on the key algorithm: RSA blobs are the raw PKCS#1 v1.5
//! signature, ECDSA blobs are an SSH-encoded `(r, s)` pair. Both become a
//! [`CanonicalSignature`] rendered as base64 text plus an HTTP signature
//! algorithm label.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ssh_encoding::{Decode, Reader};
use ssh_key::Mpint;

use crate::agent::AgentSignature;
use crate::error::{Result, SignerError};

/// Hash used by an RSA signature, from the agent's format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaHash {
    Sha1,
    Sha256,
    Sha512,
}

impl RsaHash {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

/// NIST curves an SSH agent can sign with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaCurve {
    NistP256,
    NistP384,
    NistP521,
}

impl EcdsaCurve {
    /// Width of a scalar in bytes.
    pub const fn field_size(self) -> usize {
        match self {
            Self::NistP256 => 32,
            Self::NistP384 => 48,
            Self::NistP521 => 66,
        }
    }

    /// Hash paired with the curve by RFC 5656.
    pub const fn hash_name(self) -> &'static str {
        match self {
            Self::NistP256 => "sha256",
            Self::NistP384 => "sha384",
            Self::NistP521 => "sha512",
        }
    }
}

impl fmt::Display for EcdsaCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NistP256 => "nistp256",
            Self::NistP384 => "nistp384",
            Self::NistP521 => "nistp521",
        })
    }
}

/// Key-type family selected by the agent's format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFamily {
    Rsa(RsaHash),
    Ecdsa(EcdsaCurve),
}

impl SignatureFamily {
    pub fn from_format(format: &str) -> Result<Self> {
        Ok(match format {
            "ssh-rsa" => Self::Rsa(RsaHash::Sha1),
            "rsa-sha2-256" => Self::Rsa(RsaHash::Sha256),
            "rsa-sha2-512" => Self::Rsa(RsaHash::Sha512),
            "ecdsa-sha2-nistp256" => Self::Ecdsa(EcdsaCurve::NistP256),
            "ecdsa-sha2-nistp384" => Self::Ecdsa(EcdsaCurve::NistP384),
            "ecdsa-sha2-nistp521" => Self::Ecdsa(EcdsaCurve::NistP521),
            other => return Err(SignerError::UnsupportedAlgorithm(other.to_owned())),
        })
    }
}

/// A decoded signature in the form the HTTP signature header carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalSignature {
    Rsa { hash: RsaHash, signature: Vec<u8> },
    /// `der` is the ASN.1 `SEQUENCE { INTEGER r, INTEGER s }` encoding.
    Ecdsa { curve: EcdsaCurve, der: Vec<u8> },
}

impl CanonicalSignature {
    pub fn decode(signature: &AgentSignature) -> Result<Self> {
        let decode_error = |reason: String| SignerError::SignatureDecode {
            format: signature.format.clone(),
            reason,
        };

        match SignatureFamily::from_format(&signature.format)? {
            SignatureFamily::Rsa(hash) => {
                if signature.blob.is_empty() {
                    return Err(decode_error("empty RSA signature".into()));
                }
                Ok(Self::Rsa {
                    hash,
                    signature: signature.blob.clone(),
                })
            }
            SignatureFamily::Ecdsa(curve) => {
                let der = ecdsa_der(curve, &signature.blob).map_err(decode_error)?;
                Ok(Self::Ecdsa { curve, der })
            }
        }
    }

    /// Algorithm label for the `algorithm` header field, e.g. `rsa-sha256`.
    pub fn signature_type(&self) -> String {
        match self {
            Self::Rsa { hash, .. } => format!("rsa-{}", hash.name()),
            Self::Ecdsa { curve, .. } => format!("ecdsa-{}", curve.hash_name()),
        }
    }

    /// Standard padded base64 of the signature bytes.
    pub fn to_text(&self) -> String {
        match self {
            Self::Rsa { signature, .. } => STANDARD.encode(signature),
            Self::Ecdsa { der, .. } => STANDARD.encode(der),
        }
    }
}

impl fmt::Display for CanonicalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Decodes an agent reply into `(text, algorithm)`.
pub fn normalize(format: &str, blob: &[u8]) -> Result<(String, String)> {
    let signature = CanonicalSignature::decode(&AgentSignature {
        format: format.to_owned(),
        blob: blob.to_vec(),
    })?;
    Ok((signature.to_text(), signature.signature_type()))
}

fn ecdsa_der(curve: EcdsaCurve, mut blob: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let r = Mpint::decode(&mut blob).map_err(|e| format!("reading r: {e}"))?;
    let s = Mpint::decode(&mut blob).map_err(|e| format!("reading s: {e}"))?;
    blob.finish(()).map_err(|e| format!("after (r, s): {e}"))?;

    let r = scalar(&r, curve).ok_or_else(|| format!("r is not a positive integer within {curve}"))?;
    let s = scalar(&s, curve).ok_or_else(|| format!("s is not a positive integer within {curve}"))?;

    let der = match curve {
        EcdsaCurve::NistP256 => p256::ecdsa::Signature::from_scalars(
            p256::FieldBytes::clone_from_slice(&r),
            p256::FieldBytes::clone_from_slice(&s),
        )
        .map(|sig| sig.to_der().as_bytes().to_vec()),
        EcdsaCurve::NistP384 => p384::ecdsa::Signature::from_scalars(
            p384::FieldBytes::clone_from_slice(&r),
            p384::FieldBytes::clone_from_slice(&s),
        )
        .map(|sig| sig.to_der().as_bytes().to_vec()),
        EcdsaCurve::NistP521 => p521::ecdsa::Signature::from_scalars(
            p521::FieldBytes::clone_from_slice(&r),
            p521::FieldBytes::clone_from_slice(&s),
        )
        .map(|sig| sig.to_der().as_bytes().to_vec()),
    };
    der.map_err(|e| format!("invalid {curve} scalars: {e}"))
}

/// Big-endian magnitude of a positive `mpint`, left-padded to the curve's field size.
fn scalar(mpint: &Mpint, curve: EcdsaCurve) -> Option<Vec<u8>> {
    let magnitude = mpint.as_positive_bytes()?;
    let pad = curve.field_size().checked_sub(magnitude.len())?;
    let mut padded = vec![0u8; pad];
    padded.extend_from_slice(magnitude);
    Some(padded)
}
