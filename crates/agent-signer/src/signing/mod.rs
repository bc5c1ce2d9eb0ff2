mod agent_signer;
pub mod fingerprint;
mod header;
mod signature;
mod signer;

pub use agent_signer::{AgentSigner, PROBE_PAYLOAD};
pub use header::{AuthorizationHeader, DATE_HEADER, signing_string};
pub use signature::{CanonicalSignature, EcdsaCurve, RsaHash, SignatureFamily, normalize};
pub use signer::RequestSigner;
