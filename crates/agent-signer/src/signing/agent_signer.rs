use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::fingerprint;
use super::header::{AuthorizationHeader, DATE_HEADER, signing_string};
use super::signature::CanonicalSignature;
use super::signer::RequestSigner;
use crate::agent::{AgentKey, KeyAgent};
use crate::error::{Result, SignerError};
#[cfg(unix)]
use crate::{agent::AgentClient, config::AgentConfig};

/// Payload signed once at construction to learn the key's algorithm label.
pub const PROBE_PAYLOAD: &str = "HelloWorld";

/// Request signer backed by a key held in an SSH agent.
///
/// Built once per account and key; every signing call is a blocking round-trip
/// to the agent. Construction either fully succeeds (connection, key lookup,
/// probe signature) or returns an error.
pub struct AgentSigner {
    key_fingerprint: String,
    formatted_key_fingerprint: String,
    account_name: String,
    key_id: String,
    algorithm: String,
    key: AgentKey,
    agent: Arc<dyn KeyAgent>,
}

impl AgentSigner {
    /// Connects to the agent named by `SSH_AUTH_SOCK` and selects the key
    /// matching `key_fingerprint`.
    #[cfg(unix)]
    pub fn new(key_fingerprint: &str, account_name: &str) -> Result<Self> {
        let config = AgentConfig::from_env()?;
        Self::with_config(&config, key_fingerprint, account_name)
    }

    #[cfg(unix)]
    pub fn with_config(config: &AgentConfig, key_fingerprint: &str, account_name: &str) -> Result<Self> {
        let client = AgentClient::connect(config)?;
        Self::with_agent(Arc::new(client), key_fingerprint, account_name)
    }

    /// Builds a signer over any [`KeyAgent`].
    #[instrument(level = "debug", skip(agent))]
    pub fn with_agent(agent: Arc<dyn KeyAgent>, key_fingerprint: &str, account_name: &str) -> Result<Self> {
        let keys = agent.list().map_err(SignerError::AgentList)?;
        let key = fingerprint::match_key(keys, key_fingerprint)?;
        let formatted_key_fingerprint = fingerprint::format_sha256(key.blob());
        let key_id = format!("/{account_name}/keys/{formatted_key_fingerprint}");

        let probe = request_signature(agent.as_ref(), &key, PROBE_PAYLOAD.as_bytes(), "probe payload")
            .inspect_err(|e| warn!(error = %e, "cannot sign using SSH agent"))?;
        let algorithm = probe.signature_type();
        debug!(key_id = %key_id, algorithm = %algorithm, "SSH agent signer ready");

        Ok(Self {
            key_fingerprint: key_fingerprint.to_owned(),
            formatted_key_fingerprint,
            account_name: account_name.to_owned(),
            key_id,
            algorithm,
            key,
            agent,
        })
    }

    /// Lists the agent's keys again and returns the one matching the
    /// fingerprint this signer was built with.
    pub fn match_key(&self) -> Result<AgentKey> {
        let keys = self.agent.list().map_err(SignerError::AgentList)?;
        fingerprint::match_key(keys, &self.key_fingerprint)
    }

    /// `/<account>/keys/<fingerprint>`
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn account(&self) -> &str {
        &self.account_name
    }

    pub fn key(&self) -> &AgentKey {
        &self.key
    }

    fn sign_bytes(&self, data: &[u8], operation: &'static str) -> Result<CanonicalSignature> {
        request_signature(self.agent.as_ref(), &self.key, data, operation)
    }
}

impl RequestSigner for AgentSigner {
    fn sign(&self, date_header: &str) -> Result<String> {
        let signature = self.sign_bytes(signing_string(date_header).as_bytes(), "date header")?;
        Ok(AuthorizationHeader {
            key_id: &self.key_id,
            algorithm: &signature.signature_type(),
            headers: DATE_HEADER,
            signature: &signature.to_text(),
        }
        .to_string())
    }

    fn sign_raw(&self, payload: &str) -> Result<(String, String)> {
        let signature = self.sign_bytes(payload.as_bytes(), "string")?;
        Ok((signature.to_text(), signature.signature_type()))
    }

    fn key_fingerprint(&self) -> &str {
        &self.formatted_key_fingerprint
    }

    fn default_algorithm(&self) -> &str {
        &self.algorithm
    }
}

impl fmt::Debug for AgentSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSigner")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn request_signature(
    agent: &dyn KeyAgent,
    key: &AgentKey,
    data: &[u8],
    operation: &'static str,
) -> Result<CanonicalSignature> {
    let signature = agent
        .sign(key, data, key.sign_flags())
        .map_err(|source| SignerError::Signing { operation, source })?;
    CanonicalSignature::decode(&signature)
}
