pub mod agent;
pub mod config;
pub mod error;
pub mod signing;

pub use agent::{AgentClient, AgentKey, AgentSignature, KeyAgent, SignFlags};
pub use config::{AGENT_SOCKET_ENV, AgentConfig};
pub use error::{AgentError, Result, SignerError};
pub use signing::{AgentSigner, CanonicalSignature, RequestSigner, normalize};
