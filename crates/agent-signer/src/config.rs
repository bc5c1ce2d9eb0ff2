use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{Result, SignerError};

/// Environment variable naming the agent's Unix socket.
pub const AGENT_SOCKET_ENV: &str = "SSH_AUTH_SOCK";

/// Where to find the key agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub socket: PathBuf,
}

impl AgentConfig {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// Reads the socket path from `SSH_AUTH_SOCK`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied variable lookup.
    /// An unset or empty variable is a [`SignerError::Config`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Option<OsString>,
    {
        match lookup(AGENT_SOCKET_ENV) {
            Some(socket) if !socket.is_empty() => Ok(Self::new(socket)),
            _ => Err(SignerError::Config(AGENT_SOCKET_ENV)),
        }
    }
}
