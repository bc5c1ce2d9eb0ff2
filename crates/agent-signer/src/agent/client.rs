use std::fmt;
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::protocol::{AgentRequest, AgentResponse, read_frame, write_frame};
use super::{AgentKey, AgentSignature, KeyAgent, SignFlags};
use crate::error::AgentError;
#[cfg(unix)]
use crate::{config::AgentConfig, error::SignerError};

/// Blocking SSH agent client over a single stream.
///
/// Every request holds the stream lock for its whole write-then-read
/// round-trip, so concurrent callers never interleave frames. Once an
/// exchange fails part way (an I/O error such as a read timeout, or a bad
/// frame header) a late reply may still be in flight, so the client refuses
/// all further requests with [`AgentError::Desynchronized`].
pub struct AgentClient<S> {
    conn: Mutex<Connection<S>>,
}

struct Connection<S> {
    stream: S,
    desynchronized: bool,
}

#[cfg(unix)]
impl AgentClient<UnixStream> {
    /// Dials the agent socket named by `config`.
    pub fn connect(config: &AgentConfig) -> Result<Self, SignerError> {
        let stream = UnixStream::connect(&config.socket).map_err(|source| SignerError::Connection {
            path: config.socket.clone(),
            source,
        })?;
        debug!(socket = %config.socket.display(), "connected to SSH agent");
        Ok(Self::from_stream(stream))
    }
}

impl<S: Read + Write> AgentClient<S> {
    /// Wraps an already-connected stream, e.g. one with read/write timeouts set.
    pub fn from_stream(stream: S) -> Self {
        Self {
            conn: Mutex::new(Connection {
                stream,
                desynchronized: false,
            }),
        }
    }

    pub fn into_inner(self) -> S {
        self.conn.into_inner().stream
    }

    /// False once an exchange has failed and the stream can no longer be trusted.
    pub fn is_usable(&self) -> bool {
        !self.conn.lock().desynchronized
    }

    fn request(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let frame = request.encode()?;

        let mut conn = self.conn.lock();
        if conn.desynchronized {
            return Err(AgentError::Desynchronized);
        }
        let reply = conn.exchange(&frame);
        drop(conn);

        match AgentResponse::decode(&reply?)? {
            AgentResponse::Failure => Err(AgentError::Failure),
            response => Ok(response),
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// One write-then-read round-trip.
    fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>, AgentError> {
        if let Err(e) = write_frame(&mut self.stream, frame) {
            // Oversized frames are rejected before anything is written.
            if !matches!(e, AgentError::FrameTooLarge(_)) {
                self.mark_desynchronized(&e);
            }
            return Err(e);
        }
        read_frame(&mut self.stream).inspect_err(|e| self.mark_desynchronized(e))
    }

    fn mark_desynchronized(&mut self, error: &AgentError) {
        warn!(error = %error, "SSH agent exchange failed; connection is no longer usable");
        self.desynchronized = true;
    }
}

impl<S: Read + Write + Send> KeyAgent for AgentClient<S> {
    fn list(&self) -> Result<Vec<AgentKey>, AgentError> {
        match self.request(&AgentRequest::RequestIdentities)? {
            AgentResponse::IdentitiesAnswer(keys) => {
                debug!(count = keys.len(), "listed agent keys");
                Ok(keys)
            }
            other => Err(AgentError::UnexpectedMessage(other.message_type())),
        }
    }

    fn sign(&self, key: &AgentKey, data: &[u8], flags: SignFlags) -> Result<AgentSignature, AgentError> {
        let request = AgentRequest::SignRequest {
            key_blob: key.blob().to_vec(),
            data: data.to_vec(),
            flags,
        };
        match self.request(&request)? {
            AgentResponse::SignResponse(signature) => Ok(signature),
            other => Err(AgentError::UnexpectedMessage(other.message_type())),
        }
    }
}

impl<S> fmt::Debug for AgentClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentClient").finish_non_exhaustive()
    }
}
