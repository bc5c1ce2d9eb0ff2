use std::io::{Read, Write};

use ssh_encoding::{Decode, Encode, Reader};
use tracing::trace;

use super::{AgentKey, AgentSignature, SignFlags};
use crate::error::AgentError;

/// Largest frame accepted from the agent (matches OpenSSH's limit).
pub const MAX_FRAME_SIZE: u32 = 256 * 1024;

pub const SSH_AGENT_FAILURE: u8 = 5;
pub const SSH_AGENT_SUCCESS: u8 = 6;
pub const SSH_AGENTC_REQUEST_IDENTITIES: u8 = 11;
pub const SSH_AGENT_IDENTITIES_ANSWER: u8 = 12;
pub const SSH_AGENTC_SIGN_REQUEST: u8 = 13;
pub const SSH_AGENT_SIGN_RESPONSE: u8 = 14;
pub const SSH2_AGENT_FAILURE: u8 = 30;
pub const SSH_COM_AGENT2_FAILURE: u8 = 102;

/// Client → agent messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRequest {
    RequestIdentities,
    SignRequest {
        key_blob: Vec<u8>,
        data: Vec<u8>,
        flags: SignFlags,
    },
}

/// Agent → client messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    Failure,
    Success,
    IdentitiesAnswer(Vec<AgentKey>),
    SignResponse(AgentSignature),
}

impl AgentRequest {
    pub fn message_type(&self) -> u8 {
        match self {
            Self::RequestIdentities => SSH_AGENTC_REQUEST_IDENTITIES,
            Self::SignRequest { .. } => SSH_AGENTC_SIGN_REQUEST,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, AgentError> {
        let mut buf = vec![self.message_type()];
        if let Self::SignRequest {
            key_blob,
            data,
            flags,
        } = self
        {
            key_blob.as_slice().encode(&mut buf)?;
            data.as_slice().encode(&mut buf)?;
            flags.bits().encode(&mut buf)?;
        }
        Ok(buf)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, AgentError> {
        let (&message_type, mut body) = frame.split_first().ok_or(AgentError::EmptyFrame)?;
        let request = match message_type {
            SSH_AGENTC_REQUEST_IDENTITIES => Self::RequestIdentities,
            SSH_AGENTC_SIGN_REQUEST => Self::SignRequest {
                key_blob: Vec::<u8>::decode(&mut body)?,
                data: Vec::<u8>::decode(&mut body)?,
                flags: SignFlags::from_bits(u32::decode(&mut body)?),
            },
            other => return Err(AgentError::UnexpectedMessage(other)),
        };
        Ok(body.finish(request)?)
    }
}

impl AgentResponse {
    pub fn message_type(&self) -> u8 {
        match self {
            Self::Failure => SSH_AGENT_FAILURE,
            Self::Success => SSH_AGENT_SUCCESS,
            Self::IdentitiesAnswer(_) => SSH_AGENT_IDENTITIES_ANSWER,
            Self::SignResponse(_) => SSH_AGENT_SIGN_RESPONSE,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, AgentError> {
        let mut buf = vec![self.message_type()];
        match self {
            Self::Failure | Self::Success => {}
            Self::IdentitiesAnswer(keys) => {
                let count = u32::try_from(keys.len()).map_err(|_| ssh_encoding::Error::Length)?;
                count.encode(&mut buf)?;
                for key in keys {
                    key.blob().encode(&mut buf)?;
                    key.comment().as_bytes().encode(&mut buf)?;
                }
            }
            Self::SignResponse(signature) => {
                let mut inner = Vec::new();
                signature.format.as_bytes().encode(&mut inner)?;
                signature.blob.as_slice().encode(&mut inner)?;
                inner.as_slice().encode(&mut buf)?;
            }
        }
        Ok(buf)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, AgentError> {
        let (&message_type, mut body) = frame.split_first().ok_or(AgentError::EmptyFrame)?;
        let response = match message_type {
            SSH_AGENT_FAILURE | SSH2_AGENT_FAILURE | SSH_COM_AGENT2_FAILURE => {
                return Ok(Self::Failure);
            }
            SSH_AGENT_SUCCESS => Self::Success,
            SSH_AGENT_IDENTITIES_ANSWER => {
                let count = u32::decode(&mut body)?;
                // Each entry takes at least 8 bytes; cap the preallocation by what the frame can hold.
                let mut keys = Vec::with_capacity((count as usize).min(body.remaining_len() / 8));
                for _ in 0..count {
                    let blob = Vec::<u8>::decode(&mut body)?;
                    let comment = String::from_utf8_lossy(&Vec::<u8>::decode(&mut body)?).into_owned();
                    keys.push(AgentKey::new(blob, comment));
                }
                Self::IdentitiesAnswer(keys)
            }
            SSH_AGENT_SIGN_RESPONSE => {
                let inner = Vec::<u8>::decode(&mut body)?;
                let mut signature = inner.as_slice();
                let format = String::decode(&mut signature)?;
                let blob = Vec::<u8>::decode(&mut signature)?;
                signature.finish(Self::SignResponse(AgentSignature { format, blob }))?
            }
            other => return Err(AgentError::UnexpectedMessage(other)),
        };
        Ok(body.finish(response)?)
    }
}

/// Write a length-prefixed frame.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), AgentError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or(AgentError::FrameTooLarge(payload.len().min(u32::MAX as usize) as u32))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    trace!(message_type = payload.first().copied(), len, "wrote agent frame");
    Ok(())
}

/// Read a length-prefixed frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, AgentError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);

    if len > MAX_FRAME_SIZE {
        return Err(AgentError::FrameTooLarge(len));
    }
    if len == 0 {
        return Err(AgentError::EmptyFrame);
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    trace!(message_type = payload[0], len, "read agent frame");
    Ok(payload)
}
