//! Payloads exchanged during negotiation.
//!
//! Both the offer (server to client) and the response (client to server)
//! carry a [`ComponentPayload`]: the sender's canonical set tagged with the
//! protocol version. A frame is a 4-byte big-endian body length followed
//! by the JSON body.

use serde::{Deserialize, Serialize};

use crate::entry::{ComponentEntry, ComponentSet};
use crate::errors::{ModsyncError, Result};
use crate::merge::merge_entries;
use crate::PROTOCOL_VERSION;

/// Largest body accepted from a peer.
pub const MAX_PAYLOAD_LEN: usize = 1024 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPayload {
    pub protocol_version: u32,
    pub components: Vec<ComponentEntry>,
}

impl ComponentPayload {
    pub fn new(set: &ComponentSet) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            components: set.to_vec(),
        }
    }

    pub fn is_current_protocol(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }

    /// Canonical set of the sender. Duplicate identities in a payload are
    /// resolved the same way local sources are.
    pub fn into_set(self) -> ComponentSet {
        merge_entries(self.components)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(self)?;
        if body.len() > MAX_PAYLOAD_LEN {
            return Err(ModsyncError::Payload(format!(
                "payload of {} bytes exceeds limit of {}",
                body.len(),
                MAX_PAYLOAD_LEN
            )));
        }
        let header = (body.len() as u32).to_be_bytes();
        let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_LEN {
            return Err(ModsyncError::Payload(format!(
                "frame of {} bytes is shorter than its header",
                frame.len()
            )));
        }
        let (header, body) = frame.split_at(HEADER_LEN);
        let mut len = [0u8; HEADER_LEN];
        len.copy_from_slice(header);
        let len = u32::from_be_bytes(len) as usize;
        if len > MAX_PAYLOAD_LEN {
            return Err(ModsyncError::Payload(format!(
                "declared length {} exceeds limit of {}",
                len, MAX_PAYLOAD_LEN
            )));
        }
        if len != body.len() {
            return Err(ModsyncError::Payload(format!(
                "declared length {} but body has {} bytes",
                len,
                body.len()
            )));
        }
        Ok(serde_json::from_slice(body)?)
    }
}
