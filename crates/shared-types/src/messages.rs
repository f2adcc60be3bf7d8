//! Wire messages exchanged between nodes.
//!
//! Only the message bodies are modeled here; framing, headers and the
//! transport itself belong to the network layer. The duplicate filter
//! operates over the canonical byte encoding produced by [`Message::to_bytes`].

use crate::block::Block;
use crate::entities::{Account, BlockHash, Root};
use crate::errors::MessageError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Maximum number of `(hash, root)` pairs carried by one confirm-req.
pub const CONFIRM_REQ_HASHES_MAX: usize = 7;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Message {
    /// Announces a block to the network.
    Publish(Block),
    /// Requests votes for the given roots from a representative.
    ConfirmReq(Vec<(BlockHash, Root)>),
    /// A representative's vote on a set of block hashes.
    ConfirmAck { account: Account, hashes: Vec<BlockHash> },
    /// Liveness probe carrying a sample of known peers.
    Keepalive { peers: Vec<SocketAddr> },
}

impl Message {
    /// Canonical byte encoding of the message body.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Serialization of these enums cannot fail
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(|source| MessageError::Malformed {
            len: bytes.len(),
            source,
        })
    }
}
