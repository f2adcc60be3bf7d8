//! Outbound seams and read-only views consumed by the solicitor.

use shared_types::{Account, Block, Message};
use std::sync::Arc;

/// One peer channel able to carry a message. Implemented by the transport
/// layer; the solicitor only ever calls `send`.
pub trait MessageSink: Send + Sync {
    fn send(&self, message: &Message);
}

/// Network-wide flooding, implemented by the node's network layer.
pub trait FloodNetwork: Send + Sync {
    /// Sends `message` to a random subset of peers. `fanout` is the
    /// fraction of the peer set targeted; `include_local` also delivers to
    /// local observers (vote processing, websocket).
    fn flood_message(&self, message: &Message, include_local: bool, fanout: f32);
}

/// A representative with voting weight and a live channel.
#[derive(Clone)]
pub struct Representative {
    pub account: Account,
    pub channel: Arc<dyn MessageSink>,
}

impl Representative {
    pub fn new(account: Account, channel: Arc<dyn MessageSink>) -> Self {
        Self { account, channel }
    }
}

/// Read-only snapshot of an election, assembled by the election scheduler.
#[derive(Clone)]
pub struct ElectionView {
    pub winner: Arc<Block>,
    /// Accounts whose vote was already observed in this election.
    voted: Vec<Account>,
}

impl ElectionView {
    pub fn new(winner: Arc<Block>, voted: Vec<Account>) -> Self {
        Self { winner, voted }
    }

    pub fn has_voted(&self, account: &Account) -> bool {
        self.voted.contains(account)
    }
}
