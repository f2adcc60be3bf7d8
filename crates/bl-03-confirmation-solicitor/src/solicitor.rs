//! The solicitor state machine.

use crate::ports::{ElectionView, FloodNetwork, MessageSink, Representative};
use shared_types::{BlockHash, Message, Root, CONFIRM_REQ_HASHES_MAX};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolicitorError {
    #[error("solicitor is not prepared")]
    NotPrepared,
    #[error("solicitor is already prepared")]
    AlreadyPrepared,
    #[error("winner broadcast cap reached for this cycle")]
    BroadcastCapped,
    #[error("no representative was addable for this election")]
    NoRepresentatives,
}

#[derive(Clone, Copy, Debug)]
pub struct SolicitorConfig {
    /// Cap on confirm-req batches queued per channel per cycle.
    pub max_confirm_req_batches: usize,
    /// Cap on winner publishes per cycle.
    pub max_block_broadcasts: usize,
    /// Representatives addressed per election.
    pub max_representatives: usize,
    /// Fraction of the random peer set used when flooding winners.
    pub flood_fanout: f32,
}

impl SolicitorConfig {
    pub fn mainnet() -> Self {
        Self {
            max_confirm_req_batches: 20,
            max_block_broadcasts: 30,
            max_representatives: 30,
            flood_fanout: 0.5,
        }
    }

    pub fn test() -> Self {
        Self {
            max_confirm_req_batches: 1,
            max_block_broadcasts: 4,
            max_representatives: 30,
            flood_fanout: 0.5,
        }
    }
}

/// Accumulates confirm-req traffic for one solicitation cycle and sends it
/// out batched on `flush`.
pub struct ConfirmationSolicitor {
    config: SolicitorConfig,
    network: Arc<dyn FloodNetwork>,
    prepared: bool,
    representatives: Vec<Representative>,
    rebroadcasted: usize,
    /// Pending `(hash, root)` pairs per channel, in representative order.
    requests: Vec<(Arc<dyn MessageSink>, Vec<(BlockHash, Root)>)>,
}

impl ConfirmationSolicitor {
    pub fn new(network: Arc<dyn FloodNetwork>, config: SolicitorConfig) -> Self {
        Self {
            config,
            network,
            prepared: false,
            representatives: Vec::new(),
            rebroadcasted: 0,
            requests: Vec::new(),
        }
    }

    /// Opens a cycle with the current representative set.
    pub fn prepare(&mut self, representatives: Vec<Representative>) -> Result<(), SolicitorError> {
        debug_assert!(!self.prepared);
        if self.prepared {
            return Err(SolicitorError::AlreadyPrepared);
        }
        self.requests.clear();
        self.rebroadcasted = 0;
        self.representatives = representatives;
        self.prepared = true;
        Ok(())
    }

    /// Publishes the election winner directly to non-voting representatives
    /// and floods it to a random peer subset. Errors once the per-cycle
    /// broadcast cap is reached.
    pub fn broadcast(&mut self, election: &ElectionView) -> Result<(), SolicitorError> {
        debug_assert!(self.prepared);
        if !self.prepared {
            return Err(SolicitorError::NotPrepared);
        }
        self.rebroadcasted += 1;
        if self.rebroadcasted > self.config.max_block_broadcasts {
            return Err(SolicitorError::BroadcastCapped);
        }
        let message = Message::Publish((*election.winner).clone());
        let mut count = 0;
        // Directed broadcasting to get confirmations
        for representative in &self.representatives {
            if count >= self.config.max_representatives {
                break;
            }
            if !election.has_voted(&representative.account) {
                representative.channel.send(&message);
                count += 1;
            }
        }
        // Random flood for block propagation
        self.network
            .flood_message(&message, true, self.config.flood_fanout);
        Ok(())
    }

    /// Queues a confirm-req for the election's winner towards every
    /// non-voting representative, honoring the per-channel cap. Errors when
    /// no representative could be addressed.
    pub fn add(&mut self, election: &ElectionView) -> Result<(), SolicitorError> {
        debug_assert!(self.prepared);
        if !self.prepared {
            return Err(SolicitorError::NotPrepared);
        }
        let max_channel_requests = self.config.max_confirm_req_batches * CONFIRM_REQ_HASHES_MAX;
        let winner_hash = election.winner.hash();
        let winner_root = election.winner.root();
        let mut count = 0;
        for representative in self.representatives.clone() {
            if count >= self.config.max_representatives {
                break;
            }
            if election.has_voted(&representative.account) {
                continue;
            }
            let queue = self.channel_queue(&representative.channel);
            if queue.len() < max_channel_requests {
                queue.push((winner_hash, winner_root));
                count += 1;
            }
        }
        if count == 0 {
            return Err(SolicitorError::NoRepresentatives);
        }
        trace!(%winner_hash, representatives = count, "queued confirm requests");
        Ok(())
    }

    /// Sends all queued requests in batches and closes the cycle.
    pub fn flush(&mut self) -> Result<(), SolicitorError> {
        debug_assert!(self.prepared);
        if !self.prepared {
            return Err(SolicitorError::NotPrepared);
        }
        for (channel, pairs) in self.requests.drain(..) {
            for batch in pairs.chunks(CONFIRM_REQ_HASHES_MAX) {
                channel.send(&Message::ConfirmReq(batch.to_vec()));
            }
        }
        self.representatives.clear();
        self.prepared = false;
        Ok(())
    }

    fn channel_queue(&mut self, channel: &Arc<dyn MessageSink>) -> &mut Vec<(BlockHash, Root)> {
        if let Some(position) = self
            .requests
            .iter()
            .position(|(existing, _)| Arc::ptr_eq(existing, channel))
        {
            &mut self.requests[position].1
        } else {
            self.requests.push((channel.clone(), Vec::new()));
            &mut self.requests.last_mut().expect("just pushed").1
        }
    }
}
