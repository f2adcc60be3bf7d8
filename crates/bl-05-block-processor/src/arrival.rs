//! Recency tracking for network arrivals.
//!
//! A block that progressed is only worth an election, a re-flood and a
//! websocket notification if it arrived from the live network recently;
//! blocks replayed from the unchecked store hours later are not. The set
//! is bounded and evicts oldest-first.

use lru::LruCache;
use parking_lot::Mutex;
use shared_types::BlockHash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// How long an arrival counts as recent.
const ARRIVAL_WINDOW: Duration = Duration::from_secs(300);

/// Bounded memory for arrival timestamps.
const ARRIVAL_CAPACITY: usize = 65536;

pub struct BlockArrival {
    arrivals: Mutex<LruCache<BlockHash, Instant>>,
}

impl Default for BlockArrival {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockArrival {
    pub fn new() -> Self {
        Self {
            arrivals: Mutex::new(LruCache::new(
                NonZeroUsize::new(ARRIVAL_CAPACITY).expect("capacity is nonzero"),
            )),
        }
    }

    /// Records an arrival. Returns whether the hash was already recorded.
    pub fn add(&self, hash: BlockHash) -> bool {
        let mut arrivals = self.arrivals.lock();
        let existed = arrivals.contains(&hash);
        if !existed {
            arrivals.put(hash, Instant::now());
        }
        existed
    }

    /// Whether `hash` arrived within the recency window.
    pub fn recent(&self, hash: &BlockHash) -> bool {
        let mut arrivals = self.arrivals.lock();
        let fresh = match arrivals.peek(hash) {
            Some(when) => when.elapsed() < ARRIVAL_WINDOW,
            None => return false,
        };
        if !fresh {
            arrivals.pop(hash);
        }
        fresh
    }
}
