//! Recording fakes for the object-safe ports.
//!
//! Each fake captures the calls it receives so tests can assert on the
//! processor's outward behavior without a running node around it.

use crate::ports::{
    ActiveElections, BootstrapInitiator, ForkHandler, GapCache, Network, StatCategory, StatDetail,
    Stats, VotesCache, WebsocketSink, WebsocketTopic, WorkWatcher, WorkerPool,
};
use bl_02_transport::DropPolicy;
use parking_lot::Mutex;
use shared_types::{Amount, Block, BlockHash, QualifiedRoot};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Election container fake: remembers inserts and erasures by root.
#[derive(Default)]
pub struct RecordingElections {
    pub inserted: Mutex<Vec<(BlockHash, Amount)>>,
    pub erased: Mutex<Vec<BlockHash>>,
    pub roots: Mutex<HashSet<QualifiedRoot>>,
    /// Elections that `restart` should claim to have restarted.
    pub restartable: Mutex<HashSet<BlockHash>>,
}

impl ActiveElections for RecordingElections {
    fn insert(&self, block: Arc<Block>, previous_balance: Amount) -> bool {
        let fresh = self.roots.lock().insert(block.qualified_root());
        self.inserted.lock().push((block.hash(), previous_balance));
        fresh
    }

    fn erase(&self, block: &Block) {
        self.roots.lock().remove(&block.qualified_root());
        self.erased.lock().push(block.hash());
    }

    fn update_difficulty(&self, block: &Block) -> bool {
        self.roots.lock().contains(&block.qualified_root())
    }

    fn restart(&self, block: &Arc<Block>) -> bool {
        self.restartable.lock().contains(&block.hash())
    }

    fn contains(&self, root: &QualifiedRoot) -> bool {
        self.roots.lock().contains(root)
    }
}

#[derive(Default)]
pub struct RecordingForkHandler {
    pub forks: Mutex<Vec<BlockHash>>,
}

impl ForkHandler for RecordingForkHandler {
    fn process_fork(&self, block: Arc<Block>) {
        self.forks.lock().push(block.hash());
    }
}

#[derive(Default)]
pub struct RecordingNetwork {
    pub initial_floods: Mutex<Vec<BlockHash>>,
    pub floods: Mutex<Vec<(BlockHash, DropPolicy)>>,
}

impl Network for RecordingNetwork {
    fn flood_block_initial(&self, block: Arc<Block>) {
        self.initial_floods.lock().push(block.hash());
    }

    fn flood_block(&self, block: Arc<Block>, policy: DropPolicy) {
        self.floods.lock().push((block.hash(), policy));
    }
}

#[derive(Default)]
pub struct RecordingGapCache {
    pub hashes: Mutex<HashSet<BlockHash>>,
}

impl RecordingGapCache {
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.hashes.lock().contains(hash)
    }
}

impl GapCache for RecordingGapCache {
    fn add(&self, hash: BlockHash) {
        self.hashes.lock().insert(hash);
    }

    fn erase(&self, hash: &BlockHash) {
        self.hashes.lock().remove(hash);
    }
}

#[derive(Default)]
pub struct RecordingBootstrap {
    pub requeued: Mutex<Vec<(BlockHash, BlockHash, bool)>>,
}

impl BootstrapInitiator for RecordingBootstrap {
    fn lazy_requeue(&self, hash: &BlockHash, previous: &BlockHash, confirmed: bool) {
        self.requeued.lock().push((*hash, *previous, confirmed));
    }
}

/// Stats sink counting increments per (category, detail).
#[derive(Default)]
pub struct CounterStats {
    counters: Mutex<HashMap<(StatCategory, StatDetail), u64>>,
}

impl CounterStats {
    pub fn count(&self, category: StatCategory, detail: StatDetail) -> u64 {
        self.counters
            .lock()
            .get(&(category, detail))
            .copied()
            .unwrap_or_default()
    }
}

impl Stats for CounterStats {
    fn inc(&self, category: StatCategory, detail: StatDetail) {
        *self.counters.lock().entry((category, detail)).or_default() += 1;
    }
}

#[derive(Default)]
pub struct RecordingWebsocket {
    pub subscribed: Mutex<bool>,
    pub broadcasts: Mutex<Vec<BlockHash>>,
}

impl WebsocketSink for RecordingWebsocket {
    fn any_subscriber(&self, _topic: WebsocketTopic) -> bool {
        *self.subscribed.lock()
    }

    fn broadcast_block(&self, block: &Block) {
        self.broadcasts.lock().push(block.hash());
    }
}

#[derive(Default)]
pub struct RecordingWatcher {
    pub watched: Mutex<HashSet<BlockHash>>,
}

impl WorkWatcher for RecordingWatcher {
    fn add(&self, block: Arc<Block>) {
        self.watched.lock().insert(block.hash());
    }

    fn remove(&self, block: &Block) {
        self.watched.lock().remove(&block.hash());
    }
}

#[derive(Default)]
pub struct RecordingVotesCache {
    pub cached: Mutex<HashSet<BlockHash>>,
    pub removed: Mutex<Vec<BlockHash>>,
}

impl VotesCache for RecordingVotesCache {
    fn remove(&self, hash: &BlockHash) {
        self.cached.lock().remove(hash);
        self.removed.lock().push(*hash);
    }
}

/// Executes post-events synchronously on the caller's thread. Post-events
/// are dispatched after the transaction commits, so inline execution
/// preserves ordering while keeping tests deterministic.
#[derive(Default)]
pub struct InlineWorker;

impl WorkerPool for InlineWorker {
    fn push_task(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}
