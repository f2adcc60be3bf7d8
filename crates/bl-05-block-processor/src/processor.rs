//! The block processor service.
//!
//! All ledger mutation funnels through here. The processor owns one loop
//! thread which drains its queues in batches; each batch runs under the
//! process-wide write token and a single write transaction, so every
//! `process_one` observes the effects of all earlier ones in the batch.
//! Side effects that must not run inside the transaction (elections,
//! floods, websocket broadcasts, gap-cache updates) are accumulated as
//! post-events and dispatched on the worker pool after commit.

use crate::arrival::BlockArrival;
use crate::config::ProcessorConfig;
use crate::ports::{
    Ledger, NodePorts, StatCategory, StatDetail, Store, WebsocketTopic, PROCESSOR_READ_TABLES,
    PROCESSOR_WRITE_TABLES,
};
use crate::verification::SignatureVerifier;
use crate::write_queue::{WriteQueue, Writer};
use bl_02_transport::DropPolicy;
use parking_lot::{Condvar, Mutex};
use shared_types::{
    seconds_since_epoch, work, Account, Block, BlockHash, BlockType, Epochs, ProcessCode,
    ProcessResult, UncheckedInfo, UncheckedKey, VerifyStatus,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Where a candidate block came from, deciding its re-flood treatment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockOrigin {
    Local,
    Remote,
}

/// Queue-depth snapshot for diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct ProcessorInfo {
    pub blocks: usize,
    pub forced: usize,
    pub verifying: usize,
}

type PostEvent = Box<dyn FnOnce() + Send>;

struct ProcessorState {
    blocks: VecDeque<UncheckedInfo>,
    forced: VecDeque<Arc<Block>>,
    active: bool,
    awaiting_write: bool,
    stopped: bool,
    next_log: Instant,
}

pub struct BlockProcessor<S: Store, L: Ledger<S>> {
    config: ProcessorConfig,
    store: Arc<S>,
    ledger: Arc<L>,
    write_queue: Arc<WriteQueue>,
    ports: NodePorts,
    arrival: Arc<BlockArrival>,
    verifier: SignatureVerifier,
    state: Mutex<ProcessorState>,
    condvar: Condvar,
    flushing: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
    self_weak: Weak<Self>,
}

impl<S: Store, L: Ledger<S>> BlockProcessor<S, L> {
    pub fn new(
        config: ProcessorConfig,
        store: Arc<S>,
        ledger: Arc<L>,
        write_queue: Arc<WriteQueue>,
        ports: NodePorts,
        epochs: Arc<Epochs>,
    ) -> Arc<Self> {
        let verification_size = config.block_processor_verification_size;
        Arc::new_cyclic(|self_weak| Self {
            config,
            store,
            ledger,
            write_queue,
            ports,
            arrival: Arc::new(BlockArrival::new()),
            verifier: SignatureVerifier::new(epochs, verification_size),
            state: Mutex::new(ProcessorState {
                blocks: VecDeque::new(),
                forced: VecDeque::new(),
                active: false,
                awaiting_write: false,
                stopped: false,
                next_log: Instant::now(),
            }),
            condvar: Condvar::new(),
            flushing: AtomicBool::new(false),
            thread: Mutex::new(None),
            self_weak: self_weak.clone(),
        })
    }

    /// Wires the signature verifier and spawns the processing thread.
    /// `stop` must be called before the processor is discarded; the loop
    /// thread keeps the instance alive otherwise.
    pub fn start(self: &Arc<Self>) {
        let verified = Arc::downgrade(self);
        let inactive = Arc::downgrade(self);
        self.verifier.start(
            Box::new(move |items, verifications| {
                if let Some(processor) = verified.upgrade() {
                    processor.process_verified(items, verifications);
                }
            }),
            Box::new(move || {
                if let Some(processor) = inactive.upgrade() {
                    if processor.flushing.load(Ordering::SeqCst) {
                        // Prevent a race with the condition wait in flush
                        drop(processor.state.lock());
                        processor.condvar.notify_all();
                    }
                }
            }),
        );
        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("blck processing".into())
            .spawn(move || this.process_blocks())
            .expect("failed to spawn block processing thread");
        *self.thread.lock() = Some(handle);
    }

    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.condvar.notify_all();
        self.verifier.stop();
        if let Some(handle) = self.thread.lock().take() {
            handle.join().ok();
        }
    }

    /// Live-network entry point: records the arrival and queues the block.
    pub fn process_active(&self, block: Arc<Block>) {
        self.arrival.add(block.hash());
        self.add(
            UncheckedInfo::new(block, Account::ZERO, VerifyStatus::Unknown),
            false,
        );
    }

    /// Queues a candidate block. Unverified state and open blocks (and any
    /// block with an account hint) detour through the signature verifier.
    /// `push_front` is set when draining the unchecked store so dependents
    /// ride in the same write transaction as their parent; it is honored
    /// only while the processor is under a quarter full.
    pub fn add(&self, info: UncheckedInfo, push_front: bool) {
        debug_assert!(
            work::validate_entry(&info.block, self.config.work_threshold),
            "blocks must be work-validated at ingress"
        );
        let quarter_full = self.size() > self.config.block_processor_full_size / 4;
        let needs_verification = info.verified == VerifyStatus::Unknown
            && (matches!(info.block.block_type(), BlockType::State | BlockType::Open)
                || !info.account.is_zero());
        if needs_verification {
            self.verifier.add(info);
        } else if push_front && !quarter_full {
            {
                let mut state = self.state.lock();
                state.blocks.push_front(info);
            }
            self.condvar.notify_all();
        } else {
            {
                let mut state = self.state.lock();
                state.blocks.push_back(info);
            }
            self.condvar.notify_all();
        }
    }

    /// Queues a locally synthesized replacement: applied even if a
    /// conflicting block already occupies its root, by rolling the ledger
    /// back first. Skips signature batching.
    pub fn force(&self, block: Arc<Block>) {
        {
            let mut state = self.state.lock();
            state.forced.push_back(block);
        }
        self.condvar.notify_all();
    }

    /// Asks the batch loop to release the write token at its next
    /// boundary, letting a higher-priority writer in.
    pub fn wait_write(&self) {
        let mut state = self.state.lock();
        state.awaiting_write = true;
    }

    pub fn size(&self) -> usize {
        let state = self.state.lock();
        state.blocks.len() + state.forced.len() + self.verifier.size()
    }

    pub fn full(&self) -> bool {
        self.size() >= self.config.block_processor_full_size
    }

    pub fn half_full(&self) -> bool {
        self.size() >= self.config.block_processor_full_size / 2
    }

    pub fn info(&self) -> ProcessorInfo {
        let state = self.state.lock();
        ProcessorInfo {
            blocks: state.blocks.len(),
            forced: state.forced.len(),
            verifying: self.verifier.size(),
        }
    }

    pub fn arrival(&self) -> &Arc<BlockArrival> {
        &self.arrival
    }

    /// Synchronous drain: returns once every queued block has been
    /// applied and the verifier is idle. Used by shutdown and tests.
    pub fn flush(&self) {
        self.verifier.flush();
        self.flushing.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            while !state.stopped
                && (!state.blocks.is_empty()
                    || !state.forced.is_empty()
                    || state.active
                    || self.verifier.is_active()
                    || self.verifier.size() != 0)
            {
                self.condvar.wait(&mut state);
            }
        }
        self.flushing.store(false, Ordering::SeqCst);
    }

    fn process_blocks(self: Arc<Self>) {
        let mut state = self.state.lock();
        while !state.stopped {
            if !state.blocks.is_empty() || !state.forced.is_empty() {
                state.active = true;
                drop(state);
                self.process_batch();
                state = self.state.lock();
                state.active = false;
            } else {
                self.condvar.notify_all();
                self.condvar.wait(&mut state);
            }
        }
    }

    fn should_log(&self, next_log: &mut Instant) -> bool {
        let now = Instant::now();
        if *next_log < now {
            let interval = if self.config.timing_logging {
                Duration::from_secs(2)
            } else {
                Duration::from_secs(15)
            };
            *next_log = now + interval;
            true
        } else {
            false
        }
    }

    fn process_batch(&self) {
        let write_guard = self.write_queue.wait(Writer::ProcessBatch);
        let mut events: Vec<PostEvent> = Vec::new();
        let mut txn = self
            .store
            .tx_begin_write(PROCESSOR_WRITE_TABLES, PROCESSOR_READ_TABLES);
        let timer = Instant::now();
        let batch_time = Duration::from_millis(self.config.block_processor_batch_max_time_ms);
        let mut number_of_blocks_processed = 0usize;
        let mut number_of_forced_processed = 0usize;

        let mut state = self.state.lock();
        while (!state.blocks.is_empty() || !state.forced.is_empty())
            && (timer.elapsed() < batch_time
                || number_of_blocks_processed < self.config.block_processor_batch_size)
            && !state.awaiting_write
        {
            let depth = state.blocks.len() + self.verifier.size() + state.forced.len();
            if depth > 64 && self.should_log(&mut state.next_log) {
                info!(
                    blocks = state.blocks.len(),
                    verifying = self.verifier.size(),
                    forced = state.forced.len(),
                    "blocks in processing queue"
                );
            }
            let (info, force) = match state.forced.pop_front() {
                Some(block) => {
                    number_of_forced_processed += 1;
                    (
                        UncheckedInfo {
                            block,
                            account: Account::ZERO,
                            modified: seconds_since_epoch(),
                            verified: VerifyStatus::Unknown,
                            confirmed: false,
                        },
                        true,
                    )
                }
                None => {
                    let info = state
                        .blocks
                        .pop_front()
                        .expect("loop condition guarantees a queued block");
                    (info, false)
                }
            };
            drop(state);
            if force {
                self.rollback_competitor(&mut txn, &info.block);
            }
            number_of_blocks_processed += 1;
            self.process_one(&mut txn, &mut events, info, true, BlockOrigin::Remote);
            state = self.state.lock();
        }
        state.awaiting_write = false;
        drop(state);

        if self.config.timing_logging
            && number_of_blocks_processed != 0
            && timer.elapsed() > Duration::from_millis(100)
        {
            info!(
                processed = number_of_blocks_processed,
                forced = number_of_forced_processed,
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "processed batch"
            );
        }

        // Commit, then release the writer gate
        drop(txn);
        drop(write_guard);

        // Post-events run only after the transaction is durable
        self.ports.worker.push_task(Box::new(move || {
            for event in events {
                event();
            }
        }));
    }

    /// Forced path: evict whatever currently occupies the block's root.
    fn rollback_competitor(&self, txn: &mut S::Txn, block: &Arc<Block>) {
        let hash = block.hash();
        if let Some(successor) = self.ledger.successor(txn, &block.qualified_root()) {
            if successor.hash() != hash {
                // Replace our block with the winner and roll back any dependent blocks
                info!(rolling_back = %successor.hash(), replacement = %hash, "rolling back competitor");
                match self.ledger.rollback(txn, &successor.hash()) {
                    Err(rollback_error) => {
                        error!(hash = %successor.hash(), error = %rollback_error, "failed to roll back");
                    }
                    Ok(rollback_list) => {
                        info!(count = rollback_list.len(), "blocks rolled back");
                        self.ports
                            .stats
                            .inc(StatCategory::Rollback, StatDetail::RolledBack);
                        // Scrub rolled-back state from the vote cache and
                        // wallet watcher; stop their elections except for
                        // the root we are replacing
                        for rolled_back in &rollback_list {
                            self.ports.votes_cache.remove(&rolled_back.hash());
                            self.ports.work_watcher.remove(rolled_back);
                            if rolled_back.hash() != successor.hash() {
                                self.ports.active.erase(rolled_back);
                            }
                        }
                    }
                }
            }
        }
    }

    fn process_one(
        &self,
        txn: &mut S::Txn,
        events: &mut Vec<PostEvent>,
        mut info: UncheckedInfo,
        watch_work: bool,
        origin: BlockOrigin,
    ) -> ProcessResult {
        let hash = info.block.hash();
        let result = self.ledger.process(txn, &info.block, info.verified);
        match result.code {
            ProcessCode::Progress => {
                debug_assert!(
                    info.account.is_zero() || info.account == result.account,
                    "account hint must match ledger resolution"
                );
                if self.config.ledger_logging {
                    debug!(%hash, "processing block");
                }
                if info.modified > seconds_since_epoch().saturating_sub(300)
                    && self.arrival.recent(&hash)
                {
                    let block = info.block.clone();
                    if let Some(this) = self.self_weak.upgrade() {
                        events.push(Box::new(move || {
                            this.process_live(block, result, watch_work, origin);
                        }));
                    }
                }
                self.queue_unchecked(txn, &hash);
                self.ports.stats.inc(StatCategory::Ledger, StatDetail::Progress);
            }
            ProcessCode::GapPrevious => {
                if self.config.ledger_logging {
                    debug!(%hash, "gap previous");
                }
                info.verified = result.verified;
                if info.modified == 0 {
                    info.modified = seconds_since_epoch();
                }
                let key = UncheckedKey::new(info.block.previous(), hash);
                let exists = self.store.unchecked_exists(txn, &key);
                self.store.unchecked_put(txn, key, &info);
                if !exists {
                    self.ledger
                        .cache()
                        .unchecked_count
                        .fetch_add(1, Ordering::Relaxed);
                }
                let gap_cache = self.ports.gap_cache.clone();
                events.push(Box::new(move || gap_cache.add(hash)));
                self.ports
                    .stats
                    .inc(StatCategory::Ledger, StatDetail::GapPrevious);
            }
            ProcessCode::GapSource => {
                if self.config.ledger_logging {
                    debug!(%hash, "gap source");
                }
                info.verified = result.verified;
                if info.modified == 0 {
                    info.modified = seconds_since_epoch();
                }
                let key = UncheckedKey::new(self.ledger.block_source(txn, &info.block), hash);
                let exists = self.store.unchecked_exists(txn, &key);
                self.store.unchecked_put(txn, key, &info);
                if !exists {
                    self.ledger
                        .cache()
                        .unchecked_count
                        .fetch_add(1, Ordering::Relaxed);
                }
                let gap_cache = self.ports.gap_cache.clone();
                events.push(Box::new(move || gap_cache.add(hash)));
                self.ports
                    .stats
                    .inc(StatCategory::Ledger, StatDetail::GapSource);
            }
            ProcessCode::Old => {
                if self.config.ledger_duplicate_logging {
                    debug!(%hash, "old block");
                }
                self.queue_unchecked(txn, &hash);
                let block = info.block.clone();
                if let Some(this) = self.self_weak.upgrade() {
                    events.push(Box::new(move || this.process_old(block, origin)));
                }
                self.ports.stats.inc(StatCategory::Ledger, StatDetail::Old);
            }
            ProcessCode::BadSignature => {
                if self.config.ledger_logging {
                    debug!(%hash, "bad signature");
                }
                self.requeue_invalid(&hash, &info);
            }
            ProcessCode::Fork => {
                let fork_handler = self.ports.fork_handler.clone();
                let block = info.block.clone();
                events.push(Box::new(move || fork_handler.process_fork(block)));
                self.ports.stats.inc(StatCategory::Ledger, StatDetail::Fork);
                if self.config.ledger_logging {
                    debug!(%hash, root = %info.block.root(), "fork");
                }
            }
            ProcessCode::OpenedBurnAccount => {
                error!(%hash, "rejecting open block for burn account");
                self.ports
                    .stats
                    .inc(StatCategory::Ledger, StatDetail::Rejected);
            }
            ProcessCode::NegativeSpend
            | ProcessCode::Unreceivable
            | ProcessCode::BalanceMismatch
            | ProcessCode::RepresentativeMismatch
            | ProcessCode::BlockPosition
            | ProcessCode::InsufficientWork => {
                if self.config.ledger_logging {
                    debug!(%hash, code = ?result.code, "rejected block");
                }
                self.ports
                    .stats
                    .inc(StatCategory::Ledger, StatDetail::Rejected);
            }
        }
        result
    }

    /// Post-commit treatment of a freshly progressed, recently arrived
    /// block: keep its work watched, open an election, announce it.
    fn process_live(
        &self,
        block: Arc<Block>,
        result: ProcessResult,
        watch_work: bool,
        origin: BlockOrigin,
    ) {
        // Add to work watcher to prevent dropping the election
        if watch_work {
            self.ports.work_watcher.add(block.clone());
        }

        // Start collecting quorum on the block
        self.ports
            .active
            .insert(block.clone(), result.previous_balance);

        // Announce the block contents to the network
        if origin == BlockOrigin::Local {
            self.ports.network.flood_block_initial(block.clone());
        } else if !self.config.disable_block_processor_republishing {
            self.ports
                .network
                .flood_block(block.clone(), DropPolicy::NoLimiterDrop);
        }

        if let Some(websocket) = &self.ports.websocket {
            if websocket.any_subscriber(WebsocketTopic::NewUnconfirmedBlock) {
                websocket.broadcast_block(&block);
            }
        }
    }

    /// Post-commit treatment of a duplicate: refresh election difficulty,
    /// possibly restart a dropped election, and keep announcing local
    /// blocks.
    fn process_old(&self, block: Arc<Block>, origin: BlockOrigin) {
        // First try to update election difficulty, then attempt to restart
        if !self.ports.active.update_difficulty(&block) || !self.ports.active.restart(&block) {
            if origin == BlockOrigin::Local {
                self.ports.network.flood_block_initial(block);
            }
        }
    }

    /// Re-admits every unchecked block that waited on `hash`, front-queued
    /// so they land in the current write transaction.
    fn queue_unchecked(&self, txn: &mut S::Txn, hash: &BlockHash) {
        let dependents = self.store.unchecked_get(txn, hash);
        for info in dependents {
            if !self.config.disable_block_processor_unchecked_deletion {
                self.store
                    .unchecked_del(txn, &UncheckedKey::new(*hash, info.block.hash()));
                let cache = self.ledger.cache();
                debug_assert!(cache.unchecked_count.load(Ordering::Relaxed) > 0);
                cache.unchecked_count.fetch_sub(1, Ordering::Relaxed);
            }
            self.add(info, true);
        }
        self.ports.gap_cache.erase(hash);
    }

    /// Hands a signature reject to bootstrap for a lazy re-pull, in case
    /// our copy of the block is simply corrupt.
    fn requeue_invalid(&self, hash: &BlockHash, info: &UncheckedInfo) {
        debug_assert_eq!(*hash, info.block.hash());
        self.ports
            .bootstrap
            .lazy_requeue(hash, &info.block.previous(), info.confirmed);
    }

    /// Verdict sink for the signature verifier.
    fn process_verified(&self, items: Vec<UncheckedInfo>, verifications: Vec<bool>) {
        {
            let mut state = self.state.lock();
            for (mut item, valid) in items.into_iter().zip(verifications) {
                let link = item.block.link();
                if !link.is_zero() && self.ledger.is_epoch_link(&link) {
                    // Epoch-shaped: a failed epoch signature may still be a
                    // regular state block; requeue for the ledger to decide
                    item.verified = if valid {
                        VerifyStatus::ValidEpoch
                    } else {
                        VerifyStatus::Unknown
                    };
                    state.blocks.push_back(item);
                } else if valid {
                    item.verified = VerifyStatus::Valid;
                    state.blocks.push_back(item);
                } else {
                    let hash = item.block.hash();
                    self.requeue_invalid(&hash, &item);
                }
            }
        }
        self.condvar.notify_all();
    }
}
