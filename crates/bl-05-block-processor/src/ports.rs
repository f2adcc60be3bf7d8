//! Collaborator seams.
//!
//! The processor mutates the ledger and store through generic traits so
//! that the node can bind its persistent backends, while the remaining
//! collaborators (elections, network, caches, stats) are object-safe
//! traits bound late. The in-memory reference implementations live in
//! [`crate::adapters`].

use bl_02_transport::DropPolicy;
use shared_types::{
    Amount, Block, BlockHash, Link, ProcessResult, QualifiedRoot, UncheckedInfo, UncheckedKey,
    VerifyStatus,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use thiserror::Error;

/// Tables recognized by the backing store. Write transactions declare the
/// tables they intend to touch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Table {
    Accounts,
    Blocks,
    Frontiers,
    Pending,
    Representation,
    Unchecked,
    ConfirmationHeight,
}

/// Tables the block processor writes during a batch.
pub const PROCESSOR_WRITE_TABLES: &[Table] = &[
    Table::Accounts,
    Table::Blocks,
    Table::Frontiers,
    Table::Pending,
    Table::Representation,
    Table::Unchecked,
];

/// Tables the block processor only reads.
pub const PROCESSOR_READ_TABLES: &[Table] = &[Table::ConfirmationHeight];

/// Persistent key-value backend. One write transaction may be live at a
/// time; the caller serializes writers through [`crate::WriteQueue`].
pub trait Store: Send + Sync + 'static {
    /// Transaction handle. Read and write handles share a type; whether
    /// writes are permitted is decided at creation.
    type Txn: Send;

    fn tx_begin_read(&self) -> Self::Txn;
    fn tx_begin_write(&self, write_tables: &[Table], read_tables: &[Table]) -> Self::Txn;

    fn block_exists(&self, txn: &Self::Txn, hash: &BlockHash) -> bool;
    fn block_get(&self, txn: &Self::Txn, hash: &BlockHash) -> Option<Arc<Block>>;

    /// All unchecked entries keyed under `dependency`.
    fn unchecked_get(&self, txn: &Self::Txn, dependency: &BlockHash) -> Vec<UncheckedInfo>;
    fn unchecked_put(&self, txn: &mut Self::Txn, key: UncheckedKey, info: &UncheckedInfo);
    fn unchecked_exists(&self, txn: &Self::Txn, key: &UncheckedKey) -> bool;
    fn unchecked_del(&self, txn: &mut Self::Txn, key: &UncheckedKey);
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {0} not present")]
    BlockNotFound(BlockHash),
    #[error("cannot roll back {0}: it or a successor is confirmed")]
    Confirmed(BlockHash),
}

/// Mutable counters the ledger keeps in memory alongside the store.
#[derive(Default)]
pub struct LedgerCache {
    pub unchecked_count: AtomicU64,
}

/// Account-chain semantics over a [`Store`].
pub trait Ledger<S: Store>: Send + Sync + 'static {
    /// Applies `block` under the given transaction. `verified` carries the
    /// pre-verification verdict; `VerifyStatus::Unknown` forces the ledger
    /// to check the signature itself.
    fn process(&self, txn: &mut S::Txn, block: &Block, verified: VerifyStatus) -> ProcessResult;

    /// Current occupant of a chain position, if any.
    fn successor(&self, txn: &S::Txn, root: &QualifiedRoot) -> Option<Arc<Block>>;

    /// Rolls back `hash` and everything chained on top of it, returning
    /// the removed blocks.
    fn rollback(&self, txn: &mut S::Txn, hash: &BlockHash) -> Result<Vec<Arc<Block>>, LedgerError>;

    /// Dependency a receive-like block consumes: its source field, or the
    /// link of a state block.
    fn block_source(&self, txn: &S::Txn, block: &Block) -> BlockHash;

    fn is_epoch_link(&self, link: &Link) -> bool;

    fn cache(&self) -> &LedgerCache;
}

/// Handle into the election container.
pub trait ActiveElections: Send + Sync {
    /// Starts (or joins) an election for `block`. Returns whether a new
    /// election was created.
    fn insert(&self, block: Arc<Block>, previous_balance: Amount) -> bool;
    /// Tears down the election occupying `block`'s qualified root.
    fn erase(&self, block: &Block);
    /// Reports a better difficulty for an existing election.
    fn update_difficulty(&self, block: &Block) -> bool;
    /// Restarts a dropped election. Returns whether a restart happened.
    fn restart(&self, block: &Arc<Block>) -> bool;
    fn contains(&self, root: &QualifiedRoot) -> bool;
}

/// Fork resolution entry point; the handler opens a competing election
/// between the ledger occupant and `block`.
pub trait ForkHandler: Send + Sync {
    fn process_fork(&self, block: Arc<Block>);
}

/// Outbound block propagation.
pub trait Network: Send + Sync {
    /// Floods a block originating here, bypassing the limiter.
    fn flood_block_initial(&self, block: Arc<Block>);
    fn flood_block(&self, block: Arc<Block>, policy: DropPolicy);
}

/// Tracks hashes that arrived with an unsatisfied dependency, for
/// targeted re-requests.
pub trait GapCache: Send + Sync {
    fn add(&self, hash: BlockHash);
    fn erase(&self, hash: &BlockHash);
}

/// Lazy bootstrap re-pull queue for blocks that failed verification.
pub trait BootstrapInitiator: Send + Sync {
    fn lazy_requeue(&self, hash: &BlockHash, previous: &BlockHash, confirmed: bool);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StatCategory {
    Ledger,
    Rollback,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StatDetail {
    Progress,
    GapPrevious,
    GapSource,
    Old,
    Fork,
    BadSignature,
    Rejected,
    RolledBack,
}

pub trait Stats: Send + Sync {
    fn inc(&self, category: StatCategory, detail: StatDetail);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WebsocketTopic {
    NewUnconfirmedBlock,
}

/// Optional websocket fan-out for observers.
pub trait WebsocketSink: Send + Sync {
    fn any_subscriber(&self, topic: WebsocketTopic) -> bool;
    fn broadcast_block(&self, block: &Block);
}

/// Wallet-side watcher keeping elections for local blocks alive by
/// re-generating work when difficulty rises.
pub trait WorkWatcher: Send + Sync {
    fn add(&self, block: Arc<Block>);
    fn remove(&self, block: &Block);
}

/// Cache of recent votes by block hash; rolled-back blocks are purged.
pub trait VotesCache: Send + Sync {
    fn remove(&self, hash: &BlockHash);
}

/// Generic deferred-execution pool for post-commit events.
pub trait WorkerPool: Send + Sync {
    fn push_task(&self, task: Box<dyn FnOnce() + Send>);
}

/// The object-safe collaborators bundled for the processor.
pub struct NodePorts {
    pub active: Arc<dyn ActiveElections>,
    pub fork_handler: Arc<dyn ForkHandler>,
    pub network: Arc<dyn Network>,
    pub gap_cache: Arc<dyn GapCache>,
    pub bootstrap: Arc<dyn BootstrapInitiator>,
    pub stats: Arc<dyn Stats>,
    pub websocket: Option<Arc<dyn WebsocketSink>>,
    pub work_watcher: Arc<dyn WorkWatcher>,
    pub votes_cache: Arc<dyn VotesCache>,
    pub worker: Arc<dyn WorkerPool>,
}
