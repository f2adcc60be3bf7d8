//! In-memory reference implementations of the collaborator ports.
//!
//! The persistent backends live in the node; these adapters implement the
//! same contracts over process memory with enough account-chain semantics
//! to produce every processing outcome, and are what the test suites run
//! against.

pub mod mem_ledger;
pub mod mem_store;
pub mod recorders;

pub use mem_ledger::MemLedger;
pub use mem_store::{mem_backend, AccountInfo, MemStore, MemTxn, PendingInfo};
pub use recorders::{
    CounterStats, InlineWorker, RecordingBootstrap, RecordingElections, RecordingForkHandler,
    RecordingGapCache, RecordingNetwork, RecordingVotesCache, RecordingWatcher,
    RecordingWebsocket,
};
