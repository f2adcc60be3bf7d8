//! # BL-05 Block Processor
//!
//! The serialized heart of block ingestion. Candidate blocks from the
//! network, the unchecked store and local forced insertions are queued,
//! pre-verified in signature batches, and applied to the ledger one at a
//! time inside a single write transaction per batch.
//!
//! ## Architecture
//!
//! - [`BlockProcessor`]: owns the processing thread, the queues and the
//!   post-event accumulator.
//! - [`SignatureVerifier`]: batching verification pool feeding verdicts
//!   back into the processing queue.
//! - [`WriteQueue`]: the process-wide single-writer gate shared with the
//!   cementing and bootstrap subsystems.
//! - [`BlockArrival`]: recency set deciding which progressed blocks get
//!   live post-processing (election, flood, websocket).
//! - `ports`: trait seams for every external collaborator (ledger, store,
//!   elections, network, caches, stats).
//! - `adapters`: in-memory reference implementations of the ports, used by
//!   the test suites.
//!
//! ## Concurrency
//!
//! One dedicated loop thread waits on a condition variable for work. Each
//! batch acquires the write token, opens one write transaction, processes
//! until queues drain or the time budget expires, commits, and only then
//! dispatches accumulated post-events on the worker pool. `wait_write`
//! asks the loop to yield the token at the next boundary so that
//! higher-priority writers can cement confirmations.

pub mod adapters;
pub mod arrival;
pub mod config;
pub mod ports;
pub mod processor;
pub mod verification;
pub mod write_queue;

pub use arrival::BlockArrival;
pub use config::ProcessorConfig;
pub use ports::*;
pub use processor::{BlockOrigin, BlockProcessor, ProcessorInfo};
pub use verification::SignatureVerifier;
pub use write_queue::{WriteGuard, WriteQueue, Writer};
