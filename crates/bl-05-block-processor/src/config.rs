//! Processor configuration.

use serde::{Deserialize, Serialize};
use shared_types::work::WORK_THRESHOLD_DEV;

/// Tunables and feature toggles for the block processor. Field names match
/// the node's configuration keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Soft time budget per batch, in milliseconds. A batch keeps going
    /// past this only while fewer than `batch_size` blocks were processed.
    pub block_processor_batch_max_time_ms: u64,
    /// Minimum blocks per batch even when the time budget is exhausted.
    pub block_processor_batch_size: usize,
    /// Queue depth at which `full()` reports backpressure.
    pub block_processor_full_size: usize,
    /// Items handed to the signature verifier per round.
    pub block_processor_verification_size: usize,
    /// Suppress re-flooding of non-local blocks after progress.
    pub disable_block_processor_republishing: bool,
    /// Keep unchecked entries when draining dependents.
    pub disable_block_processor_unchecked_deletion: bool,
    /// Proof-of-work admission threshold.
    pub work_threshold: u64,
    /// Verbose batch timing lines.
    pub timing_logging: bool,
    /// Per-block ledger outcome lines.
    pub ledger_logging: bool,
    /// Log blocks rejected as already present.
    pub ledger_duplicate_logging: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            block_processor_batch_max_time_ms: 250,
            block_processor_batch_size: 256,
            block_processor_full_size: 65536,
            block_processor_verification_size: 16384,
            disable_block_processor_republishing: false,
            disable_block_processor_unchecked_deletion: false,
            work_threshold: WORK_THRESHOLD_DEV,
            timing_logging: false,
            ledger_logging: false,
            ledger_duplicate_logging: false,
        }
    }
}
