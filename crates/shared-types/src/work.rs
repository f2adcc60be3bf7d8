//! Proof-of-work validation.
//!
//! The work nonce proves rate-limited authorship over a block's root. Its
//! value is the first eight bytes of SHA-256 over `nonce || root`, read
//! little-endian; a block is valid when that value meets the network
//! threshold.

use crate::block::Block;
use crate::entities::Root;
use sha2::{Digest, Sha256};

/// Production threshold. Roughly one in 2^26 nonces qualifies.
pub const WORK_THRESHOLD_MAINNET: u64 = 0xFFFF_FFC0_0000_0000;

/// Development threshold: every nonce qualifies.
pub const WORK_THRESHOLD_DEV: u64 = 0;

pub fn work_value(root: &Root, work: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(work.to_le_bytes());
    hasher.update(root.as_bytes());
    let digest = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(first)
}

pub fn work_valid(root: &Root, work: u64, threshold: u64) -> bool {
    work_value(root, work) >= threshold
}

/// Validates the work carried by a block against its own root.
pub fn validate_entry(block: &Block, threshold: u64) -> bool {
    work_valid(&block.root(), block.work(), threshold)
}

/// Brute-force search for a qualifying nonce, for tests and local
/// generation. Scans sequentially from `start`.
pub fn generate(root: &Root, threshold: u64, start: u64) -> u64 {
    let mut nonce = start;
    while !work_valid(root, nonce, threshold) {
        nonce = nonce.wrapping_add(1);
    }
    nonce
}
