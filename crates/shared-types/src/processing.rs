//! Ledger processing results and the unchecked-block model.

use crate::block::Block;
use crate::entities::{Account, Amount, BlockHash};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, used for ingestion timestamps.
pub fn seconds_since_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

/// Signature verification state accompanying a block through the pipeline.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum VerifyStatus {
    /// Not verified yet, or an epoch-shaped block whose epoch signature
    /// failed and which must be re-checked against the account key.
    #[default]
    Unknown,
    /// Signature checked against the account owner.
    Valid,
    /// Signature checked against the epoch authority.
    ValidEpoch,
}

/// A block awaiting ledger application, with its ingestion context.
#[derive(Clone, Debug)]
pub struct UncheckedInfo {
    pub block: Arc<Block>,
    /// Origin hint; zero when unknown. Must match the ledger's account
    /// resolution when the block progresses.
    pub account: Account,
    /// Ingestion timestamp, seconds since epoch. Zero means unset.
    pub modified: u64,
    pub verified: VerifyStatus,
    /// Hint that a voting quorum was already observed for this block.
    pub confirmed: bool,
}

impl UncheckedInfo {
    pub fn new(block: Arc<Block>, account: Account, verified: VerifyStatus) -> Self {
        Self {
            block,
            account,
            modified: seconds_since_epoch(),
            verified,
            confirmed: false,
        }
    }
}

/// Key of the unchecked store: a pending block indexed by the dependency it
/// waits for. The same block may appear under its previous and under its
/// source.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct UncheckedKey {
    pub dependency: BlockHash,
    pub hash: BlockHash,
}

impl UncheckedKey {
    pub fn new(dependency: BlockHash, hash: BlockHash) -> Self {
        Self { dependency, hash }
    }
}

/// Outcome of applying one block to the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ProcessCode {
    /// Block advanced the ledger.
    Progress,
    /// Predecessor not yet in the ledger.
    GapPrevious,
    /// Cross-chain source not yet in the ledger.
    GapSource,
    /// Block already present.
    Old,
    BadSignature,
    /// Send would increase the balance.
    NegativeSpend,
    /// Receive references a source that is not pending for this account.
    Unreceivable,
    /// A different block already occupies this root.
    Fork,
    OpenedBurnAccount,
    BalanceMismatch,
    RepresentativeMismatch,
    /// Variant not allowed at this chain position.
    BlockPosition,
    InsufficientWork,
}

/// Result of a ledger application.
#[derive(Clone, Copy, Debug)]
pub struct ProcessResult {
    pub code: ProcessCode,
    /// Account the block belongs to, when resolvable.
    pub account: Account,
    /// Balance of the predecessor, used to seed election weights.
    pub previous_balance: Amount,
    /// Verification state after ledger checks.
    pub verified: VerifyStatus,
}

impl ProcessResult {
    pub fn new(code: ProcessCode) -> Self {
        Self {
            code,
            account: Account::ZERO,
            previous_balance: 0,
            verified: VerifyStatus::Unknown,
        }
    }
}
