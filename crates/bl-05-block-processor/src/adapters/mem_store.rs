//! In-memory store adapter.
//!
//! Tables live behind one `RwLock`. A transaction handle is a marker: the
//! single-writer discipline the real backend gets from its write
//! transaction is provided here by the [`crate::WriteQueue`] gate, which
//! serializes all writers before they ever reach the store.

use crate::ports::{Store, Table};
use parking_lot::RwLock;
use shared_types::{
    Account, Amount, Block, BlockHash, QualifiedRoot, UncheckedInfo, UncheckedKey,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ledger head state of one account.
#[derive(Clone, Debug)]
pub struct AccountInfo {
    pub head: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    pub block_count: u64,
}

/// A receivable amount parked under `(destination, send_hash)`.
#[derive(Clone, Debug)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
}

/// Side metadata recorded with each stored block.
#[derive(Clone, Debug)]
pub(crate) struct Sideband {
    pub account: Account,
    pub balance: Amount,
    pub representative: Account,
}

#[derive(Default)]
pub(crate) struct Tables {
    pub blocks: HashMap<BlockHash, Arc<Block>>,
    pub sidebands: HashMap<BlockHash, Sideband>,
    pub successors: HashMap<QualifiedRoot, BlockHash>,
    pub accounts: HashMap<Account, AccountInfo>,
    pub pending: HashMap<(Account, BlockHash), PendingInfo>,
    /// Receive block that consumed each send, for cross-chain rollback.
    pub receivers: HashMap<BlockHash, BlockHash>,
    pub unchecked: BTreeMap<UncheckedKey, UncheckedInfo>,
}

/// Transaction marker. Creation mode is recorded for debug assertions.
pub struct MemTxn {
    pub(crate) writable: bool,
}

pub struct MemStore {
    pub(crate) tables: Arc<RwLock<Tables>>,
    write_txns: AtomicU64,
}

impl MemStore {
    pub(crate) fn with_tables(tables: Arc<RwLock<Tables>>) -> Self {
        Self {
            tables,
            write_txns: AtomicU64::new(0),
        }
    }

    /// Number of write transactions opened so far.
    pub fn write_txn_count(&self) -> u64 {
        self.write_txns.load(Ordering::Relaxed)
    }

    /// Current balance of `account`, for assertions in tests.
    pub fn account_balance(&self, account: &Account) -> Amount {
        self.tables
            .read()
            .accounts
            .get(account)
            .map(|info| info.balance)
            .unwrap_or_default()
    }

    /// Number of unchecked entries currently stored.
    pub fn unchecked_len(&self) -> usize {
        self.tables.read().unchecked.len()
    }
}

impl Store for MemStore {
    type Txn = MemTxn;

    fn tx_begin_read(&self) -> MemTxn {
        MemTxn { writable: false }
    }

    fn tx_begin_write(&self, _write_tables: &[Table], _read_tables: &[Table]) -> MemTxn {
        self.write_txns.fetch_add(1, Ordering::Relaxed);
        MemTxn { writable: true }
    }

    fn block_exists(&self, _txn: &MemTxn, hash: &BlockHash) -> bool {
        self.tables.read().blocks.contains_key(hash)
    }

    fn block_get(&self, _txn: &MemTxn, hash: &BlockHash) -> Option<Arc<Block>> {
        self.tables.read().blocks.get(hash).cloned()
    }

    fn unchecked_get(&self, _txn: &MemTxn, dependency: &BlockHash) -> Vec<UncheckedInfo> {
        let lower = UncheckedKey::new(*dependency, BlockHash::ZERO);
        let upper = UncheckedKey::new(*dependency, BlockHash([0xFF; 32]));
        self.tables
            .read()
            .unchecked
            .range(lower..=upper)
            .map(|(_, info)| info.clone())
            .collect()
    }

    fn unchecked_put(&self, txn: &mut MemTxn, key: UncheckedKey, info: &UncheckedInfo) {
        debug_assert!(txn.writable);
        self.tables.write().unchecked.insert(key, info.clone());
    }

    fn unchecked_exists(&self, _txn: &MemTxn, key: &UncheckedKey) -> bool {
        self.tables.read().unchecked.contains_key(key)
    }

    fn unchecked_del(&self, txn: &mut MemTxn, key: &UncheckedKey) {
        debug_assert!(txn.writable);
        self.tables.write().unchecked.remove(key);
    }
}

/// Builds a store and ledger sharing one table set.
pub fn mem_backend(
    epochs: Arc<shared_types::Epochs>,
    work_threshold: u64,
) -> (Arc<MemStore>, Arc<super::MemLedger>) {
    let tables = Arc::new(RwLock::new(Tables::default()));
    let store = Arc::new(MemStore::with_tables(tables.clone()));
    let ledger = Arc::new(super::MemLedger::new(tables, epochs, work_threshold));
    (store, ledger)
}
