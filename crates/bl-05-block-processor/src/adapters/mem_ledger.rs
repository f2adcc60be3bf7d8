//! In-memory account-chain ledger.
//!
//! Implements enough of the lattice semantics to yield every
//! [`ProcessCode`]: chain continuity, fork occupancy, signature and work
//! checks, receivable tracking, epoch upgrades, and recursive rollback of
//! dependent chains.

use super::mem_store::{AccountInfo, MemStore, MemTxn, PendingInfo, Sideband, Tables};
use crate::ports::{Ledger, LedgerCache, LedgerError};
use parking_lot::RwLock;
use shared_types::{
    work, Account, Amount, Block, BlockHash, Epochs, Link, ProcessCode, ProcessResult,
    QualifiedRoot, VerifyStatus, BURN_ACCOUNT,
};
use std::sync::Arc;

pub struct MemLedger {
    tables: Arc<RwLock<Tables>>,
    epochs: Arc<Epochs>,
    work_threshold: u64,
    cache: LedgerCache,
}

impl MemLedger {
    pub(crate) fn new(
        tables: Arc<RwLock<Tables>>,
        epochs: Arc<Epochs>,
        work_threshold: u64,
    ) -> Self {
        Self {
            tables,
            epochs,
            work_threshold,
            cache: LedgerCache::default(),
        }
    }

    /// Seeds the genesis open block without validation.
    pub fn seed_genesis(&self, block: Arc<Block>, balance: Amount) {
        let mut tables = self.tables.write();
        let hash = block.hash();
        let account = block
            .account_field()
            .expect("genesis must be an open block");
        let representative = block.representative().unwrap_or(account);
        tables.successors.insert(block.qualified_root(), hash);
        tables.sidebands.insert(
            hash,
            Sideband {
                account,
                balance,
                representative,
            },
        );
        tables.accounts.insert(
            account,
            AccountInfo {
                head: hash,
                representative,
                balance,
                block_count: 1,
            },
        );
        tables.blocks.insert(hash, block);
    }
}

fn outcome(code: ProcessCode) -> ProcessResult {
    ProcessResult::new(code)
}

fn progress(account: Account, previous_balance: Amount, verified: VerifyStatus) -> ProcessResult {
    ProcessResult {
        code: ProcessCode::Progress,
        account,
        previous_balance,
        verified,
    }
}

/// Everything `apply` needs after validation.
struct Validated {
    account: Account,
    previous_balance: Amount,
    new_balance: Amount,
    representative: Account,
    verified: VerifyStatus,
    /// Send destination to park a pending entry under.
    pending_add: Option<(Account, Amount)>,
    /// Consumed source hash, for receive bookkeeping.
    pending_take: Option<BlockHash>,
}

impl MemLedger {
    fn verify_account_signature(
        &self,
        block: &Block,
        account: &Account,
        verified: VerifyStatus,
    ) -> bool {
        match verified {
            VerifyStatus::Valid => true,
            // A pre-verified epoch signature does not vouch for the owner
            VerifyStatus::ValidEpoch | VerifyStatus::Unknown => block.verify_signature(account),
        }
    }

    fn process_inner(
        &self,
        tables: &mut Tables,
        block: &Block,
        verified: VerifyStatus,
    ) -> Result<Validated, ProcessCode> {
        let hash = block.hash();
        if tables.blocks.contains_key(&hash) {
            return Err(ProcessCode::Old);
        }
        if !work::work_valid(&block.root(), block.work(), self.work_threshold) {
            return Err(ProcessCode::InsufficientWork);
        }
        if tables.successors.contains_key(&block.qualified_root()) {
            return Err(ProcessCode::Fork);
        }

        let previous = block.previous();
        if previous.is_zero() {
            self.validate_open(tables, block, verified)
        } else {
            let Some(previous_sideband) = tables.sidebands.get(&previous).cloned() else {
                return Err(ProcessCode::GapPrevious);
            };
            self.validate_successor(tables, block, previous_sideband, verified)
        }
    }

    /// Chain-opening blocks: legacy open, or a state block without a
    /// previous.
    fn validate_open(
        &self,
        tables: &mut Tables,
        block: &Block,
        verified: VerifyStatus,
    ) -> Result<Validated, ProcessCode> {
        let account = block.account_field().ok_or(ProcessCode::GapPrevious)?;
        if account == BURN_ACCOUNT {
            return Err(ProcessCode::OpenedBurnAccount);
        }
        if tables.accounts.contains_key(&account) {
            // An occupied chain start not caught by the successor index
            return Err(ProcessCode::Fork);
        }
        if !self.verify_account_signature(block, &account, verified) {
            return Err(ProcessCode::BadSignature);
        }
        let representative = block.representative().unwrap_or(account);
        match block {
            Block::Open(open) => {
                let amount = self.receivable(tables, &account, &open.source)?;
                Ok(Validated {
                    account,
                    previous_balance: 0,
                    new_balance: amount,
                    representative,
                    verified: VerifyStatus::Valid,
                    pending_add: None,
                    pending_take: Some(open.source),
                })
            }
            Block::State(state) => {
                // An opening state block must receive something
                let source: BlockHash = state.link.into();
                let amount = self.receivable(tables, &account, &source)?;
                if state.balance != amount {
                    return Err(ProcessCode::BalanceMismatch);
                }
                Ok(Validated {
                    account,
                    previous_balance: 0,
                    new_balance: state.balance,
                    representative,
                    verified: VerifyStatus::Valid,
                    pending_add: None,
                    pending_take: Some(source),
                })
            }
            _ => Err(ProcessCode::BlockPosition),
        }
    }

    /// Blocks extending an existing chain.
    fn validate_successor(
        &self,
        tables: &mut Tables,
        block: &Block,
        previous_sideband: Sideband,
        verified: VerifyStatus,
    ) -> Result<Validated, ProcessCode> {
        let account = previous_sideband.account;
        let previous_balance = previous_sideband.balance;
        let previous_representative = previous_sideband.representative;
        let previous_is_state = matches!(
            tables.blocks.get(&block.previous()).map(|b| b.as_ref()),
            Some(Block::State(_))
        );

        match block {
            Block::Send(send) => {
                if previous_is_state {
                    return Err(ProcessCode::BlockPosition);
                }
                if !self.verify_account_signature(block, &account, verified) {
                    return Err(ProcessCode::BadSignature);
                }
                if send.balance > previous_balance {
                    return Err(ProcessCode::NegativeSpend);
                }
                Ok(Validated {
                    account,
                    previous_balance,
                    new_balance: send.balance,
                    representative: previous_representative,
                    verified: VerifyStatus::Valid,
                    pending_add: Some((send.destination, previous_balance - send.balance)),
                    pending_take: None,
                })
            }
            Block::Receive(receive) => {
                if previous_is_state {
                    return Err(ProcessCode::BlockPosition);
                }
                if !self.verify_account_signature(block, &account, verified) {
                    return Err(ProcessCode::BadSignature);
                }
                let amount = self.receivable(tables, &account, &receive.source)?;
                Ok(Validated {
                    account,
                    previous_balance,
                    new_balance: previous_balance + amount,
                    representative: previous_representative,
                    verified: VerifyStatus::Valid,
                    pending_add: None,
                    pending_take: Some(receive.source),
                })
            }
            Block::Change(change) => {
                if previous_is_state {
                    return Err(ProcessCode::BlockPosition);
                }
                if !self.verify_account_signature(block, &account, verified) {
                    return Err(ProcessCode::BadSignature);
                }
                Ok(Validated {
                    account,
                    previous_balance,
                    new_balance: previous_balance,
                    representative: change.representative,
                    verified: VerifyStatus::Valid,
                    pending_add: None,
                    pending_take: None,
                })
            }
            Block::State(state) => {
                if state.account != account {
                    return Err(ProcessCode::BadSignature);
                }
                self.validate_state(tables, block, state, previous_balance, previous_representative, verified)
            }
            Block::Open(_) => Err(ProcessCode::BlockPosition),
        }
    }

    fn validate_state(
        &self,
        tables: &mut Tables,
        block: &Block,
        state: &shared_types::StateBlock,
        previous_balance: Amount,
        previous_representative: Account,
        verified: VerifyStatus,
    ) -> Result<Validated, ProcessCode> {
        let account = state.account;
        let is_epoch_candidate =
            state.balance == previous_balance && self.epochs.is_epoch_link(&state.link);

        if is_epoch_candidate {
            // Epoch upgrade: signed by the authority, changing nothing but
            // the account's epoch
            let epoch_verified = match verified {
                VerifyStatus::ValidEpoch => true,
                VerifyStatus::Valid | VerifyStatus::Unknown => self
                    .epochs
                    .signer(&state.link)
                    .map(|signer| block.verify_signature(&signer))
                    .unwrap_or(false),
            };
            if !epoch_verified {
                return Err(ProcessCode::BadSignature);
            }
            if state.representative != previous_representative {
                return Err(ProcessCode::RepresentativeMismatch);
            }
            return Ok(Validated {
                account,
                previous_balance,
                new_balance: previous_balance,
                representative: previous_representative,
                verified: VerifyStatus::ValidEpoch,
                pending_add: None,
                pending_take: None,
            });
        }

        if !self.verify_account_signature(block, &account, verified) {
            return Err(ProcessCode::BadSignature);
        }

        if state.balance < previous_balance {
            // Send: the link names the destination
            Ok(Validated {
                account,
                previous_balance,
                new_balance: state.balance,
                representative: state.representative,
                verified: VerifyStatus::Valid,
                pending_add: Some((state.link.into(), previous_balance - state.balance)),
                pending_take: None,
            })
        } else if state.balance > previous_balance {
            // Receive: the link names the source
            let source: BlockHash = state.link.into();
            let amount = self.receivable(tables, &account, &source)?;
            if state.balance != previous_balance + amount {
                return Err(ProcessCode::BalanceMismatch);
            }
            Ok(Validated {
                account,
                previous_balance,
                new_balance: state.balance,
                representative: state.representative,
                verified: VerifyStatus::Valid,
                pending_add: None,
                pending_take: Some(source),
            })
        } else {
            // No balance movement: representative change or no-op
            Ok(Validated {
                account,
                previous_balance,
                new_balance: state.balance,
                representative: state.representative,
                verified: VerifyStatus::Valid,
                pending_add: None,
                pending_take: None,
            })
        }
    }

    /// Amount receivable by `account` from `source`, or the gap /
    /// unreceivable rejection.
    fn receivable(
        &self,
        tables: &Tables,
        account: &Account,
        source: &BlockHash,
    ) -> Result<Amount, ProcessCode> {
        if !tables.blocks.contains_key(source) {
            return Err(ProcessCode::GapSource);
        }
        tables
            .pending
            .get(&(*account, *source))
            .map(|pending| pending.amount)
            .ok_or(ProcessCode::Unreceivable)
    }

    fn apply(&self, tables: &mut Tables, block: &Block, validated: &Validated) {
        let hash = block.hash();
        let block = Arc::new(block.clone());
        tables.successors.insert(block.qualified_root(), hash);
        tables.sidebands.insert(
            hash,
            Sideband {
                account: validated.account,
                balance: validated.new_balance,
                representative: validated.representative,
            },
        );
        if let Some((destination, amount)) = validated.pending_add {
            tables.pending.insert(
                (destination, hash),
                PendingInfo {
                    source: validated.account,
                    amount,
                },
            );
        }
        if let Some(source) = validated.pending_take {
            tables.pending.remove(&(validated.account, source));
            tables.receivers.insert(source, hash);
        }
        let entry = tables
            .accounts
            .entry(validated.account)
            .or_insert(AccountInfo {
                head: hash,
                representative: validated.representative,
                balance: validated.new_balance,
                block_count: 0,
            });
        entry.head = hash;
        entry.representative = validated.representative;
        entry.balance = validated.new_balance;
        entry.block_count += 1;
        tables.blocks.insert(hash, block);
    }

    /// Removes one head block, undoing its table effects. Returns the
    /// removed block.
    fn rollback_one(&self, tables: &mut Tables, hash: &BlockHash) -> Option<Arc<Block>> {
        let block = tables.blocks.remove(hash)?;
        let sideband = tables.sidebands.remove(hash)?;
        tables.successors.remove(&block.qualified_root());
        let previous_balance = previous_balance_of(&block, tables);

        if sideband.balance < previous_balance {
            // Undo a send: retract the pending entry, first unwinding any
            // receive that already consumed it
            if let Some(destination) = send_destination(&block) {
                if tables.pending.remove(&(destination, *hash)).is_none() {
                    if let Some(receiver) = tables.receivers.get(hash).copied() {
                        self.rollback_chain(tables, &receiver);
                        tables.pending.remove(&(destination, *hash));
                    }
                }
            }
        } else if sideband.balance > previous_balance {
            // Undo a receive: restore the pending entry it consumed
            if let Some(source) = consumed_source(&block) {
                if let Some(source_sideband) = tables.sidebands.get(&source) {
                    let source_account = source_sideband.account;
                    tables.pending.insert(
                        (sideband.account, source),
                        PendingInfo {
                            source: source_account,
                            amount: sideband.balance - previous_balance,
                        },
                    );
                }
                tables.receivers.remove(&source);
            }
        }

        // Reset the account head
        let previous = block.previous();
        if previous.is_zero() {
            tables.accounts.remove(&sideband.account);
        } else if let Some(previous_sideband) = tables.sidebands.get(&previous).cloned() {
            if let Some(entry) = tables.accounts.get_mut(&sideband.account) {
                entry.head = previous;
                entry.balance = previous_sideband.balance;
                entry.representative = previous_sideband.representative;
                entry.block_count = entry.block_count.saturating_sub(1);
            }
        }
        Some(block)
    }

    /// Rolls back from the account head down to and including `hash`,
    /// recursing into chains that received from rolled-back sends.
    fn rollback_chain(&self, tables: &mut Tables, hash: &BlockHash) -> Vec<Arc<Block>> {
        let mut rolled_back = Vec::new();
        let Some(account) = tables.sidebands.get(hash).map(|s| s.account) else {
            return rolled_back;
        };
        loop {
            let Some(head) = tables.accounts.get(&account).map(|info| info.head) else {
                break;
            };
            let done = head == *hash;
            match self.rollback_one(tables, &head) {
                Some(block) => rolled_back.push(block),
                None => break,
            }
            if done {
                break;
            }
        }
        rolled_back
    }
}

/// Destination account when `block` is send-shaped.
fn send_destination(block: &Block) -> Option<Account> {
    match block {
        Block::Send(send) => Some(send.destination),
        Block::State(state) => Some(state.link.into()),
        _ => None,
    }
}

/// Source hash when `block` is receive-shaped.
fn consumed_source(block: &Block) -> Option<BlockHash> {
    match block {
        Block::Open(open) => Some(open.source),
        Block::Receive(receive) => Some(receive.source),
        Block::State(state) => Some(state.link.into()),
        _ => None,
    }
}

fn previous_balance_of(block: &Block, tables: &Tables) -> Amount {
    let previous = block.previous();
    if previous.is_zero() {
        0
    } else {
        tables
            .sidebands
            .get(&previous)
            .map(|s| s.balance)
            .unwrap_or(0)
    }
}

impl Ledger<MemStore> for MemLedger {
    fn process(&self, txn: &mut MemTxn, block: &Block, verified: VerifyStatus) -> ProcessResult {
        debug_assert!(txn.writable);
        let mut tables = self.tables.write();
        match self.process_inner(&mut tables, block, verified) {
            Ok(validated) => {
                self.apply(&mut tables, block, &validated);
                progress(validated.account, validated.previous_balance, validated.verified)
            }
            Err(code) => {
                let mut result = outcome(code);
                // Keep the pre-verification verdict so gap entries stored
                // as unchecked skip a second signature batch
                if code != ProcessCode::BadSignature {
                    result.verified = verified;
                }
                result
            }
        }
    }

    fn successor(&self, _txn: &MemTxn, root: &QualifiedRoot) -> Option<Arc<Block>> {
        let tables = self.tables.read();
        let hash = tables.successors.get(root)?;
        tables.blocks.get(hash).cloned()
    }

    fn rollback(
        &self,
        txn: &mut MemTxn,
        hash: &BlockHash,
    ) -> Result<Vec<Arc<Block>>, LedgerError> {
        debug_assert!(txn.writable);
        let mut tables = self.tables.write();
        if !tables.blocks.contains_key(hash) {
            return Err(LedgerError::BlockNotFound(*hash));
        }
        Ok(self.rollback_chain(&mut tables, hash))
    }

    fn block_source(&self, _txn: &MemTxn, block: &Block) -> BlockHash {
        match block {
            Block::Open(open) => open.source,
            Block::Receive(receive) => receive.source,
            Block::State(state) => state.link.into(),
            _ => BlockHash::ZERO,
        }
    }

    fn is_epoch_link(&self, link: &Link) -> bool {
        self.epochs.is_epoch_link(link)
    }

    fn cache(&self) -> &LedgerCache {
        &self.cache
    }
}
