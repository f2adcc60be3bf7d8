//! The block model.
//!
//! Five block variants make up an account chain. The four legacy variants
//! (`send`, `open`, `receive`, `change`) each mutate one aspect of an
//! account; the `state` variant is the generic form carrying the full
//! account state and covers all four operations through its `link` field.
//!
//! A block's hash covers its semantic fields only. The signature is computed
//! over the hash, and the proof-of-work nonce is exterior to both so that
//! work can be recomputed without invalidating the signature.

use crate::entities::{Account, Amount, BlockHash, Link, QualifiedRoot, Root, Signature};
use crate::keys::{self, KeyPair};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum BlockType {
    Send,
    Open,
    Receive,
    Change,
    State,
}

/// Moves funds out of an account chain.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SendBlock {
    pub previous: BlockHash,
    pub destination: Account,
    pub balance: Amount,
    pub signature: Signature,
    pub work: u64,
}

/// First block of an account chain, receiving from a send.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct OpenBlock {
    pub source: BlockHash,
    pub representative: Account,
    pub account: Account,
    pub signature: Signature,
    pub work: u64,
}

/// Receives previously sent funds into an existing chain.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ReceiveBlock {
    pub previous: BlockHash,
    pub source: BlockHash,
    pub signature: Signature,
    pub work: u64,
}

/// Re-delegates voting weight to a different representative.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChangeBlock {
    pub previous: BlockHash,
    pub representative: Account,
    pub signature: Signature,
    pub work: u64,
}

/// Generic block carrying the full resulting account state.
///
/// The `link` field is interpreted by balance delta: a decrease makes it a
/// destination account, an increase makes it a source hash, and an
/// unchanged balance with a recognized epoch sentinel makes this an epoch
/// upgrade block signed by the epoch authority.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StateBlock {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    pub link: Link,
    pub signature: Signature,
    pub work: u64,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Block {
    Send(SendBlock),
    Open(OpenBlock),
    Receive(ReceiveBlock),
    Change(ChangeBlock),
    State(StateBlock),
}

impl SendBlock {
    pub fn new(
        previous: BlockHash,
        destination: Account,
        balance: Amount,
        key: &KeyPair,
        work: u64,
    ) -> Self {
        let mut block = Self {
            previous,
            destination,
            balance,
            signature: Signature::ZERO,
            work,
        };
        block.signature = key.sign(Block::Send(block.clone()).hash().as_bytes());
        block
    }
}

impl OpenBlock {
    pub fn new(
        source: BlockHash,
        representative: Account,
        account: Account,
        key: &KeyPair,
        work: u64,
    ) -> Self {
        let mut block = Self {
            source,
            representative,
            account,
            signature: Signature::ZERO,
            work,
        };
        block.signature = key.sign(Block::Open(block.clone()).hash().as_bytes());
        block
    }
}

impl ReceiveBlock {
    pub fn new(previous: BlockHash, source: BlockHash, key: &KeyPair, work: u64) -> Self {
        let mut block = Self {
            previous,
            source,
            signature: Signature::ZERO,
            work,
        };
        block.signature = key.sign(Block::Receive(block.clone()).hash().as_bytes());
        block
    }
}

impl ChangeBlock {
    pub fn new(previous: BlockHash, representative: Account, key: &KeyPair, work: u64) -> Self {
        let mut block = Self {
            previous,
            representative,
            signature: Signature::ZERO,
            work,
        };
        block.signature = key.sign(Block::Change(block.clone()).hash().as_bytes());
        block
    }
}

impl StateBlock {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account: Account,
        previous: BlockHash,
        representative: Account,
        balance: Amount,
        link: Link,
        key: &KeyPair,
        work: u64,
    ) -> Self {
        let mut block = Self {
            account,
            previous,
            representative,
            balance,
            link,
            signature: Signature::ZERO,
            work,
        };
        block.signature = key.sign(Block::State(block.clone()).hash().as_bytes());
        block
    }
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Send(_) => BlockType::Send,
            Block::Open(_) => BlockType::Open,
            Block::Receive(_) => BlockType::Receive,
            Block::Change(_) => BlockType::Change,
            Block::State(_) => BlockType::State,
        }
    }

    /// Content address: SHA-256 over the type tag and semantic fields.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        match self {
            Block::Send(b) => {
                hasher.update([0u8]);
                hasher.update(b.previous.as_bytes());
                hasher.update(b.destination.as_bytes());
                hasher.update(b.balance.to_le_bytes());
            }
            Block::Open(b) => {
                hasher.update([1u8]);
                hasher.update(b.source.as_bytes());
                hasher.update(b.representative.as_bytes());
                hasher.update(b.account.as_bytes());
            }
            Block::Receive(b) => {
                hasher.update([2u8]);
                hasher.update(b.previous.as_bytes());
                hasher.update(b.source.as_bytes());
            }
            Block::Change(b) => {
                hasher.update([3u8]);
                hasher.update(b.previous.as_bytes());
                hasher.update(b.representative.as_bytes());
            }
            Block::State(b) => {
                hasher.update([4u8]);
                hasher.update(b.account.as_bytes());
                hasher.update(b.previous.as_bytes());
                hasher.update(b.representative.as_bytes());
                hasher.update(b.balance.to_le_bytes());
                hasher.update(b.link.as_bytes());
            }
        }
        BlockHash(hasher.finalize().into())
    }

    /// Predecessor within the account chain. Zero for chain-opening blocks.
    pub fn previous(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.previous,
            Block::Open(_) => BlockHash::ZERO,
            Block::Receive(b) => b.previous,
            Block::Change(b) => b.previous,
            Block::State(b) => b.previous,
        }
    }

    /// Chain position this block contends for: the previous hash, or the
    /// account itself when this block opens the chain.
    pub fn root(&self) -> Root {
        match self {
            Block::Open(b) => b.account.into(),
            Block::State(b) if b.previous.is_zero() => b.account.into(),
            _ => self.previous().into(),
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous())
    }

    /// Cross-chain reference consumed by receives. `None` for variants whose
    /// source interpretation is the ledger's responsibility (state blocks).
    pub fn source(&self) -> Option<BlockHash> {
        match self {
            Block::Open(b) => Some(b.source),
            Block::Receive(b) => Some(b.source),
            _ => None,
        }
    }

    pub fn link(&self) -> Link {
        match self {
            Block::State(b) => b.link,
            _ => Link::ZERO,
        }
    }

    /// Account stated in the block itself, for variants that carry one.
    pub fn account_field(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.account),
            Block::State(b) => Some(b.account),
            _ => None,
        }
    }

    pub fn representative(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.representative),
            Block::Change(b) => Some(b.representative),
            Block::State(b) => Some(b.representative),
            _ => None,
        }
    }

    pub fn balance_field(&self) -> Option<Amount> {
        match self {
            Block::Send(b) => Some(b.balance),
            Block::State(b) => Some(b.balance),
            _ => None,
        }
    }

    pub fn work(&self) -> u64 {
        match self {
            Block::Send(b) => b.work,
            Block::Open(b) => b.work,
            Block::Receive(b) => b.work,
            Block::Change(b) => b.work,
            Block::State(b) => b.work,
        }
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Block::Send(b) => &b.signature,
            Block::Open(b) => &b.signature,
            Block::Receive(b) => &b.signature,
            Block::Change(b) => &b.signature,
            Block::State(b) => &b.signature,
        }
    }

    /// Checks the block's signature against `signer`.
    pub fn verify_signature(&self, signer: &Account) -> bool {
        keys::verify(signer, self.hash().as_bytes(), self.signature())
    }
}
