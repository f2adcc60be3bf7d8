//! Fundamental value types: hashes, accounts, roots, links, signatures and
//! amounts.
//!
//! All 32-byte identifiers share the same representation but are kept as
//! distinct newtypes so that an account can never silently stand in for a
//! block hash. Conversions that are meaningful on the block lattice (an
//! open block's root *is* its account) are provided explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw balance in indivisible units. The full supply fits in 128 bits.
pub type Amount = u128;

/// Total supply, held by the genesis account at the start of the lattice.
pub const GENESIS_AMOUNT: Amount = Amount::MAX;

macro_rules! bytes32_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), hex::encode(self.0))
            }
        }
    };
}

bytes32_newtype!(BlockHash, "Content address of a block (SHA-256 of its canonical encoding).");
bytes32_newtype!(Account, "An account: the ed25519 public key owning an account chain.");
bytes32_newtype!(Root, "Chain position a block builds on: the previous hash, or the account for a chain's first block.");
bytes32_newtype!(Link, "Multi-purpose reference field of state blocks: receive source, send destination, or an epoch sentinel.");

impl From<Account> for Root {
    fn from(account: Account) -> Self {
        Root(account.0)
    }
}

impl From<BlockHash> for Root {
    fn from(hash: BlockHash) -> Self {
        Root(hash.0)
    }
}

impl From<Link> for BlockHash {
    fn from(link: Link) -> Self {
        BlockHash(link.0)
    }
}

impl From<Link> for Account {
    fn from(link: Link) -> Self {
        Account(link.0)
    }
}

/// Ed25519 signature over a block hash.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SignatureVisitor;

        impl<'de> serde::de::Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("64 bytes")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let arr: [u8; 64] = v.try_into().map_err(|_| {
                    E::invalid_length(v.len(), &self)
                })?;
                Ok(Signature(arr))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_bytes(&v)
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

impl Signature {
    pub const ZERO: Self = Self([0u8; 64]);

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

/// Election key: a root qualified by the exact predecessor hash.
///
/// Two blocks are in conflict exactly when their qualified roots are equal,
/// which is how forks are keyed by the election machinery.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct QualifiedRoot {
    pub root: Root,
    pub previous: BlockHash,
}

impl QualifiedRoot {
    pub fn new(root: Root, previous: BlockHash) -> Self {
        Self { root, previous }
    }
}

/// Account that provably cannot sign: sends to it destroy funds, and an open
/// block for it must be rejected.
pub const BURN_ACCOUNT: Account = Account::ZERO;
