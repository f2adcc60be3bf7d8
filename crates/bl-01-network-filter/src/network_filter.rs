//! Probabilistic directed-map duplicate filter.
//!
//! Each slot of a fixed-size array holds exactly one 128-bit digest. An
//! incoming byte range is hashed with keyed SipHash-2/4, mapped to a slot by
//! `digest mod N`, and compared against the occupant. A match means the
//! bytes were seen recently; a mismatch overwrites the slot, treating the
//! previous occupant as likely stale.
//!
//! The hash key is drawn from the operating system's entropy source at
//! construction, so a remote peer cannot precompute colliding payloads.

use crate::error::FilterError;
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use siphasher::sip128::{Hasher128, SipHasher24};
use std::hash::Hasher;

/// 128-bit keyed SipHash output identifying a byte range.
pub type Digest = u128;

pub struct NetworkFilter {
    items: Mutex<Vec<Digest>>,
    key: [u8; 16],
}

impl NetworkFilter {
    /// Creates a filter with `size` slots. The slot array never changes
    /// size afterwards.
    pub fn new(size: usize) -> Result<Self, FilterError> {
        if size == 0 {
            return Err(FilterError::ZeroCapacity);
        }
        let mut key = [0u8; 16];
        OsRng.fill_bytes(&mut key);
        Ok(Self {
            items: Mutex::new(vec![0; size]),
            key,
        })
    }

    /// Inserts the digest of `bytes` and reports whether it was already
    /// present. The digest is returned so callers can later [`clear`] the
    /// entry without re-hashing.
    ///
    /// [`clear`]: Self::clear_digest
    pub fn apply(&self, bytes: &[u8]) -> (bool, Digest) {
        // Hash before taking the lock
        let digest = self.hash(bytes);
        let mut items = self.items.lock();
        let index = (digest % items.len() as u128) as usize;
        let element = &mut items[index];
        let existed = *element == digest;
        if !existed {
            // Replace likely old element with the new one
            *element = digest;
        }
        (existed, digest)
    }

    /// Zeros the slot for `digest` iff it currently holds exactly `digest`.
    pub fn clear_digest(&self, digest: Digest) {
        let mut items = self.items.lock();
        let index = (digest % items.len() as u128) as usize;
        if items[index] == digest {
            items[index] = 0;
        }
    }

    /// Clears the entry for a byte range, hashing it first.
    pub fn clear_bytes(&self, bytes: &[u8]) {
        self.clear_digest(self.hash(bytes));
    }

    pub fn clear_many(&self, digests: &[Digest]) {
        let mut items = self.items.lock();
        let len = items.len() as u128;
        for digest in digests {
            let index = (digest % len) as usize;
            if items[index] == *digest {
                items[index] = 0;
            }
        }
    }

    /// Zeros every slot, keeping the capacity.
    pub fn clear_all(&self) {
        let mut items = self.items.lock();
        let len = items.len();
        items.clear();
        items.resize(len, 0);
    }

    /// Snapshot of the slot array.
    pub fn copy(&self) -> Vec<Digest> {
        self.items.lock().clone()
    }

    /// Keyed SipHash-2/4-128 of `bytes`. Pure; acquires no lock.
    pub fn hash(&self, bytes: &[u8]) -> Digest {
        let mut hasher = SipHasher24::new_with_key(&self.key);
        hasher.write(bytes);
        hasher.finish128().as_u128()
    }
}
