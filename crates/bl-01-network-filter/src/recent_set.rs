//! Exact bounded duplicate set over block hashes.

use crate::error::FilterError;
use lru::LruCache;
use parking_lot::Mutex;
use shared_types::BlockHash;
use std::num::NonZeroUsize;

/// Deterministic companion to the probabilistic filter: remembers the most
/// recent `capacity` block hashes exactly, evicting the oldest when full.
/// Used where a false negative is unacceptable, at the cost of storing full
/// hashes.
pub struct RecentSet {
    items: Mutex<LruCache<BlockHash, ()>>,
}

impl RecentSet {
    pub fn new(capacity: usize) -> Result<Self, FilterError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(FilterError::ZeroCapacity)?;
        Ok(Self {
            items: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Records `hash` and reports whether it was already present. A present
    /// hash is refreshed to most-recently-used.
    pub fn insert(&self, hash: BlockHash) -> bool {
        let mut items = self.items.lock();
        let existed = items.get(&hash).is_some();
        if !existed {
            items.put(hash, ());
        }
        existed
    }

    /// Removes `hash`, reporting whether it was present.
    pub fn erase(&self, hash: &BlockHash) -> bool {
        self.items.lock().pop(hash).is_some()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.items.lock().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
