//! # BL-01 Network Filter
//!
//! Duplicate suppression for inbound network traffic.
//!
//! Two filters with different trade-offs:
//!
//! - [`NetworkFilter`]: probabilistic directed-map cache over keyed
//!   SipHash-2/4-128. Bounded memory, O(1) apply and clear. False negatives
//!   (a unique packet marked duplicate) require a full 128-bit SipHash
//!   collision; false positives (a duplicate marked unique) occur when the
//!   slot was overwritten in between and shrink with filter size.
//! - [`RecentSet`]: exact bounded set over block hashes with LRU eviction,
//!   for callers that cannot tolerate false negatives.
//!
//! Both are thread-safe; all mutation happens under an internal lock.

pub mod error;
pub mod network_filter;
pub mod recent_set;

pub use error::FilterError;
pub use network_filter::{Digest, NetworkFilter};
pub use recent_set::RecentSet;
