//! # BL-02 Transport
//!
//! Egress backpressure and channel bookkeeping for the network layer.
//!
//! - [`BandwidthLimiter`]: drops outgoing messages that would push the
//!   trended egress rate past a configured limit.
//! - [`DropPolicy`]: lets callers flag messages that must bypass the
//!   limiter (initial block floods, confirmations).
//! - [`ChannelDirectory`]: endpoint-keyed registry of peer channels with
//!   node-id based replacement on handshake.
//!
//! The sockets themselves are owned by the node's I/O layer; nothing in
//! this crate performs network access.

pub mod bandwidth;
pub mod channels;

pub use bandwidth::BandwidthLimiter;
pub use channels::{Channel, ChannelDirectory};

/// Whether a message may be dropped by the bandwidth limiter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DropPolicy {
    /// Best-effort: ask the limiter, drop when over budget.
    Limiter,
    /// Essential traffic: send regardless of the current rate.
    NoLimiterDrop,
}
