//! # BL-03 Confirmation Solicitor
//!
//! Batches confirmation requests and winner broadcasts for active
//! elections, once per election-scheduler pass.
//!
//! ## Cycle
//!
//! `prepare(representatives)` → any number of `add` / `broadcast` calls →
//! `flush()`. The solicitor is single-threaded by design: the election
//! scheduler drives one full cycle at a time, so the state machine guards
//! against misuse rather than against concurrency.
//!
//! ## Traffic shaping
//!
//! Requests are directed at representatives that have not voted yet, which
//! focuses consensus traffic on the peers able to advance quorum. Winner
//! broadcasts are capped per cycle to prevent amplification, with a 50 %
//! random flood for propagation to non-voters.

pub mod ports;
pub mod solicitor;

pub use ports::{ElectionView, FloodNetwork, MessageSink, Representative};
pub use solicitor::{ConfirmationSolicitor, SolicitorConfig, SolicitorError};
