//! # Shared Types Crate
//!
//! Domain entities shared by every ingestion subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types live here.
//! - **Content addressing**: blocks are immutable and identified by the
//!   SHA-256 hash of their canonical field encoding. Signatures and work
//!   nonces are excluded from the hash so that re-signing or re-working a
//!   block never changes its identity.
//! - **No I/O**: this crate performs no network or disk access.

pub mod block;
pub mod entities;
pub mod epochs;
pub mod errors;
pub mod keys;
pub mod messages;
pub mod processing;
pub mod work;

pub use block::*;
pub use entities::*;
pub use epochs::Epochs;
pub use errors::*;
pub use keys::KeyPair;
pub use messages::*;
pub use processing::*;
