//! # Block-Lattice Ingestion Test Suite
//!
//! Unified test crate for cross-subsystem scenarios.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Node harness: filter + processor + recorders
//! └── integration/      # Cross-subsystem choreography
//!     ├── network_filter.rs   # Duplicate suppression over wire bytes
//!     ├── ingestion.rs        # Filter → processor → ledger flows
//!     └── solicitation.rs     # Elections, solicitor, transport
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bl-tests
//! cargo test -p bl-tests integration::ingestion::
//! ```

pub mod fixtures;

#[cfg(test)]
mod integration;
