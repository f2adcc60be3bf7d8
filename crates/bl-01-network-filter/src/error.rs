//! Error types for the network filter subsystem.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter capacity must be nonzero")]
    ZeroCapacity,
}
