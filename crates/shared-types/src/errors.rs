//! Error types shared across subsystems.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message body ({len} bytes): {source}")]
    Malformed {
        len: usize,
        #[source]
        source: bincode::Error,
    },
}
