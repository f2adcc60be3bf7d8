//! Work request description and errors.

use shared_types::{Account, Root};
use thiserror::Error;

/// Proof-of-work algorithm version.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum WorkVersion {
    #[default]
    Work1,
}

/// Completion callback: `Some(nonce)` on success, `None` when cancelled.
pub type WorkCallback = Box<dyn FnOnce(Option<u64>) + Send>;

/// Everything needed to generate work for one root.
pub struct WorkRequest {
    pub version: WorkVersion,
    pub root: Root,
    pub difficulty: u64,
    /// Account the work is for, if known. Only used for reporting.
    pub account: Option<Account>,
    pub callback: Option<WorkCallback>,
    /// Remote work peers to solicit, as `(host, port)`. Recorded for the
    /// distributed backends; local generation ignores them.
    pub peers: Vec<(String, u16)>,
}

impl WorkRequest {
    pub fn new(root: Root, difficulty: u64) -> Self {
        Self {
            version: WorkVersion::Work1,
            root,
            difficulty,
            account: None,
            callback: None,
            peers: Vec::new(),
        }
    }

    pub fn with_callback(mut self, callback: WorkCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn for_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("work manager is stopped")]
    Stopped,
    #[error("work generation is disabled and no work peers are configured")]
    GenerationDisabled,
}
