//! Batching signature pre-verification.
//!
//! State and open blocks are verified before they reach the ledger so that
//! the expensive ed25519 checks run outside the write transaction, batched
//! and fanned out across cores. Verdicts flow back through a callback that
//! re-enqueues each block with its [`VerifyStatus`].
//!
//! Epoch-shaped blocks are checked against the epoch authority. A failed
//! epoch check is *not* final: the same bytes may be a regular state block
//! whose link merely collides with the sentinel, so the callback re-admits
//! it as `Unknown` for the ledger to decide.

use parking_lot::{Condvar, Mutex, RwLock};
use rayon::prelude::*;
use shared_types::{Epochs, UncheckedInfo};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::trace;

/// Receives each verified batch with one verdict per item, in order.
pub type VerifiedCallback = Box<dyn Fn(Vec<UncheckedInfo>, Vec<bool>) + Send + Sync>;

/// Invoked when the verifier transitions from active to idle. Used by the
/// processor's flush to close its wake-up race; see the discipline in
/// [`crate::processor::BlockProcessor::flush`].
pub type InactiveCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    verified: Option<VerifiedCallback>,
    inactive: Option<InactiveCallback>,
}

struct State {
    queue: VecDeque<UncheckedInfo>,
    active: bool,
    stopped: bool,
}

struct Inner {
    state: Mutex<State>,
    condvar: Condvar,
    callbacks: RwLock<Callbacks>,
    epochs: Arc<Epochs>,
    max_batch: usize,
}

pub struct SignatureVerifier {
    inner: Arc<Inner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SignatureVerifier {
    pub fn new(epochs: Arc<Epochs>, max_batch: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    active: false,
                    stopped: false,
                }),
                condvar: Condvar::new(),
                callbacks: RwLock::new(Callbacks::default()),
                epochs,
                max_batch: max_batch.max(1),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Wires the verdict sink and the inactive notification, then starts
    /// the verification thread. Must be called exactly once.
    pub fn start(&self, verified: VerifiedCallback, inactive: InactiveCallback) {
        {
            let mut callbacks = self.inner.callbacks.write();
            callbacks.verified = Some(verified);
            callbacks.inactive = Some(inactive);
        }
        let inner = self.inner.clone();
        let handle = std::thread::Builder::new()
            .name("sig verifier".into())
            .spawn(move || run(inner))
            .expect("failed to spawn verifier thread");
        *self.thread.lock() = Some(handle);
    }

    pub fn add(&self, info: UncheckedInfo) {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.queue.push_back(info);
        }
        self.inner.condvar.notify_all();
    }

    pub fn size(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Blocks until the queue is drained and the worker is idle.
    pub fn flush(&self) {
        let mut state = self.inner.state.lock();
        while !state.stopped && (state.active || !state.queue.is_empty()) {
            self.inner.condvar.wait(&mut state);
        }
    }

    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.inner.condvar.notify_all();
        if let Some(handle) = self.thread.lock().take() {
            handle.join().ok();
        }
    }
}

impl Drop for SignatureVerifier {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(inner: Arc<Inner>) {
    let mut state = inner.state.lock();
    while !state.stopped {
        if state.queue.is_empty() {
            inner.condvar.wait(&mut state);
            continue;
        }
        state.active = true;
        let take = state.queue.len().min(inner.max_batch);
        let batch: Vec<UncheckedInfo> = state.queue.drain(..take).collect();
        drop(state);

        let verifications = verify_batch(&inner.epochs, &batch);
        trace!(
            batch = batch.len(),
            valid = verifications.iter().filter(|v| **v).count(),
            "verified signature batch"
        );
        if let Some(callback) = inner.callbacks.read().verified.as_ref() {
            callback(batch, verifications);
        }

        state = inner.state.lock();
        if state.queue.is_empty() {
            state.active = false;
            drop(state);
            inner.condvar.notify_all();
            if let Some(callback) = inner.callbacks.read().inactive.as_ref() {
                callback();
            }
            state = inner.state.lock();
        }
    }
}

/// One verdict per item. The expected signer is the epoch authority for
/// epoch-shaped state blocks, otherwise the account hint or the block's
/// own account field.
fn verify_batch(epochs: &Epochs, batch: &[UncheckedInfo]) -> Vec<bool> {
    batch
        .par_iter()
        .map(|info| {
            let block = info.block.as_ref();
            let link = block.link();
            let signer = if !link.is_zero() && epochs.is_epoch_link(&link) {
                epochs.signer(&link)
            } else if !info.account.is_zero() {
                Some(info.account)
            } else {
                block.account_field()
            };
            match signer {
                Some(signer) => block.verify_signature(&signer),
                None => false,
            }
        })
        .collect()
}
