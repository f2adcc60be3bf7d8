//! Job tracking and local generation.

use crate::request::{WorkError, WorkRequest};
use parking_lot::Mutex;
use rand::Rng;
use shared_types::{work, Root};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// One in-flight generation job. The manager's index holds this weakly;
/// the generation thread holds the only strong reference, so a finished
/// job disappears from upgrade() without touching the index.
struct WorkJob {
    root: Root,
    cancelled: AtomicBool,
}

impl WorkJob {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

struct Items {
    by_id: HashMap<u64, Entry>,
    by_root: HashMap<Root, Vec<u64>>,
}

struct Entry {
    root: Root,
    job: Weak<WorkJob>,
}

impl Items {
    fn erase(&mut self, identifier: u64) {
        if let Some(entry) = self.by_id.remove(&identifier) {
            if let Some(ids) = self.by_root.get_mut(&entry.root) {
                ids.retain(|id| *id != identifier);
                if ids.is_empty() {
                    self.by_root.remove(&entry.root);
                }
            }
        }
    }
}

pub struct DistributedWorkManager {
    items: Arc<Mutex<Items>>,
    counter: AtomicU64,
    stopped: AtomicBool,
    /// Whether this node may generate work on its own threads.
    local_generation: bool,
}

impl DistributedWorkManager {
    pub fn new(local_generation: bool) -> Self {
        Self {
            items: Arc::new(Mutex::new(Items {
                by_id: HashMap::new(),
                by_root: HashMap::new(),
            })),
            counter: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            local_generation,
        }
    }

    /// Registers and starts a generation job. The job erases itself from
    /// the index when its thread completes; `cancel` and `stop` erase it
    /// earlier.
    pub fn make(&self, request: WorkRequest) -> Result<(), WorkError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WorkError::Stopped);
        }
        if !self.local_generation && request.peers.is_empty() {
            return Err(WorkError::GenerationDisabled);
        }
        let identifier = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Arc::new(WorkJob {
            root: request.root,
            cancelled: AtomicBool::new(false),
        });
        {
            let mut items = self.items.lock();
            items.by_id.insert(
                identifier,
                Entry {
                    root: request.root,
                    job: Arc::downgrade(&job),
                },
            );
            items.by_root.entry(request.root).or_default().push(identifier);
        }
        trace!(identifier, root = %request.root, "starting work generation");
        let items_weak = Arc::downgrade(&self.items);
        let difficulty = request.difficulty;
        let mut callback = request.callback;
        std::thread::spawn(move || {
            let nonce = generate_local(&job, difficulty);
            if let Some(callback) = callback.take() {
                callback(nonce);
            }
            if let Some(items) = items_weak.upgrade() {
                // A canceller holding the lock will erase this entry
                // itself; skipping here avoids deadlocking against it.
                if let Some(mut items) = items.try_lock() {
                    items.erase(identifier);
                }
            }
        });
        Ok(())
    }

    /// Cancels and erases every job targeting `root`.
    pub fn cancel(&self, root: &Root) {
        let mut items = self.items.lock();
        if let Some(ids) = items.by_root.remove(root) {
            debug!(%root, jobs = ids.len(), "cancelling work");
            for identifier in ids {
                if let Some(entry) = items.by_id.remove(&identifier) {
                    // An upgrade failure means the job already finished
                    if let Some(job) = entry.job.upgrade() {
                        job.cancel();
                    }
                }
            }
        }
    }

    /// Cancels everything and refuses further jobs. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let roots: Vec<Root> = self.items.lock().by_root.keys().copied().collect();
            for root in roots {
                self.cancel(&root);
            }
            let mut items = self.items.lock();
            items.by_id.clear();
            items.by_root.clear();
        }
    }

    pub fn size(&self) -> usize {
        self.items.lock().by_id.len()
    }
}

impl Drop for DistributedWorkManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sequential nonce search from a random starting point, checking the
/// cancellation flag every few thousand candidates.
fn generate_local(job: &WorkJob, difficulty: u64) -> Option<u64> {
    let mut nonce: u64 = rand::thread_rng().gen();
    loop {
        for _ in 0..10_000 {
            if work::work_valid(&job.root, nonce, difficulty) {
                return Some(nonce);
            }
            nonce = nonce.wrapping_add(1);
        }
        if job.cancelled.load(Ordering::Relaxed) {
            return None;
        }
    }
}
