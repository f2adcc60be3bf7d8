//! Egress bandwidth limiting with trended smoothing.
//!
//! The limiter samples the per-period byte count into a twenty-slot ring
//! (20 × 50 ms = one second of history) and compares the sum of those
//! samples, the *trended rate*, against the configured limit. Trending
//! smooths bursts without starving after a single idle period. A completed
//! period's sample is normalized by the true elapsed time so that scheduler
//! jitter cannot make a long quiet stretch look like low utilization.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Sampling period for one ring slot.
const PERIOD: Duration = Duration::from_millis(50);

/// Number of periods in the trend window.
const BUFFER_SIZE: usize = 20;

pub struct BandwidthLimiter {
    /// Byte budget per trend window. Zero disables limiting.
    limit: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    /// End of the period currently being accumulated.
    next_trend: Instant,
    /// Per-period byte counts, oldest overwritten first.
    rate_buffer: [usize; BUFFER_SIZE],
    cursor: usize,
    /// Bytes accepted in the current period.
    rate: usize,
    /// Sum of `rate_buffer`.
    trended_rate: usize,
}

impl BandwidthLimiter {
    /// Creates a limiter enforcing `limit` bytes per second. A zero limit
    /// means unbounded.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            inner: Mutex::new(Inner {
                next_trend: Instant::now() + PERIOD,
                rate_buffer: [0; BUFFER_SIZE],
                cursor: 0,
                rate: 0,
                trended_rate: 0,
            }),
        }
    }

    /// Decides whether an outgoing message of `message_size` bytes should
    /// be dropped. Accepted messages are charged to the current period.
    pub fn should_drop(&self, message_size: usize) -> bool {
        if self.limit == 0 {
            return false;
        }
        let mut inner = self.inner.lock();
        // A message bigger than one period's fair share can never be
        // absorbed smoothly; drop it outright.
        let result = message_size > self.limit / BUFFER_SIZE
            || inner.trended_rate + message_size > self.limit;
        if !result {
            inner.rate += message_size;
        }
        let now = Instant::now();
        if inner.next_trend < now {
            // Normalize in case more time than one period has passed
            let overshoot = now - inner.next_trend;
            let window_millis = (overshoot + PERIOD).as_millis().max(1);
            let sample = (inner.rate as u128 * PERIOD.as_millis() / window_millis) as usize;
            let cursor = inner.cursor;
            inner.rate_buffer[cursor] = sample;
            inner.cursor = (cursor + 1) % BUFFER_SIZE;
            inner.trended_rate = inner.rate_buffer.iter().sum();
            inner.rate = 0;
            inner.next_trend = now + PERIOD;
        }
        result
    }

    /// Observed trended rate: bytes accepted over the last full window.
    pub fn rate(&self) -> usize {
        self.inner.lock().trended_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_never_drops() {
        let limiter = BandwidthLimiter::new(0);
        assert!(!limiter.should_drop(0));
        assert!(!limiter.should_drop(1024));
        assert!(!limiter.should_drop(usize::MAX));
    }

    #[test]
    fn oversized_message_always_drops() {
        let limiter = BandwidthLimiter::new(1000);
        // Fair share per period is 1000 / 20 = 50
        assert!(limiter.should_drop(51), "message above limit/20 must drop");
        assert!(!limiter.should_drop(50), "message at the fair share must pass");
    }

    #[test]
    fn accepted_bytes_feed_the_trend() {
        let limiter = BandwidthLimiter::new(10_000);
        for _ in 0..4 {
            assert!(!limiter.should_drop(500));
        }
        assert_eq!(limiter.rate(), 0, "trend updates only at period boundaries");
        std::thread::sleep(PERIOD + Duration::from_millis(10));
        // This call rolls the period and publishes the sample
        let _ = limiter.should_drop(1);
        assert!(limiter.rate() > 0, "completed period must contribute to the trend");
        assert!(
            limiter.rate() <= 2000,
            "normalization must never inflate the sample beyond the accepted bytes"
        );
    }

    #[test]
    fn trended_rate_saturates_the_limit() {
        let limiter = BandwidthLimiter::new(1000);
        std::thread::sleep(PERIOD + Duration::from_millis(10));
        // Roll period with ~1000 accepted bytes spread over fair-share messages
        for _ in 0..20 {
            let _ = limiter.should_drop(50);
        }
        std::thread::sleep(Duration::from_millis(5));
        let _ = limiter.should_drop(1);
        // Trend now holds most of the limit; a fair-share message must drop
        if limiter.rate() + 50 > 1000 {
            assert!(limiter.should_drop(50), "trend at the limit must reject further traffic");
        }
    }
}
