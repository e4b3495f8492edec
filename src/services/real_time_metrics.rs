use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_WINDOW: usize = 1000;

/// One processor call as seen by the observers. Calls that never reached the
/// processor carry a zero `call_time`; failed transport calls carry status 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSample {
    pub payment_id: Uuid,
    pub transaction_id: Uuid,
    pub call_time: Duration,
    pub status: u16,
}

/// Fire-and-forget sink for request samples. Implementations must not block.
pub trait RequestObserver: Send + Sync {
    fn observe(&self, sample: &RequestSample);
}

/// Latencies of the most recent processor calls.
pub struct LatencyStats {
    latencies: Mutex<VecDeque<Duration>>,
    capacity: usize,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }
}

impl LatencyStats {
    pub fn with_window(capacity: usize) -> Self {
        Self {
            latencies: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    pub fn add_time(&self, latency: Duration) {
        let mut latencies = self.latencies.lock();
        latencies.push_back(latency);
        if latencies.len() > self.capacity {
            latencies.pop_front();
        }
    }

    /// Nearest-rank percentile, `p` in `0.0..=1.0`.
    pub fn percentile(&self, p: f64) -> Duration {
        let mut sorted: Vec<_> = self.latencies.lock().iter().copied().collect();
        if sorted.is_empty() {
            return Duration::ZERO;
        }
        sorted.sort();
        let rank = (sorted.len() as f64 * p.clamp(0.0, 1.0)).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
    }

    pub fn p95(&self) -> Duration {
        self.percentile(0.95)
    }

    pub fn len(&self) -> usize {
        self.latencies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RequestObserver for LatencyStats {
    fn observe(&self, sample: &RequestSample) {
        // only calls that actually went out say something about the processor
        if sample.status != 0 {
            self.add_time(sample.call_time);
        }
    }
}
