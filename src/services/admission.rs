use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Caps how fast attempts are dispatched to the processor.
///
/// `acquire` resolves once a slot has been granted. Waiting suspends the task;
/// it never parks a runtime worker.
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    async fn acquire(&self);
}

/// Strategy selected in the account file's `[gate]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum GateStrategy {
    FixedWindow {
        #[serde(default = "default_window_ms")]
        window_ms: u64,
    },
    TokenBucket {
        #[serde(default)]
        burst: Option<u32>,
    },
    LeakingBucket {
        #[serde(default = "default_window_ms")]
        window_ms: u64,
    },
}

fn default_window_ms() -> u64 {
    1000
}

impl Default for GateStrategy {
    fn default() -> Self {
        GateStrategy::FixedWindow {
            window_ms: default_window_ms(),
        }
    }
}

impl GateStrategy {
    /// Builds a gate admitting `rate_per_sec` calls per second.
    pub fn build(&self, rate_per_sec: u32) -> Arc<dyn AdmissionGate> {
        let rate = rate_per_sec.max(1);
        match *self {
            GateStrategy::FixedWindow { window_ms } => {
                let window = Duration::from_millis(window_ms.max(1));
                // rate is per second; scale it to the configured window
                let per_window = ((rate as u128 * window.as_millis()) / 1000)
                    .clamp(1, u32::MAX as u128) as u32;
                Arc::new(FixedWindowGate::new(per_window, window))
            }
            GateStrategy::TokenBucket { burst } => {
                Arc::new(TokenBucketGate::new(rate, burst.unwrap_or(rate)))
            }
            GateStrategy::LeakingBucket { window_ms } => Arc::new(LeakingBucketGate::new(
                rate,
                Duration::from_millis(window_ms.max(1)),
            )),
        }
    }
}

struct WindowState {
    started: Instant,
    used: u32,
}

/// Admits `limit` calls per window; the window restarts on the first call after
/// it has elapsed.
pub struct FixedWindowGate {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl FixedWindowGate {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            state: Mutex::new(WindowState {
                started: Instant::now(),
                used: 0,
            }),
        }
    }
}

#[async_trait]
impl AdmissionGate for FixedWindowGate {
    async fn acquire(&self) {
        loop {
            let window_end = {
                let mut state = self.state.lock();
                let now = Instant::now();
                if now.duration_since(state.started) >= self.window {
                    state.started = now;
                    state.used = 0;
                }
                if state.used < self.limit {
                    state.used += 1;
                    return;
                }
                state.started + self.window
            };
            sleep_until(window_end).await;
        }
    }
}

struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

/// Refills at `rate` tokens per second up to `capacity`; each call takes one.
pub struct TokenBucketGate {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl TokenBucketGate {
    pub fn new(rate: u32, capacity: u32) -> Self {
        let capacity = capacity.max(1) as f64;
        Self {
            rate: rate.max(1) as f64,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }
}

#[async_trait]
impl AdmissionGate for TokenBucketGate {
    async fn acquire(&self) {
        loop {
            let ready_at = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.refilled_at = now;
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                now + Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };
            sleep_until(ready_at).await;
        }
    }
}

/// Lets callers through one at a time, evenly spaced `window / rate` apart.
pub struct LeakingBucketGate {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl LeakingBucketGate {
    pub fn new(rate: u32, window: Duration) -> Self {
        Self {
            interval: window / rate.max(1),
            next_slot: Mutex::new(Instant::now()),
        }
    }
}

#[async_trait]
impl AdmissionGate for LeakingBucketGate {
    async fn acquire(&self) {
        let slot = {
            let mut next_slot = self.next_slot.lock();
            let slot = (*next_slot).max(Instant::now());
            *next_slot = slot + self.interval;
            slot
        };
        sleep_until(slot).await;
    }
}
