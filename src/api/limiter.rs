use async_trait::async_trait;
use log::info;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);
// small cushion past the window edge so the pruned ledger is strictly under
// the ceiling after waking
const HEADROOM: Duration = Duration::from_millis(100);

/// Time source for the limiter. Production uses the monotonic system
/// clock; tests inject a fake whose sleeps advance time instantly.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic elapsed time since a fixed origin.
    fn now(&self) -> Duration;
    async fn sleep(&self, dur: Duration);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, dur: Duration) {
        tokio::time::sleep(dur).await;
    }
}

/// Rolling-window request budget: at most `limit` requests per 60 seconds,
/// with consecutive requests spaced at least `60/limit` seconds apart.
pub struct RateLimiter {
    limit: usize,
    min_interval: Duration,
    ledger: Mutex<VecDeque<Duration>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_clock(requests_per_minute, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(requests_per_minute: u32, clock: Arc<dyn Clock>) -> Self {
        let limit = requests_per_minute.max(1) as usize;
        Self {
            limit,
            min_interval: Duration::from_secs_f64(60.0 / limit as f64),
            ledger: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    /// Blocks until one request may be issued, then records it. The ledger
    /// lock is held across the sleeps so concurrent callers queue behind
    /// the same budget; time is re-read after every sleep.
    pub async fn acquire(&self) {
        let mut ledger = self.ledger.lock().await;
        let mut now = self.clock.now();
        Self::prune(&mut ledger, now);

        if ledger.len() >= self.limit {
            if let Some(oldest) = ledger.front().copied() {
                let wait = WINDOW.saturating_sub(now.saturating_sub(oldest)) + HEADROOM;
                info!("Rate limit approached, sleeping for {:.2} seconds", wait.as_secs_f64());
                self.clock.sleep(wait).await;
                now = self.clock.now();
                Self::prune(&mut ledger, now);
            }
        }

        if let Some(last) = ledger.back().copied() {
            let since_last = now.saturating_sub(last);
            if since_last < self.min_interval {
                self.clock.sleep(self.min_interval - since_last).await;
                now = self.clock.now();
            }
        }

        ledger.push_back(now);
    }

    fn prune(ledger: &mut VecDeque<Duration>, now: Duration) {
        while let Some(oldest) = ledger.front() {
            if now.saturating_sub(*oldest) > WINDOW {
                ledger.pop_front();
            } else {
                break;
            }
        }
    }
}
