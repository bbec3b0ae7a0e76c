use async_trait::async_trait;
use spotify_playlist_mirror::api::limiter::{Clock, RateLimiter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock whose sleeps advance time instantly and are recorded for
/// inspection.
struct FakeClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    fn new() -> Self {
        Self { now: Mutex::new(Duration::ZERO), sleeps: Mutex::new(Vec::new()) }
    }

    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, dur: Duration) {
        *self.now.lock().unwrap() += dur;
        self.sleeps.lock().unwrap().push(dur);
    }
}

#[test]
fn window_ceiling_triggers_exactly_one_extra_sleep() {
    let clock = Arc::new(FakeClock::new());
    // 5 requests per minute keeps the arithmetic exact: spacing is 12s
    let limiter = RateLimiter::with_clock(5, clock.clone());

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // calls 2..=5 each slept once for the minimum spacing
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 4);
        assert!(sleeps.iter().all(|s| *s == Duration::from_secs(12)));

        // the 6th call hits the window ceiling: exactly one more sleep,
        // long enough to push the oldest ledger entry past the window
        limiter.acquire().await;
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 5);
        assert_eq!(sleeps[4], Duration::from_millis(12_100));
    });
}

#[test]
fn spaced_out_calls_never_sleep() {
    let clock = Arc::new(FakeClock::new());
    let limiter = RateLimiter::with_clock(5, clock.clone());

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        for _ in 0..10 {
            limiter.acquire().await;
            // caller naturally waits longer than the minimum spacing
            *clock.now.lock().unwrap() += Duration::from_secs(13);
        }
    });
    assert!(clock.sleeps().is_empty());
}

#[test]
fn ledger_recovers_after_idle_window() {
    let clock = Arc::new(FakeClock::new());
    let limiter = RateLimiter::with_clock(5, clock.clone());

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        for _ in 0..5 {
            limiter.acquire().await;
        }
        let before = clock.sleeps().len();

        // after a full idle window the old entries are pruned, so only the
        // min-spacing rule could apply, and enough time has passed for it
        *clock.now.lock().unwrap() += Duration::from_secs(61);
        limiter.acquire().await;
        assert_eq!(clock.sleeps().len(), before, "no sleep after the window drained");
    });
}
