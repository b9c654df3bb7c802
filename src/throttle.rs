use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Process-wide request budget shared by every worker.
///
/// Cloning shares the same bucket and the same cooldown. Nothing here is held
/// while a request is in flight: callers wait on [`Throttle::gate`] and then go.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DefaultDirectRateLimiter>,
    cooldown_until_ms: Arc<AtomicU64>,
}

impl Throttle {
    pub fn per_minute(rpm: u32) -> Self {
        let q = Quota::per_minute(NonZeroU32::new(rpm.max(1)).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::direct(q)),
            cooldown_until_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wait out any cooldown, then take one token from the bucket.
    pub async fn gate(&self) {
        loop {
            let now = now_ms();
            let until = self.cooldown_until_ms.load(Ordering::Acquire);
            if until <= now {
                break;
            }
            tokio::time::sleep(Duration::from_millis(until - now)).await;
        }
        self.limiter.until_ready().await;
    }

    /// Pause every holder of this throttle for at least `wait`. Never shortens an existing cooldown.
    pub fn cool_down(&self, wait: Duration) {
        let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        let until = now_ms().saturating_add(wait_ms);
        self.cooldown_until_ms.fetch_max(until, Ordering::AcqRel);
    }
}

#[inline]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
