use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::time::Duration;

/// Retry knobs applied uniformly to throttling and transient network failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total tries per call, the first one included.
    pub attempts: u32,
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    /// Fractional jitter, 0.1 means +/-10%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 4,
            base: Duration::from_secs(2),
            multiplier: 2.0,
            max: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// No waiting between tries. Used by tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base: Duration::ZERO,
            multiplier: 1.0,
            max: Duration::ZERO,
            jitter: 0.0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Fresh backoff schedule for one call. Attempt count bounds the retries, not elapsed time.
    pub fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base,
            initial_interval: self.base,
            randomization_factor: self.jitter,
            multiplier: self.multiplier,
            max_interval: self.max,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Next pause from `schedule`, falling back to the policy ceiling.
pub fn next_pause(schedule: &mut ExponentialBackoff, policy: &RetryPolicy) -> Duration {
    schedule.next_backoff().unwrap_or(policy.max)
}
