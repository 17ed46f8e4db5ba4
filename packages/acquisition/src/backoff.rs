use embassy_time::Duration;

/// Capped exponential backoff: `base * 2^failures`, never above `cap`.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    failures: u32,
}

impl Backoff {
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            failures: 0,
        }
    }

    /// Delay for the current failure count, then counts one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = Self::delay_for(self.base, self.cap, self.failures);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn delay_for(base: Duration, cap: Duration, failures: u32) -> Duration {
        let factor = 1u64 << failures.min(32);
        let millis = base.as_millis().saturating_mul(factor);
        Duration::from_millis(millis.min(cap.as_millis()))
    }
}
