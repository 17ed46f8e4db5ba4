use embassy_time::Duration;

pub const TICK_INTERVAL_DEFAULT_MS: u32 = 5_000;
pub const RETRY_DELAY_DEFAULT_MS: u32 = 500;
pub const REQUEST_TIMEOUT_DEFAULT_MS: u32 = 10_000;
pub const ATTACH_TIMEOUT_DEFAULT_MS: u32 = 30_000;
pub const ATTACH_ATTEMPT_TIMEOUT_DEFAULT_MS: u32 = 10_000;
pub const BACKOFF_BASE_DEFAULT_MS: u32 = 1_000;
pub const BACKOFF_CAP_DEFAULT_MS: u32 = 60_000;
// One minute of identical conversions at the default tick.
pub const STUCK_THRESHOLD_DEFAULT: u16 = 12;

/// Timing and retry knobs for the acquisition loop and its link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionPolicy {
    pub tick_interval_ms: u32,
    pub retry_limit: u8,
    pub retry_delay_ms: u32,
    pub request_timeout_ms: u32,
    pub attach_timeout_ms: u32,
    pub attach_attempts: u8,
    pub attach_attempt_timeout_ms: u32,
    pub backoff_base_ms: u32,
    pub backoff_cap_ms: u32,
    pub stuck_threshold: u16,
}

impl Default for AcquisitionPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}

impl AcquisitionPolicy {
    pub const fn defaults() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_DEFAULT_MS,
            retry_limit: 2,
            retry_delay_ms: RETRY_DELAY_DEFAULT_MS,
            request_timeout_ms: REQUEST_TIMEOUT_DEFAULT_MS,
            attach_timeout_ms: ATTACH_TIMEOUT_DEFAULT_MS,
            attach_attempts: 3,
            attach_attempt_timeout_ms: ATTACH_ATTEMPT_TIMEOUT_DEFAULT_MS,
            backoff_base_ms: BACKOFF_BASE_DEFAULT_MS,
            backoff_cap_ms: BACKOFF_CAP_DEFAULT_MS,
            stuck_threshold: STUCK_THRESHOLD_DEFAULT,
        }
    }

    pub const fn sanitized(self) -> Self {
        let tick_interval_ms = clamp_u32(self.tick_interval_ms, 1_000, 3_600_000);
        let retry_limit = clamp_u8(self.retry_limit, 0, 5);
        let retry_delay_ms = clamp_u32(self.retry_delay_ms, 0, 10_000);
        let request_timeout_ms = clamp_u32(self.request_timeout_ms, 1_000, 60_000);
        let attach_timeout_ms = clamp_u32(self.attach_timeout_ms, 2_000, 180_000);
        let attach_attempts = clamp_u8(self.attach_attempts, 1, 8);
        let attach_attempt_timeout_ms =
            clamp_u32(self.attach_attempt_timeout_ms, 1_000, attach_timeout_ms);
        let backoff_base_ms = clamp_u32(self.backoff_base_ms, 100, 10_000);
        let backoff_cap_ms = clamp_u32(self.backoff_cap_ms, backoff_base_ms, 600_000);
        let stuck_threshold = if self.stuck_threshold > 1_000 {
            1_000
        } else {
            self.stuck_threshold
        };
        Self {
            tick_interval_ms,
            retry_limit,
            retry_delay_ms,
            request_timeout_ms,
            attach_timeout_ms,
            attach_attempts,
            attach_attempt_timeout_ms,
            backoff_base_ms,
            backoff_cap_ms,
            stuck_threshold,
        }
    }

    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms as u64)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms as u64)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms as u64)
    }

    pub const fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms as u64)
    }

    pub const fn attach_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_attempt_timeout_ms as u64)
    }

    pub const fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms as u64)
    }

    pub const fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms as u64)
    }
}

const fn clamp_u32(value: u32, min: u32, max: u32) -> u32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

const fn clamp_u8(value: u8, min: u8, max: u8) -> u8 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
