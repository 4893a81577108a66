//! Delivery configuration.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// How a sent event is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// Delivered once the transport accepts the frame and no rejection
    /// arrives within the confirmation timeout.
    #[default]
    Implicit,
    /// Delivered only when the client acknowledges the event id within the
    /// confirmation timeout.
    Explicit,
}

/// Full configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Retries after the first attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub backoff_base: Duration,
    /// Growth factor between consecutive retries.
    pub backoff_multiplier: u32,
    /// Upper bound on any single retry delay.
    pub backoff_cap: Duration,
    /// Random extra delay (0..=jitter) added to each retry. Zero disables.
    pub retry_jitter: Duration,
    /// How long to wait for a confirmation after each send.
    pub confirm_timeout: Duration,
    pub confirmation: ConfirmationMode,
    /// Pending entries older than this are dropped regardless of status.
    pub pending_expiry: Duration,
    /// How often the janitor sweeps expired entries.
    pub janitor_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            backoff_multiplier: 2,
            backoff_cap: Duration::from_secs(8),
            retry_jitter: Duration::ZERO,
            confirm_timeout: Duration::from_secs(5),
            confirmation: ConfirmationMode::default(),
            pending_expiry: Duration::from_secs(300),
            janitor_interval: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    /// Hard ceiling on retries per event.
    pub const MAX_RETRIES: u32 = 10;

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - `max_retries` capped at [`Self::MAX_RETRIES`]
    /// - `backoff_multiplier` at least 1
    /// - `backoff_cap` at least `backoff_base`
    /// - zero timeouts and intervals raised to one millisecond
    pub fn validated(mut self) -> Self {
        if self.max_retries > Self::MAX_RETRIES {
            warn!(
                requested = self.max_retries,
                max = Self::MAX_RETRIES,
                "max_retries exceeds maximum, clamping"
            );
            self.max_retries = Self::MAX_RETRIES;
        }
        if self.backoff_multiplier == 0 {
            warn!("backoff_multiplier of 0 would stop retries from backing off, using 1");
            self.backoff_multiplier = 1;
        }
        if self.backoff_cap < self.backoff_base {
            warn!(
                cap_ms = self.backoff_cap.as_millis() as u64,
                base_ms = self.backoff_base.as_millis() as u64,
                "backoff_cap below backoff_base, raising cap"
            );
            self.backoff_cap = self.backoff_base;
        }
        let floor = Duration::from_millis(1);
        self.confirm_timeout = self.confirm_timeout.max(floor);
        self.pending_expiry = self.pending_expiry.max(floor);
        self.janitor_interval = self.janitor_interval.max(floor);
        self
    }

    /// Total attempts an event gets, including the first.
    pub fn max_attempts(&self, max_retries: Option<u32>) -> u32 {
        max_retries
            .unwrap_or(self.max_retries)
            .min(Self::MAX_RETRIES)
            + 1
    }

    /// Delay before retry number `retry` (1-based):
    /// `min(base * multiplier^(retry-1), cap)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self
            .backoff_multiplier
            .saturating_pow(retry.saturating_sub(1));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }

    /// [`backoff`](Self::backoff) plus jitter, if any is configured.
    pub(crate) fn retry_delay(&self, retry: u32) -> Duration {
        let delay = self.backoff(retry);
        if self.retry_jitter.is_zero() {
            return delay;
        }
        let extra_ms = rand::rng().random_range(0..=self.retry_jitter.as_millis() as u64);
        delay + Duration::from_millis(extra_ms)
    }
}
