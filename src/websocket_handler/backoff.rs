//! Linear reconnect backoff used by the transport state machine.

use std::time::{Duration, Instant};

use super::config::TransportConfig;

/// Stand-in deadline for delays too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Computes reconnect delays and enforces the attempt ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffScheduler {
    unit: Duration,
    max_attempts: u32,
}

impl BackoffScheduler {
    pub fn new(unit: Duration, max_attempts: u32) -> Self {
        Self { unit, max_attempts }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.reconnect_delay, config.max_reconnect_attempts)
    }

    /// Delay before attempt `attempt` (1-based): `unit * attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Schedule `attempt`, measured from `now`.
    pub fn schedule(&self, attempt: u32, now: Instant) -> ScheduledReconnect {
        let delay = self.next_delay(attempt);
        ScheduledReconnect {
            attempt,
            delay,
            due: deadline_after(now, delay),
        }
    }
}

/// `now + delay`, clamped far into the future when the sum overflows.
pub fn deadline_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// A pending reconnect. Dropping the value cancels it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledReconnect {
    pub attempt: u32,
    pub delay: Duration,
    pub due: Instant,
}

impl ScheduledReconnect {
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.due
    }

    /// Time left before the reconnect fires.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.due.saturating_duration_since(now)
    }
}
