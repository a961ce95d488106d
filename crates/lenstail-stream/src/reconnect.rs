//! Backoff computation and idempotent reconnect scheduling.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::settings::StreamSettings;

/// Pure backoff/jitter calculator.
///
/// The effective delay is `max(min_floor, sleep_floor if woke_from_sleep,
/// min(cap, base * 2^attempt)) + jitter`, with jitter drawn uniformly from
/// `[0, jitter)` to avoid thundering-herd reconnects.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    jitter: Duration,
    sleep_floor: Duration,
}

impl ReconnectPolicy {
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            base: settings.backoff_base,
            cap: settings.backoff_cap,
            jitter: settings.jitter,
            sleep_floor: settings.sleep_floor,
        }
    }

    pub fn compute_delay(&self, attempt: u32, min_floor: Duration, woke_from_sleep: bool) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt.min(31)))
            .min(self.cap);
        let mut delay = exp.max(min_floor);
        if woke_from_sleep {
            delay = delay.max(self.sleep_floor);
        }
        delay + self.draw_jitter()
    }

    /// Delay for an auth-refresh reconnect: the short fixed floor plus
    /// jitter, bypassing the exponential curve entirely. Token expiry is not
    /// evidence of network degradation.
    pub fn short_delay(&self, floor: Duration) -> Duration {
        floor + self.draw_jitter()
    }

    fn draw_jitter(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

/// One-shot reconnect timer with idempotent arming: a second `arm` while a
/// delay is already pending is a no-op, so overlapping failure paths can all
/// request a reconnect without stacking timers.
#[derive(Debug, Default)]
pub struct ReconnectScheduler {
    deadline: Option<Instant>,
}

impl ReconnectScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer. Returns false (and changes nothing) if already armed.
    pub fn arm(&mut self, delay: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + delay);
        true
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Wait until the armed deadline, then disarm. Completes immediately if
    /// nothing is armed.
    pub async fn wait(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(&StreamSettings::default())
    }

    #[test]
    fn backoff_is_monotonic_up_to_cap() {
        let p = policy();
        let mut last = Duration::ZERO;
        for attempt in 0..15 {
            let delay = p.compute_delay(attempt, Duration::ZERO, false);
            let expected = Duration::from_millis(1000u64 * 2u64.pow(attempt)).min(Duration::from_secs(30));
            assert!(delay >= expected, "attempt {attempt}: {delay:?} < {expected:?}");
            assert!(
                delay < expected + Duration::from_millis(300),
                "attempt {attempt}: {delay:?} exceeds jitter bound"
            );
            assert!(delay + Duration::from_millis(300) >= last, "non-monotonic at {attempt}");
            last = delay;
        }
    }

    #[test]
    fn cap_reached_by_attempt_five() {
        let p = policy();
        for attempt in 5..20 {
            let delay = p.compute_delay(attempt, Duration::ZERO, false);
            assert!(delay >= Duration::from_secs(30));
            assert!(delay < Duration::from_secs(30) + Duration::from_millis(300));
        }
    }

    #[test]
    fn floor_clamps_small_attempts() {
        let p = policy();
        let delay = p.compute_delay(0, Duration::from_secs(5), false);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay < Duration::from_secs(5) + Duration::from_millis(300));
    }

    #[test]
    fn sleep_wake_forces_minimum() {
        let p = policy();
        let delay = p.compute_delay(0, Duration::ZERO, true);
        assert!(delay >= Duration::from_secs(5));
    }

    #[test]
    fn short_delay_ignores_backoff_curve() {
        let p = policy();
        let delay = p.short_delay(Duration::from_millis(1000));
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay < Duration::from_millis(1300));
    }

    #[test]
    fn large_attempt_does_not_overflow() {
        let p = policy();
        let delay = p.compute_delay(u32::MAX, Duration::ZERO, false);
        assert!(delay >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn double_arm_is_noop() {
        let mut scheduler = ReconnectScheduler::new();
        assert!(scheduler.arm(Duration::from_secs(1)));
        assert!(!scheduler.arm(Duration::from_secs(60)));
        assert!(scheduler.is_armed());

        let start = Instant::now();
        scheduler.wait().await;
        // The first (shorter) deadline won; the second arm changed nothing.
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_without_arm_returns_immediately() {
        let mut scheduler = ReconnectScheduler::new();
        let start = Instant::now();
        scheduler.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
