//! Wall-clock drift detection.
//!
//! When the host suspends (laptop lid closed), timers stop firing and any
//! open socket state is unreliable. Comparing wall-clock time across ticks
//! exposes the suspension: real time advanced much further than the tick
//! interval. Purely local; no dependency on the remote peer.

use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;

/// Outcome of the drift loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftResult {
    /// Real time jumped past the threshold between two ticks.
    Detected { observed: Duration },
    /// Cancelled externally (normal teardown).
    Cancelled,
}

/// Pure tick comparator: feed it the wall clock at each tick, get back the
/// observed gap when it exceeds the threshold.
#[derive(Debug)]
pub struct DriftDetector {
    threshold: Duration,
    last_tick: Option<SystemTime>,
}

impl DriftDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_tick: None,
        }
    }

    /// Record a tick. Returns the observed gap if it exceeded the threshold.
    /// A clock stepping backwards just resets the reference point.
    pub fn observe(&mut self, now: SystemTime) -> Option<Duration> {
        let previous = self.last_tick.replace(now);
        let gap = previous.and_then(|p| now.duration_since(p).ok())?;
        (gap > self.threshold).then_some(gap)
    }
}

/// Tick every `interval`, comparing wall-clock gaps against `threshold`.
pub async fn run_drift_detector(
    interval: Duration,
    threshold: Duration,
    cancel: CancellationToken,
) -> DriftResult {
    let mut detector = DriftDetector::new(threshold);
    detector.observe(SystemTime::now());

    loop {
        tokio::select! {
            () = tokio::time::sleep(interval) => {
                if let Some(observed) = detector.observe(SystemTime::now()) {
                    return DriftResult::Detected { observed };
                }
            }
            () = cancel.cancelled() => {
                return DriftResult::Cancelled;
            }
        }
    }
}
