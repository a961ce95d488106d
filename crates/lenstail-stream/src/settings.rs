use std::time::Duration;

/// Timing knobs for one streaming connection. Defaults match production
/// behavior; tests shrink them.
#[derive(Clone, Debug)]
pub struct StreamSettings {
    /// How often the heartbeat probe pings the peer.
    pub heartbeat_interval: Duration,
    /// How long an unanswered ping may stay unanswered before the socket is
    /// declared half-open and terminated.
    pub pong_timeout: Duration,
    /// Wall-clock tick interval for the drift detector.
    pub drift_interval: Duration,
    /// Observed inter-tick gap above which the host is assumed to have slept.
    pub drift_threshold: Duration,
    /// Total time to wait for DNS of all endpoints during preflight.
    pub dns_timeout: Duration,
    /// Poll interval for the DNS readiness gate.
    pub dns_poll: Duration,
    /// Exponential backoff base delay.
    pub backoff_base: Duration,
    /// Exponential backoff cap.
    pub backoff_cap: Duration,
    /// Upper bound (exclusive) of the random jitter added to every delay.
    pub jitter: Duration,
    /// Minimum delay after a DNS-timeout or transient preflight failure.
    pub transient_floor: Duration,
    /// Minimum delay before an auth-refresh reconnect.
    pub auth_floor: Duration,
    /// Minimum delay after a detected sleep/drift event.
    pub sleep_floor: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(30),
            drift_interval: Duration::from_secs(15),
            drift_threshold: Duration::from_secs(22),
            dns_timeout: Duration::from_secs(20),
            dns_poll: Duration::from_secs(1),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            jitter: Duration::from_millis(300),
            transient_floor: Duration::from_secs(5),
            auth_floor: Duration::from_secs(1),
            sleep_floor: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let s = StreamSettings::default();
        assert_eq!(s.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(s.pong_timeout, Duration::from_secs(30));
        assert_eq!(s.drift_threshold, Duration::from_secs(22));
        assert_eq!(s.backoff_cap, Duration::from_secs(30));
        assert_eq!(s.transient_floor, Duration::from_secs(5));
        assert!(s.drift_threshold > s.drift_interval);
        assert!(s.pong_timeout >= s.heartbeat_interval);
    }
}
