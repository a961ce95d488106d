//! DNS readiness gate.
//!
//! After a host wakes from sleep the resolver can lag the network by several
//! seconds. Rather than burning a connection attempt on a guaranteed
//! failure, preflight blocks until every endpoint hostname resolves.

use std::time::Duration;

use tokio::net::lookup_host;
use tokio::time::Instant;

/// Poll hostname resolution for every host until all resolve or `timeout`
/// elapses. Returns whether all resolved before the deadline.
pub async fn wait_for_dns(hosts: &[String], timeout: Duration, interval: Duration) -> bool {
    let deadline = Instant::now() + timeout;

    loop {
        if all_resolve(hosts, interval).await {
            return true;
        }
        if Instant::now() + interval >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

async fn all_resolve(hosts: &[String], per_lookup: Duration) -> bool {
    for host in hosts {
        // The port is irrelevant; only resolution matters.
        let lookup = lookup_host((host.as_str(), 443u16));
        match tokio::time::timeout(per_lookup, lookup).await {
            Ok(Ok(_)) => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_host_list_is_ready() {
        assert!(
            wait_for_dns(&[], Duration::from_millis(100), Duration::from_millis(50)).await
        );
    }

    #[tokio::test]
    async fn localhost_resolves() {
        let hosts = vec!["localhost".to_string()];
        assert!(wait_for_dns(&hosts, Duration::from_secs(2), Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn unresolvable_host_times_out() {
        // .invalid is reserved and never resolves (RFC 2606).
        let hosts = vec!["lenstail-no-such-host.invalid".to_string()];
        let start = std::time::Instant::now();
        let ready =
            wait_for_dns(&hosts, Duration::from_millis(600), Duration::from_millis(200)).await;
        assert!(!ready);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn one_bad_host_fails_the_set() {
        let hosts = vec![
            "localhost".to_string(),
            "lenstail-no-such-host.invalid".to_string(),
        ];
        assert!(
            !wait_for_dns(&hosts, Duration::from_millis(600), Duration::from_millis(200)).await
        );
    }
}
