//! Transport-level ping/pong liveness watchdog.
//!
//! Detects half-open TCP connections the OS has not reported as closed: the
//! peer stops answering pings while the socket still looks writable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tokio_util::sync::CancellationToken;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No pong arrived within the timeout window.
    TimedOut,
    /// The heartbeat was cancelled externally (normal teardown).
    Cancelled,
}

/// Shared pong flag. The connection event loop sets it on every received
/// pong; the heartbeat loop clears it after each check.
#[derive(Debug, Default)]
pub struct PongFlag {
    seen: AtomicBool,
}

impl PongFlag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: AtomicBool::new(true),
        })
    }

    pub fn mark(&self) {
        self.seen.store(true, Ordering::Relaxed);
    }

    fn take(&self) -> bool {
        self.seen.swap(false, Ordering::Relaxed)
    }
}

/// Run heartbeat pings for one connection attempt.
///
/// At each `interval` tick a ping frame is queued on `outbound` and the pong
/// flag is checked. `timeout / interval` consecutive ticks without a pong
/// (clamped to at least 1) return [`HeartbeatResult::TimedOut`]; the caller
/// terminates the socket.
pub async fn run_heartbeat(
    pong: Arc<PongFlag>,
    outbound: mpsc::Sender<Message>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval(interval);
    // The immediate first tick would count as a missed pong; skip it.
    ticker.tick().await;

    let interval_ms = interval.as_millis().max(1);
    #[allow(clippy::cast_possible_truncation)]
    let max_missed = ((timeout.as_millis() / interval_ms).max(1)) as u32;
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if outbound.try_send(Message::Ping(Bytes::from_static(b"hb"))).is_err() {
                    // Outbound queue gone means the connection is tearing down.
                    return HeartbeatResult::Cancelled;
                }
                if pong.take() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
