//! Connection lifecycle orchestration.
//!
//! One [`ConnectionManager`] owns the whole reconnect cycle: preflight
//! (DNS gate, token, catalogs), the graphql-transport-ws handshake, the
//! frame dispatch loop, liveness watchdogs and the classified handoff to the
//! backoff policy. At most one socket and one pending reconnect timer exist
//! at any time; all timers are scoped to the current attempt and cancelled
//! before the next attempt arms its own.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lenstail_core::catalog::{CatalogIndex, SubscriptionVars};
use lenstail_core::config::Config;
use lenstail_core::errors::StreamError;
use lenstail_core::providers::{CatalogFetcher, TokenProvider};
use lenstail_core::sink::EventSink;

use crate::close::{compose_diagnostic, is_auth_close};
use crate::drift::{run_drift_detector, DriftResult};
use crate::heartbeat::{run_heartbeat, HeartbeatResult, PongFlag};
use crate::net::wait_for_dns;
use crate::protocol::{ClientMessage, ProtocolAction, SubscriptionProtocol, GRAPHQL_WS_PROTOCOL};
use crate::reconnect::{ReconnectPolicy, ReconnectScheduler};
use crate::settings::StreamSettings;

/// How one connection attempt ended, and how the next one should be paced.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The DNS gate timed out; fixed floor, attempt counter untouched.
    DnsNotReady,
    /// Token/catalog/connect failure during preflight; floor plus backoff.
    PreflightFailed { error: StreamError },
    /// The socket opened and later went away. `auth` selects the short-floor
    /// fresh-token path over standard backoff.
    Disconnected { diagnostic: String, auth: bool },
    /// Operator shutdown; the run loop stops.
    Shutdown,
}

/// Why the frame loop stopped.
enum LoopEnd {
    Closed { code: u16, reason: String },
    StreamEnded,
    TransportError(String),
    /// A local component (watchdog, drift, auth error) decided to terminate.
    Terminated { auth: bool },
    Shutdown,
}

pub struct ConnectionManager {
    config: Config,
    settings: StreamSettings,
    policy: ReconnectPolicy,
    tokens: Arc<dyn TokenProvider>,
    catalog: Arc<dyn CatalogFetcher>,
    sink: Arc<dyn EventSink>,
    /// Consecutive failed attempts. Reset on every successful socket open;
    /// never inflated by auth-refresh reconnects.
    attempt: u32,
    /// Auth-triggered reconnects, tracked separately from backoff evidence.
    auth_refreshes: u32,
    woke_from_sleep: bool,
    close_hint: Option<String>,
}

impl ConnectionManager {
    pub fn new(
        config: Config,
        settings: StreamSettings,
        tokens: Arc<dyn TokenProvider>,
        catalog: Arc<dyn CatalogFetcher>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let policy = ReconnectPolicy::new(&settings);
        Self {
            config,
            settings,
            policy,
            tokens,
            catalog,
            sink,
            attempt: 0,
            auth_refreshes: 0,
            woke_from_sleep: false,
            close_hint: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn auth_refreshes(&self) -> u32 {
        self.auth_refreshes
    }

    /// Run connection cycles until `shutdown` fires. Nothing that happens
    /// inside an attempt can end this loop; every failure reschedules.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut scheduler = ReconnectScheduler::new();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let outcome = self.connect_once(&shutdown).await;
            let delay = match outcome {
                AttemptOutcome::Shutdown => break,
                AttemptOutcome::DnsNotReady => {
                    warn!(floor_ms = self.settings.transient_floor.as_millis() as u64,
                        "dns not ready, deferring attempt");
                    self.delay_for(self.settings.transient_floor, false)
                }
                AttemptOutcome::PreflightFailed { error } => {
                    warn!(kind = error.error_kind(), "preflight failed: {error}");
                    self.delay_for(self.settings.transient_floor, true)
                }
                AttemptOutcome::Disconnected { diagnostic, auth } => {
                    self.sink.lifecycle(&format!("disconnected: {diagnostic}"));
                    if auth {
                        self.auth_refreshes += 1;
                        info!(refreshes = self.auth_refreshes,
                            "authorization rejected, reconnecting with fresh token");
                        self.policy.short_delay(self.settings.auth_floor)
                    } else {
                        self.delay_for(Duration::ZERO, true)
                    }
                }
            };

            scheduler.arm(delay);
            info!(delay_ms = delay.as_millis() as u64, attempt = self.attempt, "reconnect scheduled");
            tokio::select! {
                () = scheduler.wait() => {}
                () = shutdown.cancelled() => break,
            }
        }

        info!("connection manager stopped");
    }

    /// Standard backoff pacing: compute from the current attempt counter,
    /// then advance it when this failure counts as network-health evidence.
    fn delay_for(&mut self, floor: Duration, bump: bool) -> Duration {
        let woke = std::mem::take(&mut self.woke_from_sleep);
        let delay = self.policy.compute_delay(self.attempt, floor, woke);
        if bump {
            self.attempt = self.attempt.saturating_add(1);
        }
        delay
    }

    /// One full cycle: preflight, handshake, subscribe, dispatch, cleanup.
    pub async fn connect_once(&mut self, shutdown: &CancellationToken) -> AttemptOutcome {
        // ── Preflight ───────────────────────────────────────────────────
        let hosts = self.config.hosts();
        debug!(hosts = ?hosts, "waiting for dns");
        let dns_ready = tokio::select! {
            ready = wait_for_dns(&hosts, self.settings.dns_timeout, self.settings.dns_poll) => ready,
            () = shutdown.cancelled() => return AttemptOutcome::Shutdown,
        };
        if !dns_ready {
            return AttemptOutcome::DnsNotReady;
        }

        let token = match self.tokens.fetch_token().await {
            Ok(token) => token,
            Err(error) => {
                if !error.is_transient() {
                    error!(kind = error.error_kind(), "token acquisition failed: {error}");
                }
                return AttemptOutcome::PreflightFailed { error };
            }
        };

        let rooms = match self.catalog.fetch_rooms(&token).await {
            Ok(rooms) => rooms,
            Err(error) => return AttemptOutcome::PreflightFailed { error },
        };
        let devices = match self.catalog.fetch_devices(&token).await {
            Ok(devices) => devices,
            Err(error) => return AttemptOutcome::PreflightFailed { error },
        };

        let index = CatalogIndex::build(&rooms, &devices);
        let vars = SubscriptionVars::derive(
            &self.config.tenant_id,
            &rooms,
            &devices,
            self.config.device_ids.as_deref(),
        );
        self.sink.lifecycle(&format!(
            "catalog ready: {} rooms, {} devices",
            index.room_count(),
            index.device_count()
        ));

        // ── Open socket with the graphql-transport-ws subprotocol ───────
        let mut request = match self.config.ws_url.as_str().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                return AttemptOutcome::PreflightFailed {
                    error: StreamError::Startup(format!("bad websocket url: {e}")),
                }
            }
        };
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
        );

        info!(url = %self.config.ws_url, "connecting to websocket");
        let (ws, _response) = match connect_async(request).await {
            Ok(pair) => pair,
            Err(e) => {
                return AttemptOutcome::PreflightFailed {
                    error: classify_ws_error(e),
                }
            }
        };

        // A completed TCP/WS handshake counts as recovery, even before the
        // GraphQL-level ack.
        self.attempt = 0;
        self.sink.lifecycle("connected to websocket");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let init = ClientMessage::connection_init(&token).to_json();
        if let Err(e) = ws_tx.send(Message::Text(init.into())).await {
            return AttemptOutcome::Disconnected {
                diagnostic: compose_diagnostic(1006, "", Some(&format!("init send failed: {e}"))),
                auth: false,
            };
        }

        // ── Watchdogs, scoped to this attempt ───────────────────────────
        let attempt_cancel = CancellationToken::new();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);
        let pong = PongFlag::new();
        let mut heartbeat = tokio::spawn(run_heartbeat(
            pong.clone(),
            out_tx.clone(),
            self.settings.heartbeat_interval,
            self.settings.pong_timeout,
            attempt_cancel.child_token(),
        ));
        let mut drift = tokio::spawn(run_drift_detector(
            self.settings.drift_interval,
            self.settings.drift_threshold,
            attempt_cancel.child_token(),
        ));

        let mut protocol = SubscriptionProtocol::new(index, vars, self.sink.clone());

        // ── Frame loop ──────────────────────────────────────────────────
        let end = 'conn: loop {
            tokio::select! {
                frame = ws_rx.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match protocol.handle_frame(text.as_str()) {
                            Some(ProtocolAction::Send(messages)) => {
                                for message in messages {
                                    let json = message.to_json();
                                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                        break 'conn LoopEnd::TransportError("send failed".into());
                                    }
                                }
                            }
                            Some(ProtocolAction::Terminate { hint }) => {
                                self.close_hint = Some(hint);
                                break 'conn LoopEnd::Terminated { auth: true };
                            }
                            None => {}
                        }
                    }
                    Some(Ok(Message::Pong(_))) => pong.mark(),
                    // Transport-level pings are answered by tungstenite itself.
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(f) => (u16::from(f.code), f.reason.as_str().to_string()),
                            None => (1005, String::new()),
                        };
                        break 'conn LoopEnd::Closed { code, reason };
                    }
                    Some(Ok(other)) => debug!(?other, "ignoring non-text frame"),
                    Some(Err(e)) => break 'conn LoopEnd::TransportError(e.to_string()),
                    None => break 'conn LoopEnd::StreamEnded,
                },
                Some(message) = out_rx.recv() => {
                    if ws_tx.send(message).await.is_err() {
                        break 'conn LoopEnd::TransportError("send failed".into());
                    }
                }
                result = &mut heartbeat => {
                    if matches!(result, Ok(HeartbeatResult::TimedOut)) {
                        self.close_hint = Some(format!(
                            "heartbeat watchdog: no pong within {}s",
                            self.settings.pong_timeout.as_secs()
                        ));
                    }
                    break 'conn LoopEnd::Terminated { auth: false };
                }
                result = &mut drift => {
                    if let Ok(DriftResult::Detected { observed }) = result {
                        self.woke_from_sleep = true;
                        self.close_hint = Some(format!(
                            "sleep/clock drift detected: {}s gap vs {}s threshold",
                            observed.as_secs(),
                            self.settings.drift_threshold.as_secs()
                        ));
                    }
                    break 'conn LoopEnd::Terminated { auth: false };
                }
                () = shutdown.cancelled() => break 'conn LoopEnd::Shutdown,
            }
        };

        // ── Cleanup: idempotent, no timer may fire into the next attempt ─
        attempt_cancel.cancel();
        heartbeat.abort();
        drift.abort();
        let _ = ws_tx.send(Message::Close(None)).await;
        let _ = ws_tx.close().await;

        let hint = self.close_hint.take();
        match end {
            LoopEnd::Shutdown => AttemptOutcome::Shutdown,
            LoopEnd::Closed { code, reason } => {
                let diagnostic = compose_diagnostic(code, &reason, hint.as_deref());
                warn!(code, "socket closed: {diagnostic}");
                AttemptOutcome::Disconnected {
                    diagnostic,
                    auth: is_auth_close(code),
                }
            }
            LoopEnd::StreamEnded => {
                let diagnostic = compose_diagnostic(1006, "", hint.as_deref());
                warn!("socket stream ended: {diagnostic}");
                AttemptOutcome::Disconnected { diagnostic, auth: false }
            }
            LoopEnd::TransportError(message) => {
                let diagnostic =
                    compose_diagnostic(1006, "", Some(hint.unwrap_or(message).as_str()));
                warn!("socket error: {diagnostic}");
                AttemptOutcome::Disconnected { diagnostic, auth: false }
            }
            LoopEnd::Terminated { auth } => {
                let diagnostic = hint.unwrap_or_else(|| "locally terminated".into());
                warn!(auth, "terminating socket: {diagnostic}");
                AttemptOutcome::Disconnected { diagnostic, auth }
            }
        }
    }
}

/// Map a tungstenite handshake/transport failure onto the error taxonomy.
fn classify_ws_error(error: WsError) -> StreamError {
    match error {
        WsError::Http(response) => {
            StreamError::from_status(response.status().as_u16(), String::new())
        }
        WsError::Io(io) => StreamError::Transient(io.to_string()),
        other => StreamError::Transient(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use lenstail_core::catalog::{Device, Room};
    use lenstail_core::providers::AccessToken;
    use lenstail_core::sink::NullSink;

    struct StubTokens;

    #[async_trait]
    impl TokenProvider for StubTokens {
        async fn fetch_token(&self) -> Result<AccessToken, StreamError> {
            Ok(AccessToken::new("t"))
        }
    }

    struct StubCatalog;

    #[async_trait]
    impl CatalogFetcher for StubCatalog {
        async fn fetch_rooms(&self, _token: &AccessToken) -> Result<Vec<Room>, StreamError> {
            Ok(Vec::new())
        }
        async fn fetch_devices(&self, _token: &AccessToken) -> Result<Vec<Device>, StreamError> {
            Ok(Vec::new())
        }
    }

    fn manager() -> ConnectionManager {
        let config = Config {
            auth_url: "https://auth.example.com/token".into(),
            http_url: "https://api.example.com/graphql".into(),
            ws_url: "wss://api.example.com/graphql".into(),
            tenant_id: "t1".into(),
            client_id: "c1".into(),
            client_secret: SecretString::from("shh".to_string()),
            device_ids: None,
        };
        ConnectionManager::new(
            config,
            StreamSettings::default(),
            Arc::new(StubTokens),
            Arc::new(StubCatalog),
            Arc::new(NullSink),
        )
    }

    #[test]
    fn sleep_wake_biases_next_delay_to_sleep_floor() {
        let mut mgr = manager();
        mgr.woke_from_sleep = true;

        // attempt 0 with no floor would be ~1s; the wake flag raises it.
        let delay = mgr.delay_for(Duration::ZERO, true);
        assert!(delay >= mgr.settings.sleep_floor, "got {delay:?}");

        // The flag is consumed: the following delay is back on the curve.
        assert!(!mgr.woke_from_sleep);
        let next = mgr.delay_for(Duration::ZERO, false);
        assert!(next < mgr.settings.sleep_floor, "got {next:?}");
    }

    #[test]
    fn delay_for_bumps_attempt_only_when_asked() {
        let mut mgr = manager();
        mgr.delay_for(Duration::ZERO, false);
        assert_eq!(mgr.attempt(), 0);
        mgr.delay_for(Duration::ZERO, true);
        assert_eq!(mgr.attempt(), 1);
    }

    #[test]
    fn ws_io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(classify_ws_error(WsError::Io(io)).is_transient());
    }

    #[test]
    fn ws_http_403_is_auth() {
        let response = tokio_tungstenite::tungstenite::http::Response::builder()
            .status(403)
            .body(None)
            .unwrap();
        assert!(matches!(
            classify_ws_error(WsError::Http(response)),
            StreamError::Auth(_)
        ));
    }
}
