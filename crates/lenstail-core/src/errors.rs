use std::time::Duration;

/// Typed error hierarchy for the live-tail pipeline.
/// Classifies failures by how the connection manager should react:
/// transient errors reschedule with backoff, auth expiry reschedules on the
/// short floor with a fresh token, protocol errors keep the stream alive.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StreamError {
    // Recoverable via backoff
    #[error("transient network error: {0}")]
    Transient(String),
    #[error("dns not ready after {0:?}")]
    DnsTimeout(Duration),

    // Recoverable via short-floor reconnect with a fresh token
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    // Fatal for this attempt (bad credentials, misconfigured client)
    #[error("authentication failed: {0}")]
    Auth(String),

    // Logged, stream continues
    #[error("protocol error: {0}")]
    Protocol(String),

    // Anything else raised during preflight or handshake
    #[error("startup error: {0}")]
    Startup(String),

    #[error("cancelled")]
    Cancelled,
}

impl StreamError {
    /// Transient failures are DNS/timeout/reset/refused-class problems that
    /// backoff is expected to ride out.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::DnsTimeout(_))
    }

    /// Whether the failure means the bearer token must be re-fetched.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient_network",
            Self::DnsTimeout(_) => "dns_timeout",
            Self::AuthExpired(_) => "auth_expired",
            Self::Auth(_) => "authentication_failed",
            Self::Protocol(_) => "protocol",
            Self::Startup(_) => "startup",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classify a `reqwest` transport failure. Connection refused, DNS
    /// failures and timeouts all surface here as connect/timeout errors.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Transient(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Startup(err.to_string())
        }
    }

    /// Classify an HTTP status from the auth or catalog endpoint.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth(body),
            429 | 500..=599 => Self::Transient(format!("status {status}: {body}")),
            _ => Self::Startup(format!("unexpected status {status}: {body}")),
        }
    }
}
