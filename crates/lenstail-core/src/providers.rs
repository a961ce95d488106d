use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::catalog::{Device, Room};
use crate::errors::StreamError;

/// Opaque bearer token. Expiry is not tracked locally; the server tells us
/// via an UNAUTHENTICATED error or a 4401/4403 close, and the next preflight
/// fetches a fresh one.
#[derive(Clone)]
pub struct AccessToken {
    token: SecretString,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([redacted])")
    }
}

/// Acquires a bearer token before each connection attempt.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, StreamError>;
}

/// Retrieves the full room and device catalogs, paginating internally.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch_rooms(&self, token: &AccessToken) -> Result<Vec<Room>, StreamError>;
    async fn fetch_devices(&self, token: &AccessToken) -> Result<Vec<Device>, StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_format() {
        let token = AccessToken::new("abc123");
        assert_eq!(token.bearer(), "Bearer abc123");
    }

    #[test]
    fn debug_does_not_leak_token() {
        let token = AccessToken::new("super-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
    }
}
