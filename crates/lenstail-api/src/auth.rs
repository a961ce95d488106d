//! OAuth2 client-credentials token exchange.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;

use lenstail_core::config::Config;
use lenstail_core::errors::StreamError;
use lenstail_core::providers::{AccessToken, TokenProvider};

const GRANT_TYPE: &str = "client_credentials";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Fetches a bearer token from the auth endpoint before each connection
/// attempt. Tokens are deliberately not cached: a reconnect always starts
/// from a fresh exchange.
pub struct OauthTokenProvider {
    client: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: secrecy::SecretString,
}

impl OauthTokenProvider {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            auth_url: config.auth_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenProvider for OauthTokenProvider {
    async fn fetch_token(&self) -> Result<AccessToken, StreamError> {
        let body = serde_json::json!({
            "client_id": self.client_id,
            "client_secret": self.client_secret.expose_secret(),
            "grant_type": GRANT_TYPE,
        });

        tracing::debug!(url = %self.auth_url, client_id = %self.client_id, "requesting access token");

        let resp = self
            .client
            .post(&self.auth_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StreamError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StreamError::from_status(status.as_u16(), text));
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StreamError::Protocol(format!("token response: {e}")))?;

        tracing::info!("access token acquired");
        Ok(AccessToken::new(data.access_token))
    }
}
