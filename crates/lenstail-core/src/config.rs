use secrecy::SecretString;
use url::Url;

use crate::errors::StreamError;

/// Immutable process-lifetime configuration: the three endpoints, tenant
/// identifier and OAuth2 client credentials. Built once by the entry point
/// and shared read-only with every component.
#[derive(Clone, Debug)]
pub struct Config {
    /// OAuth2 token endpoint.
    pub auth_url: String,
    /// GraphQL HTTP endpoint (catalog queries).
    pub http_url: String,
    /// GraphQL WebSocket endpoint (subscriptions).
    pub ws_url: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Optional fixed device-id list. When set, subscriptions target these
    /// devices instead of the full fetched catalog.
    pub device_ids: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `AUTH_URL`, `HTTP_URL`, `WS_URL`, `TENANT_ID`, `CLIENT_ID` and
    /// `CLIENT_SECRET` are required; `DEVICE_IDS` is an optional
    /// comma-separated list.
    pub fn from_env() -> Result<Self, StreamError> {
        let config = Self {
            auth_url: require_env("AUTH_URL")?,
            http_url: require_env("HTTP_URL")?,
            ws_url: require_env("WS_URL")?,
            tenant_id: require_env("TENANT_ID")?,
            client_id: require_env("CLIENT_ID")?,
            client_secret: SecretString::from(require_env("CLIENT_SECRET")?),
            device_ids: std::env::var("DEVICE_IDS").ok().map(|raw| {
                raw.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            }),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject endpoints that cannot be parsed before the core ever starts.
    pub fn validate(&self) -> Result<(), StreamError> {
        for (name, raw) in [
            ("AUTH_URL", &self.auth_url),
            ("HTTP_URL", &self.http_url),
            ("WS_URL", &self.ws_url),
        ] {
            let url = Url::parse(raw)
                .map_err(|e| StreamError::Startup(format!("{name} is not a valid URL: {e}")))?;
            if url.host_str().is_none() {
                return Err(StreamError::Startup(format!("{name} has no host")));
            }
        }
        Ok(())
    }

    /// Distinct hostnames of all three endpoints, for the DNS readiness gate.
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts = Vec::new();
        for raw in [&self.auth_url, &self.http_url, &self.ws_url] {
            if let Ok(url) = Url::parse(raw) {
                if let Some(host) = url.host_str() {
                    if !hosts.iter().any(|h| h == host) {
                        hosts.push(host.to_string());
                    }
                }
            }
        }
        hosts
    }
}

fn require_env(name: &str) -> Result<String, StreamError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(StreamError::Startup(format!(
            "missing required environment variable {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            auth_url: "https://auth.example.com/oauth/token".into(),
            http_url: "https://api.example.com/graphql".into(),
            ws_url: "wss://api.example.com/graphql".into(),
            tenant_id: "tenant-1".into(),
            client_id: "client-1".into(),
            client_secret: SecretString::from("shh".to_string()),
            device_ids: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_endpoints() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_garbage_url() {
        let mut config = test_config();
        config.ws_url = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("WS_URL"));
    }

    #[test]
    fn hosts_are_deduplicated() {
        let config = test_config();
        let hosts = config.hosts();
        assert_eq!(hosts.len(), 2);
        assert!(hosts.contains(&"auth.example.com".to_string()));
        assert!(hosts.contains(&"api.example.com".to_string()));
    }

    #[test]
    fn hosts_keeps_ws_host_when_distinct() {
        let mut config = test_config();
        config.ws_url = "wss://stream.example.com/graphql".into();
        assert_eq!(config.hosts().len(), 3);
    }
}
