//! Paginated room and device catalog retrieval over GraphQL HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use lenstail_core::catalog::{Device, Room};
use lenstail_core::config::Config;
use lenstail_core::errors::StreamError;
use lenstail_core::graphql::{GraphqlRequest, GraphqlResponse};
use lenstail_core::providers::{AccessToken, CatalogFetcher};

const PAGE_LIMIT: u32 = 15;
/// The server's cursor convention: the first page is requested with this
/// literal, subsequent pages with the `endCursor` from the previous page.
const INITIAL_CURSOR: &str = "endCursor";
const PAGING_DIRECTION: &str = "NEXT_PAGE";
/// Small pause between pages so a large catalog doesn't hammer the endpoint.
const PAGE_DELAY: Duration = Duration::from_millis(100);

const ROOMS_QUERY: &str = r#"query getRoomData($params: RoomConnectionParams) {
  tenants {
    roomData(params: $params) {
      total
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          name
          id
        }
      }
    }
  }
}"#;

const DEVICES_QUERY: &str = r#"query getDeviceData($params: DeviceConnectionParams) {
  tenants {
    deviceData(params: $params) {
      total
      pageInfo {
        hasNextPage
        endCursor
      }
      edges {
        node {
          name
          displayName
          id
        }
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Connection<N> {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    edges: Vec<Edge<N>>,
}

#[derive(Debug, Deserialize)]
struct Edge<N> {
    node: N,
}

#[derive(Debug, Deserialize)]
struct RoomTenants {
    tenants: Vec<RoomTenant>,
}

#[derive(Debug, Deserialize)]
struct RoomTenant {
    #[serde(rename = "roomData")]
    room_data: Connection<Room>,
}

#[derive(Debug, Deserialize)]
struct DeviceTenants {
    tenants: Vec<DeviceTenant>,
}

#[derive(Debug, Deserialize)]
struct DeviceTenant {
    #[serde(rename = "deviceData")]
    device_data: Connection<Device>,
}

/// Cursor-paginated catalog fetcher. Walks every page until the server
/// reports no next page, then returns the full set.
pub struct GraphqlCatalogFetcher {
    client: reqwest::Client,
    http_url: String,
}

impl GraphqlCatalogFetcher {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            http_url: config.http_url.clone(),
        }
    }

    async fn post_page<T: serde::de::DeserializeOwned>(
        &self,
        token: &AccessToken,
        query: &str,
        cursor: &str,
    ) -> Result<T, StreamError> {
        let request = GraphqlRequest {
            query: query.to_string(),
            variables: serde_json::json!({
                "params": {
                    "limit": PAGE_LIMIT,
                    "cursor": cursor,
                    "paging": PAGING_DIRECTION,
                }
            }),
        };

        let resp = self
            .client
            .post(&self.http_url)
            .header("Authorization", token.bearer())
            .json(&request)
            .send()
            .await
            .map_err(|e| StreamError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(StreamError::from_status(status.as_u16(), text));
        }

        let envelope: GraphqlResponse<T> = resp
            .json()
            .await
            .map_err(|e| StreamError::Protocol(format!("catalog response: {e}")))?;

        if let Some(errors) = &envelope.errors {
            if errors.iter().any(|e| e.is_auth()) {
                return Err(StreamError::AuthExpired(
                    errors
                        .iter()
                        .map(|e| e.message.clone())
                        .collect::<Vec<_>>()
                        .join("; "),
                ));
            }
        }

        envelope
            .data
            .ok_or_else(|| StreamError::Protocol("unexpected GraphQL response structure".into()))
    }
}

#[async_trait]
impl CatalogFetcher for GraphqlCatalogFetcher {
    async fn fetch_rooms(&self, token: &AccessToken) -> Result<Vec<Room>, StreamError> {
        let mut rooms = Vec::new();
        let mut cursor = INITIAL_CURSOR.to_string();

        loop {
            let data: RoomTenants = self.post_page(token, ROOMS_QUERY, &cursor).await?;
            let page = data
                .tenants
                .into_iter()
                .next()
                .map(|t| t.room_data)
                .ok_or_else(|| StreamError::Protocol("roomData missing from response".into()))?;

            rooms.extend(page.edges.into_iter().map(|e| e.node));
            tracing::debug!(
                fetched = rooms.len(),
                has_next = page.page_info.has_next_page,
                "room catalog page"
            );

            if !page.page_info.has_next_page {
                break;
            }
            cursor = page
                .page_info
                .end_cursor
                .ok_or_else(|| StreamError::Protocol("hasNextPage without endCursor".into()))?;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        tracing::info!(rooms = rooms.len(), "room catalog fetched");
        Ok(rooms)
    }

    async fn fetch_devices(&self, token: &AccessToken) -> Result<Vec<Device>, StreamError> {
        let mut devices = Vec::new();
        let mut cursor = INITIAL_CURSOR.to_string();

        loop {
            let data: DeviceTenants = self.post_page(token, DEVICES_QUERY, &cursor).await?;
            let page = data
                .tenants
                .into_iter()
                .next()
                .map(|t| t.device_data)
                .ok_or_else(|| StreamError::Protocol("deviceData missing from response".into()))?;

            devices.extend(page.edges.into_iter().map(|e| e.node));
            tracing::debug!(
                fetched = devices.len(),
                has_next = page.page_info.has_next_page,
                "device catalog page"
            );

            if !page.page_info.has_next_page {
                break;
            }
            cursor = page
                .page_info
                .end_cursor
                .ok_or_else(|| StreamError::Protocol("hasNextPage without endCursor".into()))?;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        tracing::info!(devices = devices.len(), "device catalog fetched");
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_page_parses() {
        let raw = serde_json::json!({
            "tenants": [{
                "roomData": {
                    "total": 2,
                    "pageInfo": { "hasNextPage": false, "endCursor": "abc" },
                    "edges": [
                        { "node": { "id": "r1", "name": "Boardroom" } },
                        { "node": { "id": "r2", "name": "Huddle" } }
                    ]
                }
            }]
        });
        let parsed: RoomTenants = serde_json::from_value(raw).unwrap();
        let page = &parsed.tenants[0].room_data;
        assert_eq!(page.edges.len(), 2);
        assert!(!page.page_info.has_next_page);
        assert_eq!(page.edges[0].node.id, "r1");
    }

    #[test]
    fn device_page_parses_with_optional_display_name() {
        let raw = serde_json::json!({
            "tenants": [{
                "deviceData": {
                    "total": 1,
                    "pageInfo": { "hasNextPage": true, "endCursor": "cur2" },
                    "edges": [
                        { "node": { "id": "00e0db93723a", "name": "panel", "displayName": null } }
                    ]
                }
            }]
        });
        let parsed: DeviceTenants = serde_json::from_value(raw).unwrap();
        let page = &parsed.tenants[0].device_data;
        assert!(page.page_info.has_next_page);
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("cur2"));
        assert!(page.edges[0].node.display_name.is_none());
    }

    #[test]
    fn graphql_error_envelope_parses() {
        let raw = r#"{
            "data": null,
            "errors": [{ "message": "nope", "extensions": { "code": "UNAUTHENTICATED" } }]
        }"#;
        let parsed: GraphqlResponse<RoomTenants> = serde_json::from_str(raw).unwrap();
        assert!(parsed.data.is_none());
        assert!(parsed.errors.unwrap()[0].is_auth());
    }
}
