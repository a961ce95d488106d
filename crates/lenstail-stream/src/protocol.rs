//! graphql-transport-ws message envelope and per-subscription dispatch.
//!
//! Frames are decoded once at this boundary into a closed tagged enum; the
//! handlers never see raw JSON strings. Frames are processed strictly in
//! arrival order on the single connection stream.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use lenstail_core::catalog::{CatalogIndex, SubscriptionVars};
use lenstail_core::events::{DeviceStatusEvent, PeopleCountEvent};
use lenstail_core::graphql::GraphqlError;
use lenstail_core::providers::AccessToken;
use lenstail_core::sink::EventSink;

/// Negotiated WebSocket subprotocol.
pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-transport-ws";

/// The two fixed logical channels. Stable constants, never reallocated.
pub const SUB_ID_PEOPLE: &str = "1";
pub const SUB_ID_DEVICES: &str = "2";

const PEOPLE_QUERY: &str = r#"subscription PeopleCountStream($tenantId: ID!, $roomIds: [ID!]!) {
  peopleCountStream(tenantId: $tenantId, roomIds: $roomIds) {
    count
    roomId
    tenantId
    updatedAt
  }
}"#;

const DEVICES_QUERY: &str = r#"subscription DeviceStream($deviceIds: [String!]!) {
  deviceStream(deviceIds: $deviceIds) {
    connected
    externalIp
    hardwareRevision
    id
    macAddress
    modelId
    name
    productId
    roomId
    siteId
    softwareBuild
    softwareVersion
    tenantId
  }
}"#;

// ─── Outbound frames ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
pub struct InitHeaders {
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct InitPayload {
    pub headers: InitHeaders,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubscribePayload {
    pub query: String,
    pub variables: Value,
}

/// Frames we send. Serializes to the `{type, id?, payload?}` envelope.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit { payload: InitPayload },
    Subscribe { id: String, payload: SubscribePayload },
    Ping,
    Pong,
}

impl ClientMessage {
    pub fn connection_init(token: &AccessToken) -> Self {
        Self::ConnectionInit {
            payload: InitPayload {
                headers: InitHeaders {
                    authorization: token.bearer(),
                },
            },
        }
    }

    pub fn subscribe_people(vars: &SubscriptionVars) -> Self {
        Self::Subscribe {
            id: SUB_ID_PEOPLE.to_string(),
            payload: SubscribePayload {
                query: PEOPLE_QUERY.to_string(),
                variables: serde_json::json!({
                    "tenantId": vars.tenant_id,
                    "roomIds": vars.room_ids,
                }),
            },
        }
    }

    pub fn subscribe_devices(vars: &SubscriptionVars) -> Self {
        Self::Subscribe {
            id: SUB_ID_DEVICES.to_string(),
            payload: SubscribePayload {
                query: DEVICES_QUERY.to_string(),
                variables: serde_json::json!({
                    "deviceIds": vars.device_ids,
                }),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ─── Inbound frames ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    id: Option<String>,
    payload: Option<Value>,
}

/// Frames the server sends, plus an explicit unknown variant for forward
/// compatibility.
#[derive(Debug)]
pub enum ServerMessage {
    ConnectionAck,
    Next { id: Option<String>, payload: Option<Value> },
    Error { id: Option<String>, errors: Vec<GraphqlError> },
    Complete { id: Option<String> },
    Ping,
    Pong,
    Unknown { kind: String },
}

impl ServerMessage {
    /// Decode one text frame. Malformed JSON is the caller's signal to log
    /// and ignore, not to close the socket.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Ok(match envelope.kind.as_str() {
            "connection_ack" => Self::ConnectionAck,
            "next" => Self::Next {
                id: envelope.id,
                payload: envelope.payload,
            },
            "error" => {
                let errors = match envelope.payload {
                    Some(payload) => match serde_json::from_value::<Vec<GraphqlError>>(payload) {
                        Ok(errors) => errors,
                        Err(e) => {
                            warn!(error = %e, "error frame payload did not parse");
                            Vec::new()
                        }
                    },
                    None => {
                        warn!("error frame without payload");
                        Vec::new()
                    }
                };
                Self::Error {
                    id: envelope.id,
                    errors,
                }
            }
            "complete" => Self::Complete { id: envelope.id },
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            other => Self::Unknown {
                kind: other.to_string(),
            },
        })
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// What the connection manager should do in response to a frame.
#[derive(Debug)]
pub enum ProtocolAction {
    /// Queue these frames for sending.
    Send(Vec<ClientMessage>),
    /// Terminate the socket with this close hint.
    Terminate { hint: String },
}

/// Per-connection dispatcher: owns the catalog lookups and variable sets
/// captured during preflight, routes data frames to the sink.
pub struct SubscriptionProtocol {
    index: CatalogIndex,
    vars: SubscriptionVars,
    sink: Arc<dyn EventSink>,
    acked: bool,
}

impl SubscriptionProtocol {
    pub fn new(index: CatalogIndex, vars: SubscriptionVars, sink: Arc<dyn EventSink>) -> Self {
        Self {
            index,
            vars,
            sink,
            acked: false,
        }
    }

    /// Whether the handshake has completed.
    pub fn is_acked(&self) -> bool {
        self.acked
    }

    /// Handle one inbound text frame.
    pub fn handle_frame(&mut self, text: &str) -> Option<ProtocolAction> {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "skipping malformed frame");
                return None;
            }
        };
        self.handle_message(message)
    }

    fn handle_message(&mut self, message: ServerMessage) -> Option<ProtocolAction> {
        match message {
            ServerMessage::ConnectionAck => {
                self.acked = true;
                info!(
                    rooms = self.vars.room_ids.len(),
                    devices = self.vars.device_ids.len(),
                    "handshake acknowledged, subscribing"
                );
                Some(ProtocolAction::Send(vec![
                    ClientMessage::subscribe_people(&self.vars),
                    ClientMessage::subscribe_devices(&self.vars),
                ]))
            }
            ServerMessage::Next { id, payload } => {
                self.handle_next(id.as_deref(), payload);
                None
            }
            ServerMessage::Error { id, errors } => self.handle_errors(id.as_deref(), &errors),
            ServerMessage::Complete { id } => {
                // The other subscription may still be live; not a close.
                info!(id = id.as_deref().unwrap_or("?"), "server completed subscription");
                None
            }
            ServerMessage::Ping => Some(ProtocolAction::Send(vec![ClientMessage::Pong])),
            ServerMessage::Pong => {
                debug!("protocol-level pong");
                None
            }
            ServerMessage::Unknown { kind } => {
                debug!(kind = %kind, "unrecognized frame type");
                None
            }
        }
    }

    fn handle_next(&self, id: Option<&str>, payload: Option<Value>) {
        let Some(data) = payload.as_ref().and_then(|p| p.get("data")) else {
            warn!(id = id.unwrap_or("?"), "next frame without payload.data");
            return;
        };

        match id {
            Some(SUB_ID_PEOPLE) => {
                let Some(raw) = data.get("peopleCountStream") else {
                    warn!("people frame missing peopleCountStream");
                    return;
                };
                self.sink.people_count(&self.enrich_people(raw));
            }
            Some(SUB_ID_DEVICES) => {
                let Some(raw) = data.get("deviceStream") else {
                    warn!("device frame missing deviceStream");
                    return;
                };
                self.sink.device_status(&self.enrich_device(raw));
            }
            other => {
                warn!(id = other.unwrap_or("?"), "data frame for unknown subscription id");
            }
        }
    }

    fn handle_errors(&self, id: Option<&str>, errors: &[GraphqlError]) -> Option<ProtocolAction> {
        if errors.is_empty() {
            warn!(id = id.unwrap_or("?"), "error frame carried no error entries");
            return None;
        }
        for error in errors {
            if error.is_auth() {
                return Some(ProtocolAction::Terminate {
                    hint: format!("subscription auth error: {}", error.message),
                });
            }
            warn!(
                id = id.unwrap_or("?"),
                code = error.code().unwrap_or("?"),
                "subscription error: {}",
                error.message
            );
        }
        None
    }

    fn enrich_people(&self, raw: &Value) -> PeopleCountEvent {
        let room_id = str_field(raw, "roomId").unwrap_or_default();
        PeopleCountEvent {
            room_name: self.index.room_name(&room_id).map(str::to_string),
            room_id,
            count: raw.get("count").and_then(Value::as_i64).unwrap_or(0),
            tenant_id: str_field(raw, "tenantId"),
            updated_at: str_field(raw, "updatedAt"),
            raw: raw.clone(),
        }
    }

    fn enrich_device(&self, raw: &Value) -> DeviceStatusEvent {
        let device_id = str_field(raw, "id").unwrap_or_default();
        DeviceStatusEvent {
            device_name: self.index.device_name(&device_id).map(str::to_string),
            device_id,
            connected: raw.get("connected").and_then(Value::as_bool),
            raw: raw.clone(),
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
