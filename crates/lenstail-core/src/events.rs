use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One occupancy update, enriched with the room's display name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeopleCountEvent {
    pub room_id: String,
    /// Display name from the catalog lookup; `None` when the room id was not
    /// in the fetched catalog.
    pub room_name: Option<String>,
    pub count: i64,
    pub tenant_id: Option<String>,
    pub updated_at: Option<String>,
    /// The raw stream payload, untouched.
    pub raw: Value,
}

/// One device status update, enriched with the device's display name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceStatusEvent {
    pub device_id: String,
    pub device_name: Option<String>,
    pub connected: Option<bool>,
    /// The raw stream payload, untouched.
    pub raw: Value,
}
