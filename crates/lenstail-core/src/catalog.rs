use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A room as returned by the catalog query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
}

/// A device as returned by the catalog query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

impl Device {
    /// Preferred human label: display name when present, else the raw name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// The variable sets bound to the two subscription operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionVars {
    pub tenant_id: String,
    pub room_ids: Vec<String>,
    pub device_ids: Vec<String>,
}

/// Id → display-name lookups for one connection attempt. Built once after the
/// catalog fetch, never mutated afterwards; used only to enrich output.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    rooms: HashMap<String, String>,
    devices: HashMap<String, String>,
}

impl CatalogIndex {
    pub fn build(rooms: &[Room], devices: &[Device]) -> Self {
        Self {
            rooms: rooms
                .iter()
                .map(|r| (r.id.clone(), r.name.clone()))
                .collect(),
            devices: devices
                .iter()
                .map(|d| (d.id.clone(), d.label().to_string()))
                .collect(),
        }
    }

    pub fn room_name(&self, id: &str) -> Option<&str> {
        self.rooms.get(id).map(String::as_str)
    }

    pub fn device_name(&self, id: &str) -> Option<&str> {
        self.devices.get(id).map(String::as_str)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl SubscriptionVars {
    /// Derive the variable sets for one attempt. A configured device-id
    /// override wins over the fetched catalog.
    pub fn derive(
        tenant_id: &str,
        rooms: &[Room],
        devices: &[Device],
        device_override: Option<&[String]>,
    ) -> Self {
        let device_ids = match device_override {
            Some(ids) => ids.to_vec(),
            None => devices.iter().map(|d| d.id.clone()).collect(),
        };
        Self {
            tenant_id: tenant_id.to_string(),
            room_ids: rooms.iter().map(|r| r.id.clone()).collect(),
            device_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms() -> Vec<Room> {
        vec![
            Room { id: "r1".into(), name: "Boardroom".into() },
            Room { id: "r2".into(), name: "Huddle".into() },
        ]
    }

    fn devices() -> Vec<Device> {
        vec![
            Device {
                id: "00e0db93723a".into(),
                name: "panel-1".into(),
                display_name: Some("Lobby Panel".into()),
            },
            Device {
                id: "00e0db775ba0".into(),
                name: "panel-2".into(),
                display_name: None,
            },
        ]
    }

    #[test]
    fn index_lookups() {
        let index = CatalogIndex::build(&rooms(), &devices());
        assert_eq!(index.room_name("r1"), Some("Boardroom"));
        assert_eq!(index.device_name("00e0db93723a"), Some("Lobby Panel"));
        // Falls back to name when displayName is absent
        assert_eq!(index.device_name("00e0db775ba0"), Some("panel-2"));
        assert_eq!(index.room_name("nope"), None);
    }

    #[test]
    fn vars_from_catalog() {
        let vars = SubscriptionVars::derive("t1", &rooms(), &devices(), None);
        assert_eq!(vars.tenant_id, "t1");
        assert_eq!(vars.room_ids, vec!["r1", "r2"]);
        assert_eq!(vars.device_ids.len(), 2);
    }

    #[test]
    fn device_override_wins() {
        let fixed = vec!["aa".to_string(), "bb".to_string()];
        let vars = SubscriptionVars::derive("t1", &rooms(), &devices(), Some(&fixed));
        assert_eq!(vars.device_ids, fixed);
    }
}
