use lenstail_core::events::{DeviceStatusEvent, PeopleCountEvent};
use lenstail_core::sink::EventSink;
use tracing::info;

/// Sink that renders enriched records as structured log lines. The terminal
/// formatting itself is whatever the installed tracing layer does.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn people_count(&self, event: &PeopleCountEvent) {
        info!(
            target: "lenstail::people",
            room = event.room_name.as_deref().unwrap_or(&event.room_id),
            room_id = %event.room_id,
            count = event.count,
            updated_at = event.updated_at.as_deref().unwrap_or(""),
            payload = %event.raw,
            "people count"
        );
    }

    fn device_status(&self, event: &DeviceStatusEvent) {
        info!(
            target: "lenstail::devices",
            device = event.device_name.as_deref().unwrap_or(&event.device_id),
            device_id = %event.device_id,
            connected = event.connected,
            payload = %event.raw,
            "device status"
        );
    }

    fn lifecycle(&self, line: &str) {
        info!(target: "lenstail::lifecycle", "{line}");
    }
}
