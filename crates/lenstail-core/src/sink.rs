use crate::events::{DeviceStatusEvent, PeopleCountEvent};

/// Receives enriched records and lifecycle diagnostics. Implementations must
/// not block; the connection manager calls these from its event loop.
pub trait EventSink: Send + Sync {
    fn people_count(&self, event: &PeopleCountEvent);
    fn device_status(&self, event: &DeviceStatusEvent);
    /// Lifecycle and close diagnostics ("connected", "disconnected: ...").
    fn lifecycle(&self, line: &str);
}

/// Sink that drops everything. Useful in tests that only exercise the
/// connection machinery.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn people_count(&self, _event: &PeopleCountEvent) {}
    fn device_status(&self, _event: &DeviceStatusEvent) {}
    fn lifecycle(&self, _line: &str) {}
}
