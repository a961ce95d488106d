pub mod close;
pub mod drift;
pub mod heartbeat;
pub mod manager;
pub mod net;
pub mod protocol;
pub mod reconnect;
pub mod settings;

pub use manager::{AttemptOutcome, ConnectionManager};
pub use reconnect::{ReconnectPolicy, ReconnectScheduler};
pub use settings::StreamSettings;
