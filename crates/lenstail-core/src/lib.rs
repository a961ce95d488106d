pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod graphql;
pub mod providers;
pub mod sink;

pub use catalog::{CatalogIndex, Device, Room, SubscriptionVars};
pub use config::Config;
pub use errors::StreamError;
pub use events::{DeviceStatusEvent, PeopleCountEvent};
pub use providers::{AccessToken, CatalogFetcher, TokenProvider};
pub use sink::EventSink;
