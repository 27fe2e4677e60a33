// habdeck-api: Async Rust client for the openHAB REST API and WebSocket event stream

pub mod error;
pub mod messages;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use messages::{Inbound, ItemStateChangedEvent, StatePayload, WireMessage};
pub use rest::{Item, RestClient};
pub use transport::TransportConfig;
pub use websocket::{SessionConfig, SessionEvent, SessionHandle};
