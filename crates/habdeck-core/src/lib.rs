//! Domain layer between `habdeck-api` and the control surface.
//!
//! - **[`ConnectionManager`]**: owns the one openHAB session (WebSocket
//!   event stream with heartbeat, REST client for reads and commands) and
//!   publishes [`ConnectionEvent`]s.
//!
//! - **[`ActionRegistry`]**: the live set of [`Controller`]s, indexed by
//!   control id. Fans item state changes out to every controller bound to
//!   the item and hands commands to an [`ItemGateway`].
//!
//! - **[`DialCoalescer`]**: trailing-edge debounce for dial rotation.
//!   A burst of ticks becomes one clamped command.
//!
//! - **[`Bridge`]**: the single-task event loop wiring surface input,
//!   connection events and dial flushes together.

pub mod bridge;
pub mod coalescer;
pub mod config;
pub mod connection;
pub mod controller;
pub mod directory;
pub mod error;
pub mod registry;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, SurfaceEvent};
pub use coalescer::{DialCoalescer, ResolvedRotation};
pub use config::{ConnectionTuning, DialRange, DialTuning, Endpoints, ServerSettings};
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use controller::{
    CommandValue, ControlForm, ControlId, ControlKind, Controller, DialFeedback, ItemSettings,
    Surface,
};
pub use directory::ItemDirectory;
pub use error::CoreError;
pub use registry::{ActionRegistry, ItemGateway, RegistryEvent};
