//! Realtime session: transport negotiation, event routing, lifecycle.

pub mod bridge;
pub mod events;
pub mod transport;

pub use bridge::{BridgeEvent, RealtimeBridge, SessionState};
pub use events::ServerEvent;
pub use transport::{ChannelSignal, DataChannel, MediaTransport, TransportFactory};
