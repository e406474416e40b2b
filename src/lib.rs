//! Voxbridge — realtime voice-session bridge
//!
//! Connects a host application to a hosted realtime speech model: negotiates
//! the media+data transport (SDP offer/answer), streams structured JSON
//! events over the data channel, assembles delta-streamed transcripts into
//! stable chat entries, and round-trips model-initiated tool calls so
//! generation never stalls.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxbridge::prelude::*;
//!
//! # async fn example(factory: Arc<dyn TransportFactory>) -> voxbridge::error::Result<()> {
//! let credentials = Arc::new(SessionTokenProvider::new("http://localhost:8000/session"));
//! let tools = Arc::new(ToolRegistry::new());
//! let (bridge, mut events) =
//!     RealtimeBridge::new(BridgeConfig::default(), credentials, factory, tools);
//!
//! bridge.start().await?;
//! while let Some(event) = events.recv().await {
//!     if let BridgeEvent::TranscriptUpdated(entries) = event {
//!         println!("{} entries", entries.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod prelude;
pub mod session;
pub mod tools;
pub mod transcript;
