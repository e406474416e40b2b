//! Convenience re-exports for common usage.
//!
//! ```rust
//! use voxbridge::prelude::*;
//! ```

pub use crate::config::{BridgeConfig, TurnDetection};
pub use crate::credentials::{CredentialProvider, EphemeralCredential, SessionTokenProvider};
pub use crate::error::{BridgeError, Result};
pub use crate::session::{
    BridgeEvent, ChannelSignal, DataChannel, MediaTransport, RealtimeBridge, SessionState,
    TransportFactory,
};
pub use crate::tools::{ContextRetrievalTool, FunctionTool, Tool, ToolParameters, ToolRegistry};
pub use crate::transcript::{Speaker, TranscriptAggregator, TranscriptEntry};
