//! Bridge configuration.

use std::time::Duration;

/// Configuration for a realtime voice session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Model identifier appended to the negotiation URL.
    pub model: String,
    /// Vendor endpoint that accepts the SDP offer and returns the answer.
    pub negotiation_url: String,
    /// Label for the event data channel.
    pub data_channel_label: String,
    /// Speech-to-text model declared in the session configuration.
    pub transcription_model: String,
    /// Optional system instructions sent with the session configuration.
    pub instructions: Option<String>,
    /// Server-side voice-activity turn detection tuning.
    pub turn_detection: TurnDetection,
    /// How often accumulated transcript deltas are flushed to subscribers.
    pub flush_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini-realtime-preview".to_string(),
            negotiation_url: "https://api.openai.com/v1/realtime".to_string(),
            data_channel_label: "oai-events".to_string(),
            transcription_model: "whisper-1".to_string(),
            instructions: None,
            turn_detection: TurnDetection::default(),
            flush_interval: Duration::from_millis(100),
        }
    }
}

/// Server VAD tuning: when a user turn is considered started and finished.
#[derive(Debug, Clone)]
pub struct TurnDetection {
    /// Energy threshold for speech detection.
    pub threshold: f64,
    /// Audio kept before detected speech onset.
    pub prefix_padding: Duration,
    /// Trailing silence before a turn is considered complete.
    pub silence_duration: Duration,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding: Duration::from_millis(300),
            silence_duration: Duration::from_millis(500),
        }
    }
}
