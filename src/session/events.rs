//! Data-channel wire events.
//!
//! The `type` discriminators and field names here are the vendor's fixed
//! vocabulary; they must be preserved verbatim for interop.

use serde_json::{json, Value};

use crate::config::BridgeConfig;

/// Inbound events the bridge reacts to. Anything else is `Other` and ignored
/// by the dispatcher, so protocol additions never break the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// The streamed content part for a response finished.
    ContentPartDone { response_id: Option<String> },
    /// An incremental transcript fragment for one response.
    TranscriptDelta { response_id: String, delta: String },
    /// The model finished emitting arguments for a function call.
    FunctionCallArgsDone {
        name: String,
        arguments: String,
        call_id: String,
    },
    /// Server-side transcription of a completed user utterance.
    UserTranscriptCompleted { transcript: String },
    Other { event_type: String },
}

impl ServerEvent {
    /// Parse a server payload into a typed event.
    ///
    /// Returns `None` when the payload has no string `type`, or when a known
    /// event is missing a field it cannot be dispatched without.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let event_type = payload.get("type")?.as_str()?;
        match event_type {
            "response.content_part.done" => Some(Self::ContentPartDone {
                response_id: string_field(payload, "response_id"),
            }),
            "response.audio_transcript.delta" => {
                let response_id = string_field(payload, "response_id")?;
                let delta = string_field(payload, "delta")?;
                Some(Self::TranscriptDelta { response_id, delta })
            }
            "response.function_call_arguments.done" => {
                let name = string_field(payload, "name")?;
                let arguments = string_field(payload, "arguments")?;
                let call_id = string_field(payload, "call_id")?;
                Some(Self::FunctionCallArgsDone {
                    name,
                    arguments,
                    call_id,
                })
            }
            "conversation.item.input_audio_transcription.completed" => {
                string_field(payload, "transcript")
                    .map(|transcript| Self::UserTranscriptCompleted { transcript })
            }
            _ => Some(Self::Other {
                event_type: event_type.to_string(),
            }),
        }
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Build the `session.update` sent once the data channel opens: modalities,
/// tool schemas, transcription model, turn-detection tuning, tool choice.
pub fn session_update(config: &BridgeConfig, tool_schemas: &[Value]) -> Value {
    let mut session = json!({
        "modalities": ["text", "audio"],
        "tools": tool_schemas,
        "input_audio_transcription": {
            "model": config.transcription_model,
        },
        "turn_detection": {
            "type": "server_vad",
            "threshold": config.turn_detection.threshold,
            "prefix_padding_ms": config.turn_detection.prefix_padding.as_millis() as u64,
            "silence_duration_ms": config.turn_detection.silence_duration.as_millis() as u64,
        },
        "tool_choice": "auto",
    });
    if let Some(instructions) = &config.instructions {
        session["instructions"] = json!(instructions);
    }
    json!({ "type": "session.update", "session": session })
}

/// Build a typed user message item.
pub fn user_text_item(text: &str) -> Value {
    json!({
        "type": "conversation.item.create",
        "item": { "type": "text", "text": text },
    })
}

/// Build a function-call result item. `output` is a raw string payload.
pub fn function_call_output(call_id: &str, output: &str) -> Value {
    json!({
        "type": "conversation.item.create",
        "item": {
            "type": "function_call_output",
            "call_id": call_id,
            "output": output,
        },
    })
}

/// Ask the model to continue generating (required after every tool output).
pub fn response_create() -> Value {
    json!({ "type": "response.create" })
}
