//! Media transport seam and SDP negotiation.
//!
//! The bridge does not bundle a WebRTC stack; the host supplies one behind
//! [`MediaTransport`] (a browser peer connection via WASM, a native WebRTC
//! implementation, or a test fake). The bridge owns everything above the
//! seam: lifecycle ordering, the offer/answer HTTP exchange, and the event
//! protocol on the data channel.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::mpsc;

use crate::error::{BridgeError, Result};

/// Signals surfaced by a data channel, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    /// The channel finished opening; safe to send.
    Open,
    /// One inbound wire message (JSON text).
    Message(String),
    /// The remote end closed the channel.
    Closed,
    /// The transport failed underneath the channel.
    Error(String),
}

/// Sending half of an open data channel. Cheap to share; tool dispatch tasks
/// hold a clone so results can be written back without blocking the session
/// loop.
#[async_trait]
pub trait DataChannel: Send + Sync {
    async fn send(&self, payload: String) -> Result<()>;
    async fn close(&self);
}

/// One media+data connection, exclusively owned by one session.
///
/// Method order matters and mirrors the negotiation steps: microphone first,
/// then the data channel (so its handlers exist before any event can
/// arrive), then offer/answer.
#[async_trait]
pub trait MediaTransport: Send {
    /// Acquire microphone capture and attach the local audio track.
    /// Fails with [`BridgeError::MediaAccessDenied`].
    async fn attach_microphone(&mut self) -> Result<()>;

    /// Create the event data channel and start delivering its signals.
    async fn open_data_channel(
        &mut self,
        label: &str,
    ) -> Result<(Arc<dyn DataChannel>, mpsc::UnboundedReceiver<ChannelSignal>)>;

    /// Construct the local session description and set it locally.
    async fn create_offer(&mut self) -> Result<String>;

    /// Apply the remote session description received from negotiation.
    async fn set_remote_answer(&mut self, sdp: &str) -> Result<()>;

    /// Tear down tracks and the underlying connection. Idempotent.
    async fn close(&mut self);
}

/// Creates a fresh transport per session.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn MediaTransport>>;
}

/// Exchange the local offer for the remote answer.
///
/// `POST <negotiation_url>?model=<model>` with the ephemeral secret as bearer
/// auth and the raw offer SDP as the body; the response body is the raw
/// answer SDP.
pub async fn negotiate_answer(
    client: &reqwest::Client,
    negotiation_url: &str,
    model: &str,
    secret: &str,
    offer_sdp: &str,
) -> Result<String> {
    let url = build_negotiation_url(negotiation_url, model)?;
    tracing::debug!(%url, "posting SDP offer");

    let response = client
        .post(&url)
        .header(AUTHORIZATION, format!("Bearer {secret}"))
        .header(CONTENT_TYPE, "application/sdp")
        .body(offer_sdp.to_string())
        .send()
        .await
        .map_err(|error| {
            BridgeError::NegotiationFailed(format!("offer exchange request failed: {error}"))
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(BridgeError::NegotiationFailed(format!(
            "negotiation endpoint returned status {status}"
        )));
    }

    let answer = response.text().await.map_err(|error| {
        BridgeError::NegotiationFailed(format!("reading answer body failed: {error}"))
    })?;
    if answer.trim().is_empty() {
        return Err(BridgeError::NegotiationFailed(
            "negotiation endpoint returned an empty answer".to_string(),
        ));
    }
    Ok(answer)
}

fn build_negotiation_url(base_url: &str, model: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidState(
            "negotiation URL cannot be empty".to_string(),
        ));
    }
    let separator = if trimmed.contains('?') { "&" } else { "?" };
    Ok(format!("{trimmed}{separator}model={model}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_url_appends_model_query() {
        assert_eq!(
            build_negotiation_url("https://api.example.com/v1/realtime", "m1").unwrap(),
            "https://api.example.com/v1/realtime?model=m1"
        );
        assert_eq!(
            build_negotiation_url("https://api.example.com/v1/realtime?beta=1", "m1").unwrap(),
            "https://api.example.com/v1/realtime?beta=1&model=m1"
        );
    }

    #[test]
    fn empty_negotiation_url_is_rejected() {
        assert!(build_negotiation_url("  ", "m1").is_err());
    }
}
