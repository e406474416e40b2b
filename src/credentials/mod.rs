//! Ephemeral credential acquisition.
//!
//! The browser-facing bridge never holds a long-lived vendor secret. A local
//! trusted endpoint mints a short-lived client secret, which is then used as
//! bearer auth against the vendor's negotiation endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{BridgeError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A short-lived secret for one negotiation.
#[derive(Debug, Clone)]
pub struct EphemeralCredential {
    pub secret: String,
}

/// Source of ephemeral credentials for the realtime API.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Fetch a fresh short-lived credential.
    async fn ephemeral_credential(&self) -> Result<EphemeralCredential>;
}

/// Fetches credentials from a local session endpoint
/// (`GET <endpoint>` returning `{"client_secret": {"value": "..."}}`).
#[derive(Debug, Clone)]
pub struct SessionTokenProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl SessionTokenProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn new_with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Deserialize)]
struct SessionTokenResponse {
    client_secret: ClientSecret,
}

#[derive(Deserialize)]
struct ClientSecret {
    value: String,
}

#[async_trait]
impl CredentialProvider for SessionTokenProvider {
    async fn ephemeral_credential(&self) -> Result<EphemeralCredential> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|error| {
                BridgeError::CredentialUnavailable(format!(
                    "session endpoint request failed: {error}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::CredentialUnavailable(format!(
                "session endpoint returned status {status}"
            )));
        }

        let payload: SessionTokenResponse = response.json().await.map_err(|error| {
            BridgeError::CredentialUnavailable(format!("malformed session payload: {error}"))
        })?;

        if payload.client_secret.value.trim().is_empty() {
            return Err(BridgeError::CredentialUnavailable(
                "session endpoint returned an empty client secret".to_string(),
            ));
        }

        Ok(EphemeralCredential {
            secret: payload.client_secret.value,
        })
    }
}
