//! Context retrieval tool.
//!
//! The one built-in capability the assistant can invoke mid-conversation:
//! fetch related prior-meeting context from the retrieval service and hand it
//! back so generation can continue.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::BridgeError;

use super::tool::{Tool, ToolParameters};

const TOOL_NAME: &str = "retrieve_context";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Retrieves stored conversation context for the current meeting
/// (`GET <base>/context?query=..&meetingId=..[&projectId=..]`).
#[derive(Debug, Clone)]
pub struct ContextRetrievalTool {
    client: reqwest::Client,
    base_url: String,
    meeting_id: String,
    project_id: Option<String>,
    parameters: ToolParameters,
}

impl ContextRetrievalTool {
    pub fn new(base_url: impl Into<String>, meeting_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self::new_with_client(base_url, meeting_id, client)
    }

    pub fn new_with_client(
        base_url: impl Into<String>,
        meeting_id: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            meeting_id: meeting_id.into(),
            project_id: None,
            parameters: ToolParameters::object()
                .string("query", "The user query", true)
                .build(),
        }
    }

    /// Widen retrieval from the current meeting to the whole project.
    pub fn with_project_scope(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

#[derive(Deserialize)]
struct ContextResponse {
    context: String,
}

#[async_trait]
impl Tool for ContextRetrievalTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Retrieves related conversations stored for past meetings based on a user query. \
         Use it to fetch summaries, key points, participants, or anything previously \
         discussed, so answers stay grounded in what was actually said."
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: &Value) -> Result<String, BridgeError> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::tool_execution(TOOL_NAME, "missing \"query\" argument"))?;

        let url = format!("{}/context", self.base_url.trim_end_matches('/'));
        let mut request = self
            .client
            .get(&url)
            .query(&[("query", query), ("meetingId", self.meeting_id.as_str())]);
        if let Some(project_id) = &self.project_id {
            request = request.query(&[("projectId", project_id.as_str())]);
        }

        let response = request.send().await.map_err(|error| {
            BridgeError::tool_execution(TOOL_NAME, format!("retrieval request failed: {error}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::tool_execution(
                TOOL_NAME,
                format!("retrieval service returned status {status}"),
            ));
        }

        let payload: ContextResponse = response.json().await.map_err(|error| {
            BridgeError::tool_execution(TOOL_NAME, format!("malformed retrieval payload: {error}"))
        })?;

        Ok(payload.context)
    }
}
