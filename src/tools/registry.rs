//! Tool registry: one lookup table for both dispatch and declared schemas.
//!
//! The schemas sent to the remote session and the local dispatch table come
//! from the same registration, so they cannot drift apart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{BridgeError, Result};

use super::tool::Tool;

/// Maps tool names the model may invoke to local async handlers.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name, replacing any previous entry.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().expect("tool registry lock poisoned");
        if tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "replaced existing tool registration");
        }
    }

    /// Invoke a tool by name. Fails with [`BridgeError::UnknownTool`] if the
    /// name was never registered.
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<String> {
        let tool = {
            let tools = self.tools.read().expect("tool registry lock poisoned");
            tools.get(name).cloned()
        };
        let tool = tool.ok_or_else(|| BridgeError::UnknownTool(name.to_string()))?;
        tool.execute(args).await
    }

    /// Function schemas in the shape the session configuration declares them.
    pub fn schemas(&self) -> Vec<Value> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut schemas: Vec<Value> = tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters().schema(),
                })
            })
            .collect();
        // Stable order for the wire payload regardless of map iteration.
        schemas.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        schemas
    }

    pub fn len(&self) -> usize {
        self.tools.read().expect("tool registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        f.debug_struct("ToolRegistry")
            .field("tools", &tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
