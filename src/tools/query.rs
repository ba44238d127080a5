use super::traits::{Tool, ToolResult};
use crate::rag::QueryEngine;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Exposes a [`QueryEngine`] as a tool taking a single `input` question.
pub struct QueryEngineTool {
    name: String,
    description: String,
    engine: Arc<dyn QueryEngine>,
}

impl QueryEngineTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        engine: Arc<dyn QueryEngine>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            engine,
        }
    }
}

#[async_trait]
impl Tool for QueryEngineTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "The question to answer from this document"
                }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        // Small models sometimes send a bare string instead of an object.
        let input = match &args {
            serde_json::Value::String(s) => Some(s.as_str()),
            other => other.get("input").and_then(|v| v.as_str()),
        };
        let Some(input) = input.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(ToolResult::failed("Missing 'input' parameter"));
        };

        info!(tool = %self.name, "query tool called");
        match self.engine.query(input).await {
            Ok(answer) => Ok(ToolResult::ok(answer)),
            Err(e) => {
                warn!(tool = %self.name, error = %e, "query tool failed");
                Ok(ToolResult::failed(crate::providers::sanitize_api_error(
                    &e.to_string(),
                )))
            }
        }
    }
}
