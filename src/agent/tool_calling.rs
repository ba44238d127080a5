//! Native tool-calling agent loop.

use super::traits::{Agent, AgentResult};
use crate::memory::ChatMemory;
use crate::providers::{ChatMessage, ChatRequest, Provider, ToolCall, ToolSpec};
use crate::tools::{find_tool, Tool, ToolRetriever};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Offers the retrieved candidate tools to the model, runs whatever it
/// calls, and feeds the results back until it answers in plain text.
pub struct ToolCallingAgent {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    system_prompt: String,
    retriever: Arc<dyn ToolRetriever>,
    max_iterations: usize,
}

impl ToolCallingAgent {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f64,
        system_prompt: impl Into<String>,
        retriever: Arc<dyn ToolRetriever>,
        max_iterations: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            system_prompt: system_prompt.into(),
            retriever,
            max_iterations: max_iterations.max(1),
        }
    }

    async fn run_tool(candidates: &[Arc<dyn Tool>], call: &ToolCall) -> String {
        let Some(tool) = find_tool(candidates, &call.name) else {
            warn!(tool = %call.name, "model requested a tool that was not offered");
            return format!("Error: unknown tool '{}'", call.name);
        };
        let args = serde_json::from_str(&call.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
        let started = Instant::now();
        let observation = match tool.execute(args).await {
            Ok(result) => result.to_observation(),
            Err(e) => format!("Error: {e}"),
        };
        debug!(
            tool = %call.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool finished"
        );
        observation
    }
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn chat(&self, memory: &ChatMemory, utterance: &str) -> Result<AgentResult> {
        let candidates = self.retriever.retrieve(utterance).await?;
        let specs: Vec<ToolSpec> = candidates.iter().map(|t| t.spec()).collect();
        let offer_tools = !specs.is_empty() && self.provider.supports_native_tools();

        let mut messages = Vec::with_capacity(memory.window_len() * 2 + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(memory.window());
        messages.push(ChatMessage::user(utterance));

        for iteration in 1..=self.max_iterations {
            let request = ChatRequest {
                messages: &messages,
                tools: offer_tools.then_some(specs.as_slice()),
            };
            let response = self
                .provider
                .chat(request, &self.model, self.temperature)
                .await?;

            if !response.has_tool_calls() {
                info!(iteration, "agent answered");
                return Ok(AgentResult::Answer(response.text.unwrap_or_default()));
            }

            debug!(iteration, calls = response.tool_calls.len(), "agent requested tools");
            messages.push(ChatMessage::assistant_tool_calls(
                response.text.unwrap_or_default(),
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let observation = Self::run_tool(&candidates, call).await;
                messages.push(ChatMessage::tool(call.id.clone(), observation));
            }
        }

        anyhow::bail!(
            "Reached max iterations ({}) without a final answer",
            self.max_iterations
        )
    }

    fn name(&self) -> &str {
        "tool-calling"
    }
}
