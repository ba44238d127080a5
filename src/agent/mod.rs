//! Reasoning agent: the tool-calling loop, its result type, and the gate
//! that serialises access to it.

pub mod gate;
pub mod tool_calling;
pub mod traits;

pub use gate::{ActiveContext, AgentGate};
pub use tool_calling::ToolCallingAgent;
pub use traits::{Agent, AgentResult};

use crate::config::Config;
use crate::providers::{self, Provider};
use crate::rag::{self, ModelHandle, OpenAiCompatibleEmbedder};
use crate::tools::{EmbeddingToolRetriever, ToolRetriever};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an IT support agent and helpful assistant that \
can answer questions about company IT policies, software installation guides, IT support \
categories related to the company, company knowledge base articles, sample conversations, and \
troubleshooting.";

/// Chat provider described by the top-level config.
pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider = providers::create_provider_with_url(
        config.provider(),
        config.api_key.as_deref(),
        config.api_url.as_deref(),
    )?;
    Ok(Arc::from(provider))
}

/// Embedding client described by `[embedding]`.
pub fn build_embedder(config: &Config) -> OpenAiCompatibleEmbedder {
    let key = providers::resolve_embedding_credential(
        config.provider(),
        config.embedding.api_key.as_deref(),
    );
    OpenAiCompatibleEmbedder::new(
        &config.embedding.api_url,
        key.as_deref(),
        &config.embedding.model,
    )
    .with_truncate(config.embedding.truncate.as_deref())
}

/// Load the documents, build the 2-per-document tools and the tool
/// retriever, and assemble the agent.
pub async fn build_agent(config: &Config) -> Result<Arc<dyn Agent>> {
    let provider = build_provider(config)?;
    let embedder = Arc::new(build_embedder(config));
    let llm = ModelHandle::new(provider.clone(), config.model(), config.default_temperature);

    let tools = rag::build_document_tools(&config.documents, llm, embedder.clone())
        .await
        .context("Failed to build document tools")?;
    let retriever: Arc<dyn ToolRetriever> =
        Arc::new(EmbeddingToolRetriever::new(tools, embedder, config.agent.tool_top_k));
    info!(
        tools = retriever.tools().len(),
        tool_top_k = config.agent.tool_top_k,
        provider = provider.name(),
        model = config.model(),
        "agent tools ready"
    );
    Ok(Arc::new(ToolCallingAgent::new(
        provider,
        config.model(),
        config.default_temperature,
        config.agent.system_prompt.clone(),
        retriever,
        config.agent.max_iterations,
    )))
}
