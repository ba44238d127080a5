//! Query engines over a single document.
//!
//! [`VectorQueryEngine`] answers exact questions from the few most similar
//! chunks. [`SummaryQueryEngine`] reads the whole document and condenses it
//! bottom-up (tree summarisation).

use super::chunking::Chunk;
use super::embedding::{rank_by_similarity, EmbeddingKind, EmbeddingProvider};
use crate::providers::Provider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Something that can answer a natural-language question.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, question: &str) -> Result<String>;
}

/// Model plus sampling settings used by the engines.
#[derive(Clone)]
pub struct ModelHandle {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f64,
}

impl ModelHandle {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.provider
            .chat_with_system(Some(system), prompt, &self.model, self.temperature)
            .await
    }
}

const QA_SYSTEM_PROMPT: &str = "You are an expert Q&A system. Always answer the query using the \
provided context information, and not prior knowledge. Never directly reference the given \
context in your answer.";

fn qa_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below.\n---------------------\n{context}\n---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {question}\nAnswer: "
    )
}

/// Top-k similarity retrieval followed by a context-grounded completion.
pub struct VectorQueryEngine {
    llm: ModelHandle,
    embedder: Arc<dyn EmbeddingProvider>,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    top_k: usize,
}

impl VectorQueryEngine {
    /// Embed every chunk as a passage and build the index.
    pub async fn build(
        llm: ModelHandle,
        embedder: Arc<dyn EmbeddingProvider>,
        chunks: Vec<Chunk>,
        top_k: usize,
    ) -> Result<Self> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder
            .embed_batch(&texts, EmbeddingKind::Passage)
            .await
            .context("Failed to embed document chunks")?;
        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }
        Ok(Self {
            llm,
            embedder,
            chunks,
            vectors,
            top_k: top_k.max(1),
        })
    }

    /// The chunks most relevant to `question`, best first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<&Chunk>> {
        let query = self.embedder.embed(question, EmbeddingKind::Query).await?;
        Ok(rank_by_similarity(&query, &self.vectors, self.top_k)
            .into_iter()
            .map(|i| &self.chunks[i])
            .collect())
    }
}

#[async_trait]
impl QueryEngine for VectorQueryEngine {
    async fn query(&self, question: &str) -> Result<String> {
        let hits = self.retrieve(question).await?;
        if hits.is_empty() {
            return Ok("Empty Response".to_string());
        }
        debug!(hits = hits.len(), first = %hits[0].id, "vector retrieval");
        let context = hits
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        self.llm.complete(QA_SYSTEM_PROMPT, &qa_prompt(&context, question)).await
    }
}

/// Summarise every chunk against the question, then keep combining groups
/// of partial answers until one remains.
pub struct SummaryQueryEngine {
    llm: ModelHandle,
    chunks: Vec<Chunk>,
    group_size: usize,
}

impl SummaryQueryEngine {
    pub fn new(llm: ModelHandle, chunks: Vec<Chunk>) -> Self {
        Self {
            llm,
            chunks,
            group_size: 4,
        }
    }

    /// Number of texts combined per summarisation call. Clamped to at least 2
    /// so every round shrinks the set.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(2);
        self
    }

    async fn summarize_round(&self, texts: Vec<String>, question: &str) -> Result<Vec<String>> {
        let calls = texts.chunks(self.group_size).map(|group| {
            let context = group.join("\n\n");
            async move {
                self.llm
                    .complete(QA_SYSTEM_PROMPT, &qa_prompt(&context, question))
                    .await
            }
        });
        futures::future::try_join_all(calls).await
    }
}

#[async_trait]
impl QueryEngine for SummaryQueryEngine {
    async fn query(&self, question: &str) -> Result<String> {
        let mut texts: Vec<String> = self.chunks.iter().map(|c| c.text.clone()).collect();
        if texts.is_empty() {
            return Ok("Empty Response".to_string());
        }

        let mut round = 0;
        loop {
            round += 1;
            debug!(round, inputs = texts.len(), "tree summarize");
            texts = self.summarize_round(texts, question).await?;
            if texts.len() <= 1 {
                break;
            }
        }
        Ok(texts.pop().unwrap_or_default())
    }
}
