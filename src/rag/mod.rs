//! Retrieval over the IT document set.
//!
//! Documents are loaded from the configured directory, split into chunks and
//! wrapped in two query engines each: a summary engine and a vector engine.
//! [`build_document_tools`] turns those into the agent's tool list using the
//! descriptions in [`crate::tools::catalog`].

pub mod chunking;
pub mod document;
pub mod embedding;
pub mod engine;

pub use chunking::{Chunk, SentenceSplitter};
pub use document::{load_document, Document};
pub use embedding::{cosine_similarity, EmbeddingKind, EmbeddingProvider, OpenAiCompatibleEmbedder};
pub use engine::{ModelHandle, QueryEngine, SummaryQueryEngine, VectorQueryEngine};

use crate::config::DocumentsConfig;
use crate::tools::{CatalogEntry, QueryEngineTool, Tool, CATALOG};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const EXTENSIONS: [&str; 3] = ["pdf", "md", "txt"];

/// First existing `<dir>/<key>.<ext>` for the supported extensions.
pub fn locate_document(dir: &Path, key: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{key}.{ext}")))
        .find(|p| p.is_file())
}

/// Build the summary and lookup tools for every catalog document found on
/// disk. Missing or unreadable documents are skipped with a warning; it is
/// an error only when none can be loaded.
pub async fn build_document_tools(
    config: &DocumentsConfig,
    llm: ModelHandle,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Vec<Arc<dyn Tool>>> {
    let splitter = SentenceSplitter::new(config.chunk_size, config.chunk_overlap);
    let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(CATALOG.len() * 2);

    for entry in &CATALOG {
        let Some(path) = locate_document(&config.dir, entry.key) else {
            warn!(
                document = entry.key,
                dir = %config.dir.display(),
                "document not found, skipping"
            );
            continue;
        };
        let document = match load_document(entry.key, &path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(document = entry.key, error = %e, "failed to load document, skipping");
                continue;
            }
        };

        let chunks = splitter.chunk(&document);
        info!(document = entry.key, chunks = chunks.len(), "indexing document");
        let [summary, lookup] =
            document_tools(entry, chunks, &llm, embedder.clone(), config.similarity_top_k).await?;
        tools.push(summary);
        tools.push(lookup);
    }

    if tools.is_empty() {
        anyhow::bail!(
            "No documents found in {}. Expected files such as {}.pdf",
            config.dir.display(),
            CATALOG[0].key
        );
    }
    Ok(tools)
}

async fn document_tools(
    entry: &CatalogEntry,
    chunks: Vec<Chunk>,
    llm: &ModelHandle,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
) -> Result<[Arc<dyn Tool>; 2]> {
    let vector = VectorQueryEngine::build(llm.clone(), embedder, chunks.clone(), top_k).await?;
    let summary = SummaryQueryEngine::new(llm.clone(), chunks);
    Ok([
        Arc::new(QueryEngineTool::new(
            entry.summary_tool_name(),
            entry.summary_description,
            Arc::new(summary),
        )),
        Arc::new(QueryEngineTool::new(
            entry.lookup_tool_name(),
            entry.lookup_description,
            Arc::new(vector),
        )),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatRequest, ChatResponse, Provider};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NullProvider;

    #[async_trait]
    impl Provider for NullProvider {
        async fn chat_with_system(
            &self,
            _: Option<&str>,
            _: &str,
            _: &str,
            _: f64,
        ) -> Result<String> {
            Ok("ok".into())
        }
        async fn chat(&self, _: ChatRequest<'_>, _: &str, _: f64) -> Result<ChatResponse> {
            Ok(ChatResponse::default())
        }
        fn name(&self) -> &str {
            "null"
        }
    }

    struct ConstEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ConstEmbedder {
        async fn embed_batch(&self, texts: &[&str], _: EmbeddingKind) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn name(&self) -> &str {
            "const"
        }
    }

    fn docs_config(dir: &Path) -> DocumentsConfig {
        DocumentsConfig {
            dir: dir.to_path_buf(),
            ..DocumentsConfig::default()
        }
    }

    fn llm() -> ModelHandle {
        ModelHandle::new(Arc::new(NullProvider), "m", 0.1)
    }

    #[tokio::test]
    async fn builds_two_tools_per_present_document() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        std::fs::write(dir.join("knowledge_base.txt"), "Reset passwords at the portal.").unwrap();
        std::fs::write(dir.join("installation_guides.md"), "Install Slack from the app store.")
            .unwrap();

        let tools = build_document_tools(&docs_config(tmp.path()), llm(), Arc::new(ConstEmbedder))
            .await
            .unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            [
                "installation_guides_summary",
                "installation_guides_lookup",
                "knowledge_base_summary",
                "knowledge_base_lookup",
            ]
        );
    }

    #[tokio::test]
    async fn empty_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = build_document_tools(&docs_config(tmp.path()), llm(), Arc::new(ConstEmbedder))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("No documents found"));
    }

    #[test]
    fn locate_prefers_pdf() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("test_requests.txt"), "x").unwrap();
        std::fs::write(tmp.path().join("test_requests.pdf"), "x").unwrap();
        let found = locate_document(tmp.path(), "test_requests").unwrap();
        assert_eq!(found.extension().unwrap(), "pdf");
        assert!(locate_document(tmp.path(), "knowledge_base").is_none());
    }
}
