//! Per-turn tool selection.

use super::traits::Tool;
use crate::rag::embedding::{rank_by_similarity, EmbeddingKind, EmbeddingProvider};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Default number of candidate tools offered per turn.
pub const DEFAULT_TOOL_TOP_K: usize = 3;

/// Picks the candidate tools the agent may use for one utterance.
#[async_trait]
pub trait ToolRetriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Arc<dyn Tool>>>;

    /// Every tool this retriever can return.
    fn tools(&self) -> &[Arc<dyn Tool>];
}

/// Ranks tools by cosine similarity between the utterance and each tool
/// description. Descriptions are embedded once, on first use.
pub struct EmbeddingToolRetriever {
    tools: Vec<Arc<dyn Tool>>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    index: OnceCell<Vec<Vec<f32>>>,
}

impl EmbeddingToolRetriever {
    pub fn new(
        tools: Vec<Arc<dyn Tool>>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            tools,
            embedder,
            top_k: top_k.max(1),
            index: OnceCell::new(),
        }
    }

    async fn index(&self) -> Result<&Vec<Vec<f32>>> {
        self.index
            .get_or_try_init(|| async {
                let descriptions: Vec<&str> = self.tools.iter().map(|t| t.description()).collect();
                self.embedder
                    .embed_batch(&descriptions, EmbeddingKind::Passage)
                    .await
            })
            .await
    }
}

#[async_trait]
impl ToolRetriever for EmbeddingToolRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Arc<dyn Tool>>> {
        if self.tools.len() <= self.top_k {
            return Ok(self.tools.clone());
        }
        let index = self.index().await?;
        let query = self.embedder.embed(query, EmbeddingKind::Query).await?;
        let picked: Vec<Arc<dyn Tool>> = rank_by_similarity(&query, index, self.top_k)
            .into_iter()
            .filter_map(|i| self.tools.get(i).cloned())
            .collect();
        debug!(
            tools = ?picked.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "retrieved candidate tools"
        );
        Ok(picked)
    }

    fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }
}

/// Offers every tool on every turn.
pub struct StaticToolRetriever {
    tools: Vec<Arc<dyn Tool>>,
}

impl StaticToolRetriever {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl ToolRetriever for StaticToolRetriever {
    async fn retrieve(&self, _query: &str) -> Result<Vec<Arc<dyn Tool>>> {
        Ok(self.tools.clone())
    }

    fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NamedTool(&'static str, &'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            self.1
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult> {
            Ok(ToolResult::ok(self.0))
        }
    }

    /// One dimension per keyword; counts batch calls.
    struct KeywordEmbedder {
        batches: AtomicUsize,
    }

    const KEYWORDS: [&str; 4] = ["password", "vpn", "printer", "email"];

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed_batch(&self, texts: &[&str], _: EmbeddingKind) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    KEYWORDS
                        .iter()
                        .map(|k| if t.contains(k) { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect())
        }
        fn name(&self) -> &str {
            "keyword"
        }
    }

    fn tools() -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(NamedTool("passwords", "password reset rules")),
            Arc::new(NamedTool("network", "vpn setup")),
            Arc::new(NamedTool("printing", "printer drivers")),
            Arc::new(NamedTool("mail", "email sync")),
        ]
    }

    #[tokio::test]
    async fn returns_most_similar_tools_first() {
        let embedder = Arc::new(KeywordEmbedder {
            batches: AtomicUsize::new(0),
        });
        let retriever = EmbeddingToolRetriever::new(tools(), embedder, 1);
        let picked = retriever.retrieve("my vpn drops").await.unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name(), "network");
    }

    #[tokio::test]
    async fn descriptions_are_embedded_once() {
        let embedder = Arc::new(KeywordEmbedder {
            batches: AtomicUsize::new(0),
        });
        let retriever = EmbeddingToolRetriever::new(tools(), embedder.clone(), 3);
        assert_eq!(retriever.retrieve("password").await.unwrap().len(), 3);
        retriever.retrieve("email").await.unwrap();
        // One index batch plus one query embedding per call.
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn small_tool_sets_skip_embedding() {
        let embedder = Arc::new(KeywordEmbedder {
            batches: AtomicUsize::new(0),
        });
        let retriever = EmbeddingToolRetriever::new(tools(), embedder.clone(), 10);
        assert_eq!(retriever.retrieve("anything").await.unwrap().len(), 4);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn static_retriever_returns_all() {
        let retriever = StaticToolRetriever::new(tools());
        assert_eq!(retriever.retrieve("x").await.unwrap().len(), 4);
        assert_eq!(retriever.tools().len(), 4);
    }
}
