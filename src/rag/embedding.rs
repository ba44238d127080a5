//! Embedding providers and vector similarity.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Whether text is a search query or an indexed passage. Asymmetric
/// embedding models (e.g. `nv-embedqa-e5-v5`) embed the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Query,
    Passage,
}

impl EmbeddingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Passage => "passage",
        }
    }
}

/// A backend that turns text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed_batch(&self, texts: &[&str], kind: EmbeddingKind)
        -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str, kind: EmbeddingKind) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text], kind)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("{} returned no embedding", self.name()))
    }

    fn name(&self) -> &str;
}

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Indices of the `top_k` candidates most similar to `query`, best first.
pub fn rank_by_similarity(query: &[f32], candidates: &[Vec<f32>], top_k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, cosine_similarity(query, c)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(top_k).map(|(i, _)| i).collect()
}

const MAX_BATCH: usize = 32;

/// Embedding client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiCompatibleEmbedder {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    truncate: Option<String>,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            model: model.to_string(),
            truncate: None,
        }
    }

    /// Server-side truncation policy for over-long inputs (`NONE`, `START`, `END`).
    pub fn with_truncate(mut self, truncate: Option<&str>) -> Self {
        self.truncate = truncate
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);
        self
    }

    fn embeddings_url(&self) -> String {
        if self.base_url.ends_with("/embeddings") {
            self.base_url.clone()
        } else {
            format!("{}/embeddings", self.base_url)
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    input_type: &'static str,
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleEmbedder {
    async fn embed_batch(
        &self,
        texts: &[&str],
        kind: EmbeddingKind,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "embedding API key not set. Set TECHDESK_EMBEDDING_API_KEY (or NVIDIA_EMB)."
            )
        })?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!(
                model = %self.model,
                batch_size = batch.len(),
                kind = kind.as_str(),
                "embedding batch"
            );

            let request = EmbeddingRequest {
                model: &self.model,
                input: batch,
                input_type: kind.as_str(),
                encoding_format: "float",
                truncate: self.truncate.as_deref(),
            };

            let response = self
                .client
                .post(self.embeddings_url())
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    error!(error = %e, "embedding request failed");
                    anyhow::anyhow!("embedding request failed: {e}")
                })?;

            if !response.status().is_success() {
                return Err(crate::providers::api_error("embedding", response).await);
            }

            let mut parsed: EmbeddingResponse = response.json().await?;
            if parsed.data.len() != batch.len() {
                anyhow::bail!(
                    "embedding API returned {} vectors for {} inputs",
                    parsed.data.len(),
                    batch.len()
                );
            }
            parsed.data.sort_by_key(|d| d.index.unwrap_or(0));
            vectors.extend(parsed.data.into_iter().map(|d| d.embedding));
        }

        Ok(vectors)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn ranking_returns_best_first() {
        let candidates = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        assert_eq!(rank_by_similarity(&[1.0, 0.1], &candidates, 2), vec![1, 2]);
        assert_eq!(rank_by_similarity(&[1.0, 0.1], &candidates, 10).len(), 3);
    }

    #[test]
    fn request_carries_input_type_and_truncate() {
        let input = ["how do I reset my password"];
        let req = EmbeddingRequest {
            model: "nvidia/nv-embedqa-e5-v5",
            input: &input,
            input_type: EmbeddingKind::Query.as_str(),
            encoding_format: "float",
            truncate: Some("END"),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["input_type"], "query");
        assert_eq!(json["truncate"], "END");
    }

    #[test]
    fn embeddings_url_is_appended_once() {
        let e = OpenAiCompatibleEmbedder::new("https://integrate.api.nvidia.com/v1/", None, "m");
        assert_eq!(e.embeddings_url(), "https://integrate.api.nvidia.com/v1/embeddings");
        let e = OpenAiCompatibleEmbedder::new("http://local/embeddings", None, "m");
        assert_eq!(e.embeddings_url(), "http://local/embeddings");
    }

    #[tokio::test]
    async fn embedding_without_key_fails() {
        let e = OpenAiCompatibleEmbedder::new("http://127.0.0.1:9", None, "m");
        let err = e.embed("hi", EmbeddingKind::Query).await.unwrap_err();
        assert!(err.to_string().contains("embedding API key not set"));
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        let e = OpenAiCompatibleEmbedder::new("http://127.0.0.1:9", None, "m");
        assert!(e.embed_batch(&[], EmbeddingKind::Passage).await.unwrap().is_empty());
    }
}
