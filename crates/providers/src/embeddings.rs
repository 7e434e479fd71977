//! Embedding provider interface and the OpenAI-compatible HTTP client.
//!
//! Both the primary and secondary providers speak the same wire shape, so
//! one client covers both; [`FallbackEmbeddings`] composes them with the
//! payment-required/general-failure fallback policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{error_from_response, ProviderError};

/// Request deadline for one batched embedding call.
const EMBED_TIMEOUT: Duration = Duration::from_secs(120);

/// Capability interface the engine needs from an embedding provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short tag used in logs and the call ledger.
    fn name(&self) -> &'static str;

    /// Embed all `texts` in one batched call, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

/// HTTP client for any `/embeddings` endpoint speaking the OpenAI shape.
pub struct OpenAiCompatEmbeddings {
    name: &'static str,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiCompatEmbeddings {
    pub fn new(
        name: &'static str,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatEmbeddings {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(EMBED_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "embeddings"))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        // The API may reorder rows; restore input order via the index field.
        let mut vectors: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        for row in parsed.data {
            if row.index >= vectors.len() {
                return Err(ProviderError::Malformed(format!(
                    "embedding index {} out of range",
                    row.index
                )));
            }
            vectors[row.index] = row.embedding;
        }
        Ok(vectors)
    }
}

// ---------------------------------------------------------------------------
// Fallback composition
// ---------------------------------------------------------------------------

/// Tries the primary provider and falls back to the secondary on
/// payment-required or any other failure, when one is configured.
pub struct FallbackEmbeddings {
    primary: Arc<dyn EmbeddingProvider>,
    secondary: Option<Arc<dyn EmbeddingProvider>>,
}

impl FallbackEmbeddings {
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        secondary: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbeddings {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        match self.primary.embed_batch(texts).await {
            Ok(vectors) => Ok(vectors),
            Err(err) => match &self.secondary {
                Some(secondary) => {
                    tracing::warn!(
                        primary = self.primary.name(),
                        secondary = secondary.name(),
                        error = %err,
                        error_kind = err.kind(),
                        "Primary embedding provider failed, falling back",
                    );
                    secondary.embed_batch(texts).await
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::PaymentRequired("quota".into()))
        }
    }

    struct FixedProvider;

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(texts.iter().map(|_| vec![0.0, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn falls_back_on_payment_required() {
        let primary = Arc::new(FailingProvider { calls: AtomicUsize::new(0) });
        let fallback = FallbackEmbeddings::new(primary.clone(), Some(Arc::new(FixedProvider)));

        let out = fallback
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .expect("secondary should serve the batch");
        assert_eq!(out.len(), 2);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn propagates_without_secondary() {
        let fallback = FallbackEmbeddings::new(
            Arc::new(FailingProvider { calls: AtomicUsize::new(0) }),
            None,
        );
        let err = fallback.embed_batch(&["a".to_string()]).await.unwrap_err();
        assert_eq!(err.kind(), "payment_required");
    }
}
