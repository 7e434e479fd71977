//! Clients for the four external collaborators: embedding model, vector
//! index, profile-enrichment service, and scoring model.
//!
//! Each collaborator is modeled as a capability trait with the minimum
//! operation surface the engine needs, so tests can substitute
//! deterministic fixture-backed implementations.

pub mod embeddings;
pub mod enrichment;
pub mod error;
pub mod scoring;
pub mod vector;

use std::sync::Arc;
use std::time::Duration;

use embeddings::{EmbeddingProvider, FallbackEmbeddings, OpenAiCompatEmbeddings};
use enrichment::{BrightDataClient, EnrichmentProvider};
use scoring::{OpenAiScoring, ScoringModel};
use vector::{VectorIndex, WeaviateClient};

/// Lifecycle-managed bundle of provider handles. Initialized once at
/// startup, shared via `Arc`, never mutated after init.
#[derive(Clone)]
pub struct Providers {
    pub embeddings: Arc<dyn EmbeddingProvider>,
    pub vector: Arc<dyn VectorIndex>,
    pub enrichment: Arc<dyn EnrichmentProvider>,
    pub scoring: Arc<dyn ScoringModel>,
}

/// Provider configuration loaded from environment variables.
///
/// | Env Var                        | Default                         |
/// |--------------------------------|---------------------------------|
/// | `EMBEDDINGS_PROVIDER`          | `primary`                       |
/// | `OPENAI_BASE_URL`              | `https://api.openai.com/v1`     |
/// | `OPENAI_API_KEY`               | — (required)                    |
/// | `EMBEDDING_MODEL`              | `text-embedding-3-small`        |
/// | `DEEPINFRA_BASE_URL`           | `https://api.deepinfra.com/v1/openai` |
/// | `DEEPINFRA_API_KEY`            | — (optional; enables fallback)  |
/// | `DEEPINFRA_EMBEDDING_MODEL`    | `BAAI/bge-large-en-v1.5`        |
/// | `SCORING_MODEL`                | `gpt-4o-mini`                   |
/// | `WEAVIATE_URL`                 | `http://localhost:8080`         |
/// | `WEAVIATE_API_KEY`             | — (optional)                    |
/// | `WEAVIATE_COLLECTION`          | `Creators`                      |
/// | `WEAVIATE_TIMEOUT_SECS`        | `120`                           |
/// | `BRIGHTDATA_BASE_URL`          | `https://api.brightdata.com`    |
/// | `BRIGHTDATA_API_KEY`           | — (required)                    |
/// | `BRIGHTDATA_DATASET_INSTAGRAM` | — (required)                    |
/// | `BRIGHTDATA_DATASET_TIKTOK`    | — (required)                    |
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub embeddings_provider: String,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub embedding_model: String,
    pub deepinfra_base_url: String,
    pub deepinfra_api_key: Option<String>,
    pub deepinfra_embedding_model: String,
    pub scoring_model: String,
    pub weaviate_url: String,
    pub weaviate_api_key: Option<String>,
    pub weaviate_collection: String,
    pub weaviate_timeout: Duration,
    pub brightdata_base_url: String,
    pub brightdata_api_key: String,
    pub dataset_instagram: String,
    pub dataset_tiktok: String,
}

impl ProvidersConfig {
    /// Load provider configuration from the environment. Panics on missing
    /// required keys, which is the desired fail-fast startup behaviour.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let var_or = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        let required =
            |name: &str| std::env::var(name).unwrap_or_else(|_| panic!("{name} must be set"));

        let weaviate_timeout_secs: u64 = var_or("WEAVIATE_TIMEOUT_SECS", "120")
            .parse()
            .expect("WEAVIATE_TIMEOUT_SECS must be a valid u64");

        Self {
            embeddings_provider: var_or("EMBEDDINGS_PROVIDER", "primary"),
            openai_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_api_key: required("OPENAI_API_KEY"),
            embedding_model: var_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            deepinfra_base_url: var_or(
                "DEEPINFRA_BASE_URL",
                "https://api.deepinfra.com/v1/openai",
            ),
            deepinfra_api_key: var("DEEPINFRA_API_KEY"),
            deepinfra_embedding_model: var_or(
                "DEEPINFRA_EMBEDDING_MODEL",
                "BAAI/bge-large-en-v1.5",
            ),
            scoring_model: var_or("SCORING_MODEL", "gpt-4o-mini"),
            weaviate_url: var_or("WEAVIATE_URL", "http://localhost:8080"),
            weaviate_api_key: var("WEAVIATE_API_KEY"),
            weaviate_collection: var_or("WEAVIATE_COLLECTION", "Creators"),
            weaviate_timeout: Duration::from_secs(weaviate_timeout_secs),
            brightdata_base_url: var_or("BRIGHTDATA_BASE_URL", "https://api.brightdata.com"),
            brightdata_api_key: required("BRIGHTDATA_API_KEY"),
            dataset_instagram: required("BRIGHTDATA_DATASET_INSTAGRAM"),
            dataset_tiktok: required("BRIGHTDATA_DATASET_TIKTOK"),
        }
    }
}

impl Providers {
    /// Construct the live provider bundle from configuration.
    ///
    /// `EMBEDDINGS_PROVIDER=secondary` swaps which embedding endpoint is
    /// primary; the other becomes the fallback when configured.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let openai: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiCompatEmbeddings::new(
            "openai",
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.embedding_model.clone(),
        ));
        let deepinfra: Option<Arc<dyn EmbeddingProvider>> =
            config.deepinfra_api_key.as_ref().map(|key| {
                Arc::new(OpenAiCompatEmbeddings::new(
                    "deepinfra",
                    config.deepinfra_base_url.clone(),
                    key.clone(),
                    config.deepinfra_embedding_model.clone(),
                )) as Arc<dyn EmbeddingProvider>
            });

        let embeddings: Arc<dyn EmbeddingProvider> =
            if config.embeddings_provider == "secondary" {
                match deepinfra {
                    Some(secondary) => {
                        Arc::new(FallbackEmbeddings::new(secondary, Some(openai)))
                    }
                    None => Arc::new(FallbackEmbeddings::new(openai, None)),
                }
            } else {
                Arc::new(FallbackEmbeddings::new(openai, deepinfra))
            };

        let vector: Arc<dyn VectorIndex> = Arc::new(WeaviateClient::new(
            config.weaviate_url.clone(),
            config.weaviate_api_key.clone(),
            config.weaviate_collection.clone(),
            config.weaviate_timeout,
        ));

        let enrichment: Arc<dyn EnrichmentProvider> = Arc::new(BrightDataClient::new(
            config.brightdata_base_url.clone(),
            config.brightdata_api_key.clone(),
            config.dataset_instagram.clone(),
            config.dataset_tiktok.clone(),
        ));

        let scoring: Arc<dyn ScoringModel> = Arc::new(OpenAiScoring::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.scoring_model.clone(),
        ));

        Providers {
            embeddings,
            vector,
            enrichment,
            scoring,
        }
    }
}
