//! Vector index interface and the Weaviate hybrid-search client.
//!
//! Searches are hybrid dense/lexical with fixed multi-target vector
//! weights (profile : hashtag : post ≈ 2.5 : 1.5 : 1.0, relative-score
//! combination). The client is readiness-checked before first use and
//! tolerates reconnection on later calls.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use scout_core::platform::Platform;
use scout_core::profiles::Candidate;
use scout_core::urls::normalize_profile_url;

use crate::error::{error_from_response, ProviderError};

/// Multi-target vector weights applied to every hybrid search.
pub const PROFILE_VECTOR_WEIGHT: f64 = 2.5;
pub const HASHTAG_VECTOR_WEIGHT: f64 = 1.5;
pub const POST_VECTOR_WEIGHT: f64 = 1.0;

/// Default request deadline for one search.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared filter set used by stage 2 and the auxiliary search endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub platform: Option<Platform>,
    pub min_followers: Option<i64>,
    pub max_followers: Option<i64>,
}

/// One hybrid search request.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub query: String,
    pub vector: Vec<f32>,
    /// Dense/lexical mix; 0 is pure lexical, 1 pure dense.
    pub alpha: f64,
    pub limit: usize,
    pub filters: SearchFilters,
}

/// Capability interface the engine needs from the vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Readiness probe; called once at startup before first use.
    async fn ready(&self) -> Result<(), ProviderError>;

    /// Run one hybrid search and return normalized candidates.
    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Candidate>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Weaviate client
// ---------------------------------------------------------------------------

/// GraphQL client for a Weaviate collection.
pub struct WeaviateClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    timeout: Duration,
}

impl WeaviateClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            collection: collection.into(),
            timeout,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Build the GraphQL hybrid query for one search.
    fn build_graphql(&self, q: &HybridQuery) -> String {
        let vector = q
            .vector
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut operands = Vec::new();
        if let Some(platform) = q.filters.platform {
            operands.push(format!(
                "{{path: [\"platform\"], operator: Equal, valueText: \"{}\"}}",
                platform.as_str()
            ));
        }
        if let Some(min) = q.filters.min_followers {
            operands.push(format!(
                "{{path: [\"followers\"], operator: GreaterThanEqual, valueInt: {min}}}"
            ));
        }
        if let Some(max) = q.filters.max_followers {
            operands.push(format!(
                "{{path: [\"followers\"], operator: LessThanEqual, valueInt: {max}}}"
            ));
        }
        let where_clause = if operands.is_empty() {
            String::new()
        } else {
            format!(
                ", where: {{operator: And, operands: [{}]}}",
                operands.join(", ")
            )
        };

        format!(
            "{{ Get {{ {collection}(limit: {limit}, hybrid: {{query: {query}, alpha: {alpha}, \
             vector: [{vector}], targets: {{targetVectors: [\"profile_vector\", \
             \"hashtag_vector\", \"post_vector\"], combinationMethod: relativeScore, \
             weights: {{profile_vector: {pw}, hashtag_vector: {hw}, post_vector: {tw}}}}}}}\
             {where_clause}) {{ profile_url platform display_name biography followers \
             _additional {{ id score distance }} }} }} }}",
            collection = self.collection,
            limit = q.limit,
            query = serde_json::to_string(&q.query).unwrap_or_else(|_| "\"\"".into()),
            alpha = q.alpha,
            pw = PROFILE_VECTOR_WEIGHT,
            hw = HASHTAG_VECTOR_WEIGHT,
            tw = POST_VECTOR_WEIGHT,
        )
    }

    /// Convert one GraphQL result object into a [`Candidate`].
    fn parse_candidate(obj: &Value) -> Option<Candidate> {
        let raw_url = obj.get("profile_url")?.as_str()?;
        let profile_url = normalize_profile_url(raw_url);
        let additional = obj.get("_additional");

        let score = additional
            .and_then(|a| a.get("score"))
            .and_then(score_as_f64)
            .unwrap_or(0.0);
        let distance = additional
            .and_then(|a| a.get("distance"))
            .and_then(Value::as_f64);
        let id = additional
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let platform = obj
            .get("platform")
            .and_then(Value::as_str)
            .and_then(Platform::parse)
            .unwrap_or_else(|| Platform::from_url(&profile_url));

        Some(Candidate {
            id,
            score,
            distance,
            profile_url,
            platform,
            display_name: obj
                .get("display_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            biography: obj
                .get("biography")
                .and_then(Value::as_str)
                .map(str::to_string),
            followers: obj.get("followers").and_then(Value::as_i64),
        })
    }
}

/// Weaviate reports `score` as a string in `_additional`; accept both.
fn score_as_f64(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[async_trait]
impl VectorIndex for WeaviateClient {
    async fn ready(&self) -> Result<(), ProviderError> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/v1/.well-known/ready", self.base_url)),
            )
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "weaviate readiness"))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Candidate>, ProviderError> {
        let graphql = self.build_graphql(query);
        let response = self
            .authorized(self.client.post(format!("{}/v1/graphql", self.base_url)))
            .timeout(self.timeout)
            .json(&serde_json::json!({ "query": graphql }))
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "weaviate hybrid search"))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(ProviderError::Malformed(format!(
                    "graphql errors: {}",
                    serde_json::to_string(errors).unwrap_or_default()
                )));
            }
        }

        let objects = body
            .pointer(&format!("/data/Get/{}", self.collection))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ProviderError::Malformed("missing data.Get.<collection> in response".into())
            })?;

        Ok(objects.iter().filter_map(Self::parse_candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> WeaviateClient {
        WeaviateClient::new("http://localhost:8080", None, "Creators", DEFAULT_SEARCH_TIMEOUT)
    }

    #[test]
    fn graphql_includes_filters_and_weights() {
        let q = HybridQuery {
            query: "austin coffee".into(),
            vector: vec![0.1, 0.2],
            alpha: 0.5,
            limit: 500,
            filters: SearchFilters {
                platform: Some(Platform::Instagram),
                min_followers: Some(1000),
                max_followers: Some(50000),
            },
        };
        let gql = client().build_graphql(&q);
        assert!(gql.contains("limit: 500"));
        assert!(gql.contains("alpha: 0.5"));
        assert!(gql.contains("valueText: \"instagram\""));
        assert!(gql.contains("GreaterThanEqual, valueInt: 1000"));
        assert!(gql.contains("LessThanEqual, valueInt: 50000"));
        assert!(gql.contains("profile_vector: 2.5"));
        assert!(gql.contains("relativeScore"));
    }

    #[test]
    fn graphql_escapes_the_query_text() {
        let q = HybridQuery {
            query: "say \"cheese\"".into(),
            vector: vec![],
            alpha: 0.8,
            limit: 10,
            filters: SearchFilters::default(),
        };
        let gql = client().build_graphql(&q);
        assert!(gql.contains("\\\"cheese\\\""));
        assert!(!gql.contains("where:"));
    }

    #[test]
    fn parses_candidate_with_string_score() {
        let obj = serde_json::json!({
            "profile_url": "https://www.Instagram.com/Someone/",
            "platform": "instagram",
            "display_name": "Someone",
            "biography": "coffee person",
            "followers": 1234,
            "_additional": {"id": "uuid-1", "score": "0.87", "distance": 0.32}
        });
        let c = WeaviateClient::parse_candidate(&obj).expect("candidate");
        assert_eq!(c.profile_url, "https://instagram.com/someone");
        assert!((c.score - 0.87).abs() < 1e-9);
        assert_eq!(c.followers, Some(1234));
        assert_eq!(c.platform, Platform::Instagram);
    }

    #[test]
    fn candidate_without_url_is_skipped() {
        let obj = serde_json::json!({"platform": "instagram"});
        assert!(WeaviateClient::parse_candidate(&obj).is_none());
    }
}
