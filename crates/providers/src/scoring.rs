//! Scoring model interface and the OpenAI-compatible chat client.
//!
//! The model serves two operations: expanding a business description into
//! keyword queries (stage 1) and scoring one profile against the
//! description (stages 3/4). Prompts are deterministic given their inputs
//! so scoring is reproducible across retries and redeliveries.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{error_from_response, ProviderError};

/// Chat-completion request deadline.
const CHAT_TIMEOUT: Duration = Duration::from_secs(120);

/// Raw model output for one scored profile, on the 1–10 scale.
#[derive(Debug, Clone, Deserialize)]
pub struct RawScore {
    pub score: i64,
    pub rationale: String,
    pub summary: String,
}

/// Capability interface the engine needs from the scoring model.
#[async_trait]
pub trait ScoringModel: Send + Sync {
    /// Produce a small ordered list of keyword queries covering broad,
    /// specific, and adjacent facets of the description.
    async fn expand_queries(&self, description: &str) -> Result<Vec<String>, ProviderError>;

    /// Score one profile against the description. Returns the raw 1–10
    /// score plus rationale and summary.
    async fn score_profile(
        &self,
        profile_text: &str,
        description: &str,
        strict_location: bool,
    ) -> Result<RawScore, ProviderError>;
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// Build the query-expansion prompt.
pub fn expansion_prompt(description: &str) -> String {
    format!(
        "You help find social-media creators for businesses.\n\
         Business description:\n{description}\n\n\
         Produce 5 to 8 short keyword search queries that together cover \
         broad, specific, and adjacent facets of this business. Order them \
         from broadest to most specific.\n\
         Respond with strict JSON: {{\"queries\": [\"...\"]}}"
    )
}

/// Build the profile-scoring prompt. Strict location mode raises the
/// location weighting from 60% to 70%, heavily penalizes unknown
/// locations, and caps achievable totals when the location is unverified.
pub fn scoring_prompt(profile_text: &str, description: &str, strict_location: bool) -> String {
    let location_rules = if strict_location {
        "Weight location match at 70% of the total. If the profile's \
         location cannot be determined, score at most 2. If the location is \
         plausible but unverified, cap the score at 5."
    } else {
        "Weight location match at 60% of the total when the description \
         names a location; otherwise weight audience and content fit evenly."
    };

    format!(
        "You evaluate whether a social-media creator fits a business.\n\
         Business description:\n{description}\n\n\
         Creator profile:\n{profile_text}\n\n\
         {location_rules}\n\
         Score the fit from 1 (no fit) to 10 (perfect fit).\n\
         Respond with strict JSON: \
         {{\"score\": <1-10>, \"rationale\": \"...\", \"summary\": \"...\"}}"
    )
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

/// HTTP client for any `/chat/completions` endpoint speaking the OpenAI
/// shape, with JSON-object response forcing.
pub struct OpenAiScoring {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiScoring {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Send one prompt and return the parsed JSON content of the first
    /// choice.
    async fn complete_json(&self, prompt: &str) -> Result<Value, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0,
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(CHAT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "chat completion"))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let content = parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("missing message content".into()))?;

        serde_json::from_str(content)
            .map_err(|e| ProviderError::Malformed(format!("content is not JSON: {e}")))
    }
}

#[async_trait]
impl ScoringModel for OpenAiScoring {
    async fn expand_queries(&self, description: &str) -> Result<Vec<String>, ProviderError> {
        let content = self.complete_json(&expansion_prompt(description)).await?;

        let queries = content
            .get("queries")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Malformed("missing queries array".into()))?;

        let out: Vec<String> = queries
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .filter(|q| !q.trim().is_empty())
            .collect();

        if out.is_empty() {
            return Err(ProviderError::Malformed("expansion produced no queries".into()));
        }
        Ok(out)
    }

    async fn score_profile(
        &self,
        profile_text: &str,
        description: &str,
        strict_location: bool,
    ) -> Result<RawScore, ProviderError> {
        let prompt = scoring_prompt(profile_text, description, strict_location);
        let content = self.complete_json(&prompt).await?;

        let raw: RawScore = serde_json::from_value(content)
            .map_err(|e| ProviderError::Malformed(format!("bad score shape: {e}")))?;

        if !(1..=10).contains(&raw.score) {
            return Err(ProviderError::Malformed(format!(
                "score {} outside 1..10",
                raw.score
            )));
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_are_deterministic() {
        let a = scoring_prompt("bio", "desc", false);
        let b = scoring_prompt("bio", "desc", false);
        assert_eq!(a, b);
    }

    #[test]
    fn strict_mode_changes_location_rules() {
        let lax = scoring_prompt("bio", "desc", false);
        let strict = scoring_prompt("bio", "desc", true);
        assert_ne!(lax, strict);
        assert!(strict.contains("70%"));
        assert!(lax.contains("60%"));
    }

    #[test]
    fn expansion_prompt_embeds_description() {
        let p = expansion_prompt("austin coffee lifestyle creators");
        assert!(p.contains("austin coffee lifestyle creators"));
        assert!(p.contains("queries"));
    }
}
