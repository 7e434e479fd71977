//! Enrichment provider interface and the dataset-API client.
//!
//! The provider is asynchronous: a trigger call returns an opaque
//! snapshot id, progress is polled, and ready snapshots are downloaded as
//! raw profile arrays. Instagram and TikTok use distinct dataset ids, and
//! TikTok trigger payloads must carry an empty `country` field.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use scout_core::platform::Platform;

use crate::error::{error_from_response, ProviderError};

/// Trigger deadline.
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(120);
/// Progress-check deadline.
const PROGRESS_TIMEOUT: Duration = Duration::from_secs(300);
/// Download deadline.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Observed state of an in-flight snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// Ready for download (`ready` or `completed` upstream).
    Ready,
    /// Still collecting.
    Running,
    /// Failed upstream; the batch is lost.
    Failed,
    /// Unrecognized status string; treated like `Running` and aged out.
    Unknown(String),
}

impl SnapshotStatus {
    fn from_wire(status: &str) -> Self {
        match status {
            "ready" | "completed" => SnapshotStatus::Ready,
            "running" => SnapshotStatus::Running,
            "failed" => SnapshotStatus::Failed,
            other => SnapshotStatus::Unknown(other.to_string()),
        }
    }
}

/// Capability interface the engine needs from the enrichment provider.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Trigger collection for a batch of profile URLs on one platform.
    /// Returns the provider's snapshot id.
    async fn trigger(&self, urls: &[String], platform: Platform)
        -> Result<String, ProviderError>;

    /// Check the state of a snapshot.
    async fn progress(&self, snapshot_id: &str) -> Result<SnapshotStatus, ProviderError>;

    /// Download a ready snapshot as raw profile payloads.
    async fn download(&self, snapshot_id: &str) -> Result<Vec<Value>, ProviderError>;
}

// ---------------------------------------------------------------------------
// Dataset API client
// ---------------------------------------------------------------------------

/// HTTP client for the Bright Data-style dataset API.
pub struct BrightDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    dataset_instagram: String,
    dataset_tiktok: String,
}

impl BrightDataClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        dataset_instagram: impl Into<String>,
        dataset_tiktok: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            dataset_instagram: dataset_instagram.into(),
            dataset_tiktok: dataset_tiktok.into(),
        }
    }

    fn dataset_for(&self, platform: Platform) -> Result<&str, ProviderError> {
        match platform {
            Platform::Instagram => Ok(&self.dataset_instagram),
            Platform::Tiktok => Ok(&self.dataset_tiktok),
            Platform::Unknown => Err(ProviderError::Malformed(
                "no dataset configured for unknown platform".into(),
            )),
        }
    }

    /// Build the trigger payload for one batch. TikTok entries require an
    /// explicit empty `country` field; Instagram entries are URL-only.
    pub fn trigger_payload(urls: &[String], platform: Platform) -> Vec<Value> {
        urls.iter()
            .map(|url| match platform {
                Platform::Tiktok => serde_json::json!({"url": url, "country": ""}),
                _ => serde_json::json!({"url": url}),
            })
            .collect()
    }
}

#[async_trait]
impl EnrichmentProvider for BrightDataClient {
    async fn trigger(
        &self,
        urls: &[String],
        platform: Platform,
    ) -> Result<String, ProviderError> {
        let dataset_id = self.dataset_for(platform)?;
        let payload = Self::trigger_payload(urls, platform);

        let response = self
            .client
            .post(format!("{}/datasets/v3/trigger", self.base_url))
            .query(&[("dataset_id", dataset_id), ("include_errors", "true")])
            .bearer_auth(&self.api_key)
            .timeout(TRIGGER_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "enrichment trigger"))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        body.get("snapshot_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Malformed("trigger response missing snapshot_id".into()))
    }

    async fn progress(&self, snapshot_id: &str) -> Result<SnapshotStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/datasets/v3/progress/{snapshot_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(PROGRESS_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "enrichment progress"))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let status = body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Malformed("progress response missing status".into()))?;

        Ok(SnapshotStatus::from_wire(status))
    }

    async fn download(&self, snapshot_id: &str) -> Result<Vec<Value>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/datasets/v3/snapshot/{snapshot_id}", self.base_url))
            .query(&[("format", "json")])
            .bearer_auth(&self.api_key)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, "enrichment download"))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        match body {
            Value::Array(items) => Ok(items),
            // Some dataset endpoints wrap the rows.
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(ProviderError::Malformed(
                    "snapshot download is not an array".into(),
                )),
            },
            _ => Err(ProviderError::Malformed(
                "snapshot download is not an array".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiktok_payload_carries_empty_country() {
        let urls = vec!["https://tiktok.com/@a".to_string()];
        let payload = BrightDataClient::trigger_payload(&urls, Platform::Tiktok);
        assert_eq!(payload[0]["country"], "");
        assert_eq!(payload[0]["url"], "https://tiktok.com/@a");
    }

    #[test]
    fn instagram_payload_is_url_only() {
        let urls = vec!["https://instagram.com/a".to_string()];
        let payload = BrightDataClient::trigger_payload(&urls, Platform::Instagram);
        assert!(payload[0].get("country").is_none());
    }

    #[test]
    fn wire_statuses_map_to_snapshot_states() {
        assert_eq!(SnapshotStatus::from_wire("ready"), SnapshotStatus::Ready);
        assert_eq!(SnapshotStatus::from_wire("completed"), SnapshotStatus::Ready);
        assert_eq!(SnapshotStatus::from_wire("running"), SnapshotStatus::Running);
        assert_eq!(SnapshotStatus::from_wire("failed"), SnapshotStatus::Failed);
        assert_eq!(
            SnapshotStatus::from_wire("collecting"),
            SnapshotStatus::Unknown("collecting".into())
        );
    }
}
