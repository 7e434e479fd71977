//! Scoring fan-out behaviour with a fixture-backed scoring model:
//! inactive short-circuit, retry exhaustion, the good-fit threshold, and
//! the concurrency bound.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;

use scout_core::platform::Platform;
use scout_core::profiles::{PostRecord, ProfileRecord};
use scout_core::scoring::{GOOD_FIT_THRESHOLD, INACTIVE_RATIONALE};
use scout_engine::batch::{count_good, score_batch, sort_by_fit};
use scout_providers::error::ProviderError;
use scout_providers::scoring::{RawScore, ScoringModel};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Returns a fixed score and tracks call concurrency.
struct FixedModel {
    score: i64,
    calls: AtomicUsize,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl FixedModel {
    fn new(score: i64) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScoringModel for FixedModel {
    async fn expand_queries(&self, _description: &str) -> Result<Vec<String>, ProviderError> {
        Ok(vec!["unused".into()])
    }

    async fn score_profile(
        &self,
        _profile_text: &str,
        _description: &str,
        _strict_location: bool,
    ) -> Result<RawScore, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(RawScore {
            score: self.score,
            rationale: "fixture".into(),
            summary: "fixture summary".into(),
        })
    }
}

/// Always fails with a transport error.
struct BrokenModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ScoringModel for BrokenModel {
    async fn expand_queries(&self, _description: &str) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::Transport("down".into()))
    }

    async fn score_profile(
        &self,
        _profile_text: &str,
        _description: &str,
        _strict_location: bool,
    ) -> Result<RawScore, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Transport("down".into()))
    }
}

fn profile(url: &str, last_post_days_ago: Option<i64>, now: DateTime<Utc>) -> ProfileRecord {
    let posts_data = match last_post_days_ago {
        Some(days) => vec![PostRecord {
            caption: Some("post".into()),
            likes: Some(10),
            comments: Some(1),
            timestamp: Some(now - Duration::days(days)),
            posted: None,
        }],
        None => vec![],
    };
    ProfileRecord {
        platform: Platform::Instagram,
        account_id: None,
        display_name: Some("Fixture".into()),
        followers: Some(1000),
        biography: Some("bio".into()),
        profile_url: url.to_string(),
        posts_data,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inactive_profile_short_circuits_without_model_calls() {
    let now = Utc::now();
    let model = Arc::new(FixedModel::new(10));
    let permits = Arc::new(Semaphore::new(100));

    let scored = score_batch(
        model.clone(),
        permits,
        vec![profile("https://instagram.com/stale", Some(120), now)],
        "any business",
        false,
        now,
    )
    .await;

    assert_eq!(scored[0].fit_score, 0);
    assert_eq!(scored[0].fit_rationale, INACTIVE_RATIONALE);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn profile_without_posts_is_treated_as_inactive() {
    let now = Utc::now();
    let model = Arc::new(FixedModel::new(10));
    let permits = Arc::new(Semaphore::new(100));

    let scored = score_batch(
        model.clone(),
        permits,
        vec![profile("https://instagram.com/empty", None, now)],
        "any business",
        false,
        now,
    )
    .await;

    assert_eq!(scored[0].fit_score, 0);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn perfect_score_maps_to_good_fit_threshold() {
    let now = Utc::now();
    let model = Arc::new(FixedModel::new(10));
    let permits = Arc::new(Semaphore::new(100));

    let scored = score_batch(
        model,
        permits,
        vec![
            profile("https://instagram.com/a", Some(3), now),
            profile("https://instagram.com/b", Some(5), now),
        ],
        "any business",
        false,
        now,
    )
    .await;

    assert!(scored.iter().all(|p| p.fit_score == GOOD_FIT_THRESHOLD));
    assert_eq!(count_good(&scored), 2);
}

#[tokio::test]
async fn scoring_concurrency_stays_under_the_permit_cap() {
    let now = Utc::now();
    let model = Arc::new(FixedModel::new(7));
    let permits = Arc::new(Semaphore::new(3));

    let profiles: Vec<ProfileRecord> = (0..20)
        .map(|i| profile(&format!("https://instagram.com/u{i}"), Some(1), now))
        .collect();

    let scored = score_batch(model.clone(), permits, profiles, "biz", false, now).await;

    assert_eq!(scored.len(), 20);
    assert_eq!(model.calls.load(Ordering::SeqCst), 20);
    assert!(
        model.max_concurrent.load(Ordering::SeqCst) <= 3,
        "observed concurrency {} exceeded the bound",
        model.max_concurrent.load(Ordering::SeqCst)
    );
}

#[tokio::test(start_paused = true)]
async fn broken_model_defaults_to_fit_zero_after_retries() {
    let now = Utc::now();
    let model = Arc::new(BrokenModel { calls: AtomicUsize::new(0) });
    let permits = Arc::new(Semaphore::new(100));

    let scored = score_batch(
        model.clone(),
        permits,
        vec![profile("https://instagram.com/flaky", Some(2), now)],
        "biz",
        false,
        now,
    )
    .await;

    assert_eq!(scored[0].fit_score, 0);
    assert!(scored[0].fit_rationale.contains("scoring failed"));
    // Initial attempt plus two retries.
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn sorting_ranks_by_fit_with_stable_ties() {
    let now = Utc::now();
    let model = Arc::new(FixedModel::new(6));
    let permits = Arc::new(Semaphore::new(100));

    let mut scored = score_batch(
        model,
        permits,
        vec![
            profile("https://instagram.com/zeta", Some(1), now),
            profile("https://instagram.com/alpha", Some(1), now),
            profile("https://instagram.com/stale", Some(400), now),
        ],
        "biz",
        false,
        now,
    )
    .await;
    sort_by_fit(&mut scored);

    assert_eq!(scored[0].profile.profile_url, "https://instagram.com/alpha");
    assert_eq!(scored[1].profile.profile_url, "https://instagram.com/zeta");
    assert_eq!(scored[2].fit_score, 0);
}
