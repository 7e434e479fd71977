//! Stage 2: vector search.
//!
//! Keywords are deduplicated and embedded in one batched call (with
//! provider fallback), then the keyword × alpha Cartesian product fans
//! out as hybrid searches behind a 24-permit bound. Results merge with
//! URL-keyed dedup keeping the highest hybrid score.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;

use scout_core::profiles::Candidate;
use scout_core::status::{ArtifactKind, Stage};
use scout_core::urls::normalize_profile_url;
use scout_db::models::job::{PipelineJob, PipelineParams};
use scout_db::repositories::{ArtifactRepo, ExternalCallRepo, JobRepo};
use scout_providers::vector::{HybridQuery, SearchFilters};

use crate::context::EngineContext;
use crate::error::EngineError;
use crate::events::{ensure_active, JobLog};

/// The two hybrid dense/lexical mixes issued per keyword.
pub const ALPHA_WEIGHTS: [f64; 2] = [0.5, 0.85];

/// Progress reached when embeddings are ready.
const PROGRESS_EMBEDDED: i16 = 20;
/// Progress reached when all searches complete.
const PROGRESS_SEARCHED: i16 = 50;

/// Per-search result limit: `max(500, ceil(weaviate_top_n * 1.25 / |keywords|))`.
pub fn per_search_limit(weaviate_top_n: i32, keyword_count: usize) -> usize {
    let spread =
        ((weaviate_top_n.max(0) as f64 * 1.25) / keyword_count.max(1) as f64).ceil() as usize;
    spread.max(500)
}

/// Case-insensitive keyword dedup preserving first occurrence and order.
pub fn dedupe_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .collect()
}

/// Merge per-search result lists: drop excluded URLs, dedupe by
/// normalized URL keeping the entry with the highest hybrid score, sort
/// descending, and trim to `top_n`.
pub fn merge_candidates(
    results: Vec<Vec<Candidate>>,
    exclusions: &[String],
    top_n: usize,
) -> Vec<Candidate> {
    let excluded: std::collections::HashSet<String> = exclusions
        .iter()
        .map(|url| normalize_profile_url(url))
        .collect();

    let mut best: HashMap<String, Candidate> = HashMap::new();
    for candidate in results.into_iter().flatten() {
        if excluded.contains(&candidate.profile_url) {
            continue;
        }
        match best.get(&candidate.profile_url) {
            Some(existing) if existing.score >= candidate.score => {}
            _ => {
                best.insert(candidate.profile_url.clone(), candidate);
            }
        }
    }

    let mut merged: Vec<Candidate> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.profile_url.cmp(&b.profile_url))
    });
    merged.truncate(top_n);
    merged
}

pub async fn run(
    ctx: &EngineContext,
    job: &PipelineJob,
    params: &PipelineParams,
    keywords: Vec<String>,
    log: &JobLog,
) -> Result<Vec<Candidate>, EngineError> {
    JobRepo::set_stage(&ctx.pool, job.job_id, Stage::VectorSearch).await?;
    log.info(
        "stage_started",
        serde_json::json!({"stage": Stage::VectorSearch.as_str()}),
    )
    .await?;

    let keywords = dedupe_keywords(keywords);
    if keywords.is_empty() {
        return Err(EngineError::fatal(
            Stage::VectorSearch,
            "query expansion produced no usable keywords",
        ));
    }

    // --- Embeddings (one batched call, fallback handled by the provider) ---
    ensure_active(&ctx.pool, job.job_id).await?;
    let embed_started = Utc::now();
    let embed_result = ctx.providers.embeddings.embed_batch(&keywords).await;
    let embed_ms = Utc::now()
        .signed_duration_since(embed_started)
        .num_milliseconds();
    ExternalCallRepo::record(
        &ctx.pool,
        Some(job.job_id),
        Some(job.api_key_id),
        "embeddings",
        "embed_batch",
        embed_ms,
        if embed_result.is_ok() { "ok" } else { "error" },
        0.0,
        &serde_json::json!({"texts": keywords.len()}),
    )
    .await?;

    let vectors = embed_result
        .map_err(|e| EngineError::fatal(Stage::VectorSearch, format!("embeddings: {e}")))?;

    JobRepo::update_progress(&ctx.pool, job.job_id, PROGRESS_EMBEDDED).await?;
    log.info(
        "embeddings_ready",
        serde_json::json!({"keywords": keywords.len(), "progress": PROGRESS_EMBEDDED}),
    )
    .await?;

    // --- Fan out keyword × alpha searches behind the 24-permit bound ---
    ensure_active(&ctx.pool, job.job_id).await?;
    let limit = per_search_limit(params.weaviate_top_n, keywords.len());
    let fetch_limit = if params.exclude_profile_urls.is_empty() {
        limit
    } else {
        // Over-fetch so client-side exclusion filtering cannot starve the
        // result set.
        limit + params.exclude_profile_urls.len()
    };

    let filters = SearchFilters {
        platform: params.platform,
        min_followers: params.min_followers,
        max_followers: params.max_followers,
    };

    let search_started = Utc::now();
    let mut searches = Vec::new();
    for (keyword, vector) in keywords.iter().zip(vectors.iter()) {
        for alpha in ALPHA_WEIGHTS {
            let query = HybridQuery {
                query: keyword.clone(),
                vector: vector.clone(),
                alpha,
                limit: fetch_limit,
                filters: filters.clone(),
            };
            let vector_index = ctx.providers.vector.clone();
            let permits = ctx.search_permits.clone();
            searches.push(async move {
                let _permit = permits.acquire().await.expect("search semaphore closed");
                vector_index.hybrid_search(&query).await
            });
        }
    }

    let search_count = searches.len();
    let outcomes = join_all(searches).await;
    let search_ms = Utc::now()
        .signed_duration_since(search_started)
        .num_milliseconds();

    let mut results = Vec::new();
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome {
            Ok(candidates) => results.push(candidates),
            Err(err) => {
                failed += 1;
                log.warn(
                    "search_failed",
                    serde_json::json!({"error_kind": err.kind(), "message": err.to_string()}),
                )
                .await?;
            }
        }
    }

    ExternalCallRepo::record(
        &ctx.pool,
        Some(job.job_id),
        Some(job.api_key_id),
        "vector_index",
        "hybrid_search",
        search_ms,
        if failed == search_count { "error" } else { "ok" },
        0.0,
        &serde_json::json!({"searches": search_count, "failed": failed}),
    )
    .await?;

    if failed == search_count {
        return Err(EngineError::fatal(
            Stage::VectorSearch,
            "all vector searches failed",
        ));
    }

    let candidates = merge_candidates(
        results,
        &params.exclude_profile_urls,
        params.weaviate_top_n as usize,
    );

    ArtifactRepo::upsert(
        &ctx.pool,
        job.job_id,
        ArtifactKind::Candidates,
        &serde_json::json!({"candidates": &candidates}),
    )
    .await?;

    JobRepo::merge_meta(
        &ctx.pool,
        job.job_id,
        &serde_json::json!({
            "vector_search": {
                "status": "completed",
                "searches": search_count,
                "searches_failed": failed,
                "candidates": candidates.len(),
            },
        }),
    )
    .await?;
    JobRepo::update_progress(&ctx.pool, job.job_id, PROGRESS_SEARCHED).await?;

    log.info(
        "stage_completed",
        serde_json::json!({
            "stage": Stage::VectorSearch.as_str(),
            "candidates": candidates.len(),
            "progress": PROGRESS_SEARCHED,
        }),
    )
    .await?;

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::platform::Platform;

    fn candidate(url: &str, score: f64) -> Candidate {
        Candidate {
            id: None,
            score,
            distance: None,
            profile_url: normalize_profile_url(url),
            platform: Platform::from_url(url),
            display_name: None,
            biography: None,
            followers: None,
        }
    }

    #[test]
    fn per_search_limit_floors_at_500() {
        assert_eq!(per_search_limit(100, 6), 500);
        assert_eq!(per_search_limit(5000, 2), 3125);
        // ceil(4000 * 1.25 / 7) = ceil(714.28) = 715
        assert_eq!(per_search_limit(4000, 7), 715);
        assert_eq!(per_search_limit(1000, 0), 1250);
    }

    #[test]
    fn keyword_dedupe_is_case_insensitive_and_order_preserving() {
        let deduped = dedupe_keywords(vec![
            "Coffee Austin".into(),
            "coffee austin".into(),
            " lifestyle ".into(),
            "".into(),
            "lifestyle".into(),
        ]);
        assert_eq!(deduped, vec!["Coffee Austin".to_string(), "lifestyle".to_string()]);
    }

    #[test]
    fn merge_keeps_highest_score_per_url() {
        let merged = merge_candidates(
            vec![
                vec![candidate("https://instagram.com/a", 0.4)],
                vec![
                    candidate("https://www.instagram.com/A/", 0.9),
                    candidate("https://instagram.com/b", 0.7),
                ],
            ],
            &[],
            10,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].profile_url, "https://instagram.com/a");
        assert!((merged[0].score - 0.9).abs() < 1e-9);
        assert_eq!(merged[1].profile_url, "https://instagram.com/b");
    }

    #[test]
    fn merge_has_no_duplicate_urls() {
        let merged = merge_candidates(
            vec![
                vec![candidate("https://instagram.com/a", 0.1)],
                vec![candidate("https://instagram.com/a", 0.2)],
                vec![candidate("https://instagram.com/a", 0.3)],
            ],
            &[],
            10,
        );
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn exclusions_match_case_insensitively() {
        let merged = merge_candidates(
            vec![vec![
                candidate("https://instagram.com/keepme", 0.9),
                candidate("https://instagram.com/dropme", 0.8),
            ]],
            &["https://WWW.Instagram.com/DropMe/".to_string()],
            10,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].profile_url, "https://instagram.com/keepme");
    }

    #[test]
    fn merge_sorts_descending_and_trims() {
        let merged = merge_candidates(
            vec![vec![
                candidate("https://instagram.com/low", 0.1),
                candidate("https://instagram.com/high", 0.9),
                candidate("https://instagram.com/mid", 0.5),
            ]],
            &[],
            2,
        );
        assert_eq!(merged.len(), 2);
        assert!(merged[0].score >= merged[1].score);
        assert_eq!(merged[0].profile_url, "https://instagram.com/high");
    }
}
