//! Enrichment plan construction.
//!
//! The plan is built up front so `total_batches` is stable for progress
//! reporting and batch indices stay meaningful across the run. Cache-hit
//! URLs never appear in a fetch batch.

use std::collections::HashSet;

use scout_core::platform::Platform;
use scout_core::profiles::Candidate;

/// Profiles per enrichment + scoring batch.
pub const BATCH_SIZE: usize = 20;

/// Fixed platform grouping order, so batch indices are deterministic for
/// a given candidate set.
const PLATFORM_ORDER: [Platform; 3] = [Platform::Instagram, Platform::Tiktok, Platform::Unknown];

/// One planned batch. The index is assigned at plan time and preserved in
/// the `batch:N` artifact key.
#[derive(Debug, Clone)]
pub struct PlannedBatch {
    pub index: u32,
    pub platform: Platform,
    pub urls: Vec<String>,
    pub from_cache: bool,
}

/// The full enrichment plan.
#[derive(Debug, Clone)]
pub struct EnrichmentPlan {
    /// Batches servable from the profile cache (Phase A).
    pub cache_batches: Vec<PlannedBatch>,
    /// Batches requiring provider triggers (Phase B).
    pub fetch_batches: Vec<PlannedBatch>,
    pub cache_hits: usize,
    pub uncached: usize,
    /// Uncached URLs dropped because their platform is unknown and no
    /// dataset can be triggered for them.
    pub skipped_unknown: usize,
}

impl EnrichmentPlan {
    pub fn total_batches(&self) -> usize {
        self.cache_batches.len() + self.fetch_batches.len()
    }
}

/// Classify candidates against the cache and chunk them into batches.
///
/// `cached_urls` holds the normalized URLs present (and unexpired) in the
/// profile cache at plan time.
pub fn build_plan(candidates: &[Candidate], cached_urls: &HashSet<String>) -> EnrichmentPlan {
    let mut cache_groups: Vec<(Platform, Vec<String>)> =
        PLATFORM_ORDER.iter().map(|p| (*p, Vec::new())).collect();
    let mut fetch_groups: Vec<(Platform, Vec<String>)> =
        PLATFORM_ORDER.iter().map(|p| (*p, Vec::new())).collect();

    let mut cache_hits = 0;
    let mut uncached = 0;
    let mut skipped_unknown = 0;

    for candidate in candidates {
        let platform = Platform::from_url(&candidate.profile_url);
        let slot = PLATFORM_ORDER
            .iter()
            .position(|p| *p == platform)
            .unwrap_or(PLATFORM_ORDER.len() - 1);

        if cached_urls.contains(&candidate.profile_url) {
            cache_hits += 1;
            cache_groups[slot].1.push(candidate.profile_url.clone());
        } else if platform == Platform::Unknown {
            // No dataset exists for unknown hosts.
            skipped_unknown += 1;
        } else {
            uncached += 1;
            fetch_groups[slot].1.push(candidate.profile_url.clone());
        }
    }

    let mut index = 0u32;
    let cache_batches = chunk_groups(cache_groups, true, &mut index);
    let fetch_batches = chunk_groups(fetch_groups, false, &mut index);

    EnrichmentPlan {
        cache_batches,
        fetch_batches,
        cache_hits,
        uncached,
        skipped_unknown,
    }
}

fn chunk_groups(
    groups: Vec<(Platform, Vec<String>)>,
    from_cache: bool,
    index: &mut u32,
) -> Vec<PlannedBatch> {
    let mut batches = Vec::new();
    for (platform, urls) in groups {
        for chunk in urls.chunks(BATCH_SIZE) {
            batches.push(PlannedBatch {
                index: *index,
                platform,
                urls: chunk.to_vec(),
                from_cache,
            });
            *index += 1;
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str) -> Candidate {
        Candidate {
            id: None,
            score: 1.0,
            distance: None,
            profile_url: url.to_string(),
            platform: Platform::from_url(url),
            display_name: None,
            biography: None,
            followers: None,
        }
    }

    fn ig(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| candidate(&format!("https://instagram.com/user{i}")))
            .collect()
    }

    #[test]
    fn cached_urls_never_reach_fetch_batches() {
        let candidates = ig(30);
        let cached: HashSet<String> = candidates[..10]
            .iter()
            .map(|c| c.profile_url.clone())
            .collect();

        let plan = build_plan(&candidates, &cached);

        assert_eq!(plan.cache_hits, 10);
        assert_eq!(plan.uncached, 20);
        let fetch_urls: Vec<&String> =
            plan.fetch_batches.iter().flat_map(|b| b.urls.iter()).collect();
        for url in &cached {
            assert!(!fetch_urls.contains(&url), "{url} leaked into fetch batches");
        }
    }

    #[test]
    fn batches_chunk_at_twenty_and_indices_are_stable() {
        let candidates = ig(45);
        let plan = build_plan(&candidates, &HashSet::new());

        assert!(plan.cache_batches.is_empty());
        assert_eq!(plan.fetch_batches.len(), 3);
        assert_eq!(plan.fetch_batches[0].urls.len(), 20);
        assert_eq!(plan.fetch_batches[2].urls.len(), 5);
        let indices: Vec<u32> = plan.fetch_batches.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(plan.total_batches(), 3);
    }

    #[test]
    fn cache_batches_are_indexed_before_fetch_batches() {
        let mut candidates = ig(25);
        candidates.extend((0..5).map(|i| candidate(&format!("https://tiktok.com/@t{i}"))));
        let cached: HashSet<String> = candidates[..5]
            .iter()
            .map(|c| c.profile_url.clone())
            .collect();

        let plan = build_plan(&candidates, &cached);

        assert_eq!(plan.cache_batches.len(), 1);
        assert_eq!(plan.cache_batches[0].index, 0);
        assert!(plan
            .fetch_batches
            .iter()
            .all(|b| b.index > plan.cache_batches[0].index));
        // Instagram fetch batches come before TikTok per the fixed order.
        assert_eq!(plan.fetch_batches[0].platform, Platform::Instagram);
        assert_eq!(
            plan.fetch_batches.last().unwrap().platform,
            Platform::Tiktok
        );
    }

    #[test]
    fn unknown_platform_uncached_urls_are_skipped() {
        let candidates = vec![
            candidate("https://instagram.com/a"),
            candidate("https://example.com/mystery"),
        ];
        let plan = build_plan(&candidates, &HashSet::new());
        assert_eq!(plan.skipped_unknown, 1);
        assert_eq!(plan.uncached, 1);
        assert_eq!(plan.total_batches(), 1);
    }

    #[test]
    fn unknown_platform_cache_hits_are_still_processed() {
        let candidates = vec![candidate("https://example.com/mystery")];
        let cached: HashSet<String> =
            candidates.iter().map(|c| c.profile_url.clone()).collect();
        let plan = build_plan(&candidates, &cached);
        assert_eq!(plan.cache_hits, 1);
        assert_eq!(plan.cache_batches.len(), 1);
        assert!(plan.fetch_batches.is_empty());
    }
}
