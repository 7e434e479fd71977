//! Unified candidate and profile records.
//!
//! Vector search yields [`Candidate`]s (preview fields only). Enrichment
//! yields provider-specific raw payloads that are normalized into
//! [`ProfileRecord`]s, which scoring decorates into [`ScoredProfile`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// An entry returned from vector search, before enrichment or scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Vector-index object id, when the index exposes one.
    pub id: Option<String>,
    /// Hybrid relevance score; higher is better.
    pub score: f64,
    /// Raw vector distance, when reported.
    pub distance: Option<f64>,
    /// Normalized profile URL. Unique within a candidate set.
    pub profile_url: String,
    pub platform: Platform,
    pub display_name: Option<String>,
    pub biography: Option<String>,
    pub followers: Option<i64>,
}

// ---------------------------------------------------------------------------
// ProfileRecord
// ---------------------------------------------------------------------------

/// One post in a normalized profile. Posts are truncated to the most
/// recent [`MAX_POSTS_PER_PROFILE`] entries during normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub caption: Option<String>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    /// Absolute post timestamp, when the provider supplied one.
    pub timestamp: Option<Timestamp>,
    /// Human-readable relative date ("3 days ago"), derived from
    /// `timestamp` at normalization time.
    pub posted: Option<String>,
}

/// Maximum number of posts kept per profile after normalization.
pub const MAX_POSTS_PER_PROFILE: usize = 8;

/// A profile normalized from either provider shape into one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub platform: Platform,
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub followers: Option<i64>,
    pub biography: Option<String>,
    /// Normalized profile URL.
    pub profile_url: String,
    pub posts_data: Vec<PostRecord>,
}

impl ProfileRecord {
    /// Timestamp of the newest post, if any post carries one.
    pub fn newest_post_at(&self) -> Option<DateTime<Utc>> {
        self.posts_data.iter().filter_map(|p| p.timestamp).max()
    }
}

// ---------------------------------------------------------------------------
// ScoredProfile
// ---------------------------------------------------------------------------

/// A profile after scoring. `fit_score` is on the 0–100 scale; 100 is the
/// good-fit threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredProfile {
    #[serde(flatten)]
    pub profile: ProfileRecord,
    pub fit_score: i32,
    pub fit_rationale: String,
    pub fit_summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post_at(ts: Option<DateTime<Utc>>) -> PostRecord {
        PostRecord {
            caption: None,
            likes: None,
            comments: None,
            timestamp: ts,
            posted: None,
        }
    }

    #[test]
    fn newest_post_picks_the_maximum_timestamp() {
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let profile = ProfileRecord {
            platform: Platform::Instagram,
            account_id: None,
            display_name: None,
            followers: None,
            biography: None,
            profile_url: "https://instagram.com/a".into(),
            posts_data: vec![post_at(Some(older)), post_at(None), post_at(Some(newer))],
        };
        assert_eq!(profile.newest_post_at(), Some(newer));
    }

    #[test]
    fn newest_post_is_none_without_timestamps() {
        let profile = ProfileRecord {
            platform: Platform::Tiktok,
            account_id: None,
            display_name: None,
            followers: None,
            biography: None,
            profile_url: "https://tiktok.com/@a".into(),
            posts_data: vec![post_at(None)],
        };
        assert_eq!(profile.newest_post_at(), None);
    }

    #[test]
    fn scored_profile_flattens_profile_fields() {
        let scored = ScoredProfile {
            profile: ProfileRecord {
                platform: Platform::Instagram,
                account_id: Some("123".into()),
                display_name: Some("A".into()),
                followers: Some(10),
                biography: None,
                profile_url: "https://instagram.com/a".into(),
                posts_data: vec![],
            },
            fit_score: 80,
            fit_rationale: "solid".into(),
            fit_summary: "summary".into(),
        };
        let v = serde_json::to_value(&scored).unwrap();
        assert_eq!(v["profile_url"], "https://instagram.com/a");
        assert_eq!(v["fit_score"], 80);
    }
}
