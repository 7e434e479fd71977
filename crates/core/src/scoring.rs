//! Fit-score arithmetic, activity window, cost accounting, and the
//! relative-time formatting used for normalized post dates.

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A scored profile counts as a "good fit" when its normalized fit equals
/// this value (a perfect 10/10 on the underlying scale).
pub const GOOD_FIT_THRESHOLD: i32 = 100;

/// Profiles whose newest post is older than this window are scored 0
/// without consulting the model.
pub const INACTIVE_WINDOW_DAYS: i64 = 60;

/// Rationale assigned to inactive profiles by the short-circuit.
pub const INACTIVE_RATIONALE: &str = "inactive - no posts within the last 60 days";

/// Estimated cost per enriched profile returned by the provider.
pub const ENRICHMENT_COST_PER_PROFILE_USD: f64 = 0.0015;

/// Estimated cost per profile analyzed by the scoring model.
pub const SCORING_COST_PER_PROFILE_USD: f64 = 0.0015;

// ---------------------------------------------------------------------------
// Fit mapping
// ---------------------------------------------------------------------------

/// Map a raw 1–10 model score to the 0–100 fit scale. Out-of-range input
/// is clamped; a 10 maps to exactly [`GOOD_FIT_THRESHOLD`].
pub fn fit_from_score(score: i64) -> i32 {
    let clamped = score.clamp(1, 10) as f64;
    (clamped / 10.0 * 100.0).round() as i32
}

/// Whether a profile's newest post falls outside the activity window.
pub fn is_inactive(newest_post: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match newest_post {
        Some(ts) => now.signed_duration_since(ts).num_days() >= INACTIVE_WINDOW_DAYS,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Relative-time formatting
// ---------------------------------------------------------------------------

/// Render a timestamp relative to `now` ("just now", "5 hours ago",
/// "3 days ago", "2 months ago").
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(ts);
    let minutes = delta.num_minutes();
    let hours = delta.num_hours();
    let days = delta.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minute{} ago", plural(minutes))
    } else if hours < 24 {
        format!("{hours} hour{} ago", plural(hours))
    } else if days < 30 {
        format!("{days} day{} ago", plural(days))
    } else if days < 365 {
        let months = days / 30;
        format!("{months} month{} ago", plural(months))
    } else {
        let years = days / 365;
        format!("{years} year{} ago", plural(years))
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn perfect_score_maps_to_threshold() {
        assert_eq!(fit_from_score(10), GOOD_FIT_THRESHOLD);
    }

    #[test]
    fn fit_mapping_is_linear_and_clamped() {
        assert_eq!(fit_from_score(1), 10);
        assert_eq!(fit_from_score(7), 70);
        assert_eq!(fit_from_score(0), 10);
        assert_eq!(fit_from_score(99), 100);
    }

    #[test]
    fn profile_with_recent_post_is_active() {
        let ts = now() - Duration::days(7);
        assert!(!is_inactive(Some(ts), now()));
    }

    #[test]
    fn profile_with_stale_or_missing_posts_is_inactive() {
        let ts = now() - Duration::days(120);
        assert!(is_inactive(Some(ts), now()));
        assert!(is_inactive(None, now()));
    }

    #[test]
    fn sixty_day_boundary_is_inactive() {
        let ts = now() - Duration::days(60);
        assert!(is_inactive(Some(ts), now()));
        let ts = now() - Duration::days(59);
        assert!(!is_inactive(Some(ts), now()));
    }

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(now() - Duration::seconds(30), now()), "just now");
        assert_eq!(relative_time(now() - Duration::minutes(1), now()), "1 minute ago");
        assert_eq!(relative_time(now() - Duration::hours(5), now()), "5 hours ago");
        assert_eq!(relative_time(now() - Duration::days(3), now()), "3 days ago");
        assert_eq!(relative_time(now() - Duration::days(70), now()), "2 months ago");
        assert_eq!(relative_time(now() - Duration::days(800), now()), "2 years ago");
    }
}
