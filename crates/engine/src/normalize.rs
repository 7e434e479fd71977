//! Raw provider payload normalization.
//!
//! Enrichment returns two source shapes (Instagram and TikTok field
//! vocabularies); both converge into [`ProfileRecord`]. Posts are
//! truncated to the most recent eight entries with relative-time dates.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use scout_core::platform::Platform;
use scout_core::profiles::{PostRecord, ProfileRecord, MAX_POSTS_PER_PROFILE};
use scout_core::scoring::relative_time;
use scout_core::urls::normalize_profile_url;

/// Normalize one raw payload. Returns `None` when no profile URL can be
/// extracted (the row is unusable downstream).
pub fn normalize_profile(
    raw: &Value,
    platform_hint: Platform,
    now: DateTime<Utc>,
) -> Option<ProfileRecord> {
    let raw_url = first_str(raw, &["url", "profile_url", "input_url", "account_url"])?;
    let profile_url = normalize_profile_url(raw_url);

    let platform = match Platform::from_url(&profile_url) {
        Platform::Unknown => platform_hint,
        derived => derived,
    };

    let account_id = first_str(raw, &["account_id", "id", "username", "account", "unique_id"])
        .map(str::to_string);
    let display_name = first_str(raw, &["display_name", "full_name", "profile_name", "nickname"])
        .map(str::to_string);
    let biography =
        first_str(raw, &["biography", "bio", "signature", "description"]).map(str::to_string);
    let followers = first_i64(raw, &["followers", "followers_count", "follower_count"]);

    Some(ProfileRecord {
        platform,
        account_id,
        display_name,
        followers,
        biography,
        profile_url,
        posts_data: normalize_posts(raw, now),
    })
}

/// Extract, sort, and truncate the post list.
fn normalize_posts(raw: &Value, now: DateTime<Utc>) -> Vec<PostRecord> {
    let posts = ["posts", "videos", "latest_posts", "posts_data"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_array));

    let Some(posts) = posts else {
        return Vec::new();
    };

    let mut records: Vec<PostRecord> = posts.iter().map(|p| normalize_post(p, now)).collect();

    // Newest first; undated posts sink to the end.
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    records.truncate(MAX_POSTS_PER_PROFILE);
    records
}

fn normalize_post(post: &Value, now: DateTime<Utc>) -> PostRecord {
    let timestamp = post_timestamp(post);
    PostRecord {
        caption: first_str(post, &["caption", "desc", "description", "title"])
            .map(str::to_string),
        likes: first_i64(post, &["likes", "likes_count", "digg_count", "like_count"]),
        comments: first_i64(post, &["comments", "num_comments", "comment_count"]),
        timestamp,
        posted: timestamp.map(|ts| relative_time(ts, now)),
    }
}

/// Post timestamps arrive either as RFC 3339 strings or as unix seconds.
fn post_timestamp(post: &Value) -> Option<DateTime<Utc>> {
    for key in ["timestamp", "datetime", "taken_at", "create_time", "posted_at"] {
        match post.get(key) {
            Some(Value::String(s)) => {
                if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                    return Some(parsed.with_timezone(&Utc));
                }
            }
            Some(Value::Number(n)) => {
                if let Some(secs) = n.as_i64() {
                    if let Some(ts) = Utc.timestamp_opt(secs, 0).single() {
                        return Some(ts);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn first_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_i64))
}

/// Render the profile as the deterministic text block fed to the scoring
/// prompt.
pub fn render_profile_text(profile: &ProfileRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Platform: {}\n", profile.platform.as_str()));
    if let Some(name) = &profile.display_name {
        out.push_str(&format!("Name: {name}\n"));
    }
    out.push_str(&format!("URL: {}\n", profile.profile_url));
    if let Some(followers) = profile.followers {
        out.push_str(&format!("Followers: {followers}\n"));
    }
    if let Some(bio) = &profile.biography {
        out.push_str(&format!("Bio: {bio}\n"));
    }
    if !profile.posts_data.is_empty() {
        out.push_str("Recent posts:\n");
        for post in &profile.posts_data {
            let posted = post.posted.as_deref().unwrap_or("undated");
            let caption = post.caption.as_deref().unwrap_or("(no caption)");
            let likes = post
                .likes
                .map(|l| format!(", {l} likes"))
                .unwrap_or_default();
            out.push_str(&format!("- [{posted}{likes}] {caption}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn normalizes_instagram_shape() {
        let raw = serde_json::json!({
            "account": "someone",
            "full_name": "Some One",
            "followers": 42000,
            "biography": "coffee + lifestyle",
            "profile_url": "https://www.instagram.com/Someone/",
            "posts": [
                {"caption": "latte art", "likes": 120, "num_comments": 4,
                 "datetime": "2026-06-28T09:00:00Z"},
            ],
        });
        let p = normalize_profile(&raw, Platform::Instagram, now()).expect("profile");
        assert_eq!(p.profile_url, "https://instagram.com/someone");
        assert_eq!(p.platform, Platform::Instagram);
        assert_eq!(p.followers, Some(42000));
        assert_eq!(p.posts_data.len(), 1);
        assert_eq!(p.posts_data[0].posted.as_deref(), Some("3 days ago"));
    }

    #[test]
    fn normalizes_tiktok_shape_with_unix_timestamps() {
        let create_time = (now() - Duration::days(2)).timestamp();
        let raw = serde_json::json!({
            "unique_id": "dancer",
            "nickname": "Dancer",
            "followers": 9000,
            "signature": "dance videos",
            "url": "https://www.tiktok.com/@dancer",
            "videos": [
                {"desc": "new moves", "digg_count": 5000, "comment_count": 80,
                 "create_time": create_time},
            ],
        });
        let p = normalize_profile(&raw, Platform::Tiktok, now()).expect("profile");
        assert_eq!(p.platform, Platform::Tiktok);
        assert_eq!(p.biography.as_deref(), Some("dance videos"));
        assert_eq!(p.posts_data[0].likes, Some(5000));
        assert_eq!(p.posts_data[0].posted.as_deref(), Some("2 days ago"));
    }

    #[test]
    fn posts_are_truncated_to_the_most_recent_eight() {
        let posts: Vec<Value> = (0..12)
            .map(|i| {
                serde_json::json!({
                    "caption": format!("post {i}"),
                    "datetime": (now() - Duration::days(i)).to_rfc3339(),
                })
            })
            .collect();
        let raw = serde_json::json!({
            "url": "https://instagram.com/busy",
            "posts": posts,
        });
        let p = normalize_profile(&raw, Platform::Instagram, now()).expect("profile");
        assert_eq!(p.posts_data.len(), MAX_POSTS_PER_PROFILE);
        // Newest first: post 0 is today's.
        assert_eq!(p.posts_data[0].caption.as_deref(), Some("post 0"));
        assert_eq!(p.posts_data[7].caption.as_deref(), Some("post 7"));
    }

    #[test]
    fn row_without_url_is_rejected() {
        let raw = serde_json::json!({"full_name": "No URL"});
        assert!(normalize_profile(&raw, Platform::Instagram, now()).is_none());
    }

    #[test]
    fn profile_text_is_deterministic_and_complete() {
        let raw = serde_json::json!({
            "url": "https://instagram.com/a",
            "full_name": "A",
            "followers": 10,
            "biography": "bio",
            "posts": [{"caption": "hello", "likes": 3,
                       "datetime": "2026-06-30T12:00:00Z"}],
        });
        let p = normalize_profile(&raw, Platform::Instagram, now()).expect("profile");
        let text = render_profile_text(&p);
        assert!(text.contains("Name: A"));
        assert!(text.contains("Followers: 10"));
        assert!(text.contains("1 day ago"));
        assert!(text.contains("hello"));
        assert_eq!(text, render_profile_text(&p));
    }
}
