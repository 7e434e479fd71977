//! Social platform tag.
//!
//! Profile normalization converges the provider-specific shapes into one
//! record keyed by this closed tag. Unknown hosts map to `Unknown` and are
//! skipped during enrichment planning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
    Unknown,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "instagram" => Some(Platform::Instagram),
            "tiktok" => Some(Platform::Tiktok),
            "unknown" => Some(Platform::Unknown),
            _ => None,
        }
    }

    /// Derive the platform from a (normalized or raw) profile URL.
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_ascii_lowercase();
        if lower.contains("instagram.com") {
            Platform::Instagram
        } else if lower.contains("tiktok.com") {
            Platform::Tiktok
        } else {
            Platform::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_platform_from_url() {
        assert_eq!(
            Platform::from_url("https://www.instagram.com/someone"),
            Platform::Instagram
        );
        assert_eq!(
            Platform::from_url("https://TikTok.com/@someone"),
            Platform::Tiktok
        );
        assert_eq!(Platform::from_url("https://example.com/x"), Platform::Unknown);
    }
}
