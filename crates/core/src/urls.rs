//! Profile URL normalization and cache keying.
//!
//! Candidate deduplication and the profile cache both key on the normalized
//! form, so the rules here must stay in lockstep with whatever the vector
//! index stores.

use sha2::{Digest, Sha256};

/// Hosts for which a leading `www.` is stripped during normalization.
const WWW_STRIP_HOSTS: [&str; 2] = ["instagram.com", "tiktok.com"];

/// Normalize a profile URL: lowercase, drop query/fragment, strip a
/// trailing slash, and strip `www.` for supported hosts.
pub fn normalize_profile_url(raw: &str) -> String {
    let mut url = raw.trim().to_ascii_lowercase();

    if let Some(idx) = url.find(['?', '#']) {
        url.truncate(idx);
    }

    while url.ends_with('/') {
        url.pop();
    }

    for host in WWW_STRIP_HOSTS {
        let www = format!("www.{host}");
        if url.contains(&www) {
            url = url.replacen(&www, host, 1);
            break;
        }
    }

    url
}

/// Deterministic cache key for a profile URL: hex SHA-256 of the
/// normalized form.
pub fn profile_cache_key(raw_url: &str) -> String {
    let normalized = normalize_profile_url(raw_url);
    sha256_hex(normalized.as_bytes())
}

/// Encode the SHA-256 digest of `bytes` as a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_trailing_slash() {
        assert_eq!(
            normalize_profile_url("https://Instagram.com/SomeOne/"),
            "https://instagram.com/someone"
        );
    }

    #[test]
    fn strips_www_for_supported_hosts() {
        assert_eq!(
            normalize_profile_url("https://www.instagram.com/someone"),
            "https://instagram.com/someone"
        );
        assert_eq!(
            normalize_profile_url("https://www.tiktok.com/@someone"),
            "https://tiktok.com/@someone"
        );
    }

    #[test]
    fn keeps_www_for_other_hosts() {
        assert_eq!(
            normalize_profile_url("https://www.example.com/p"),
            "https://www.example.com/p"
        );
    }

    #[test]
    fn drops_query_and_fragment() {
        assert_eq!(
            normalize_profile_url("https://instagram.com/a?hl=en#top"),
            "https://instagram.com/a"
        );
    }

    #[test]
    fn equivalent_urls_share_a_cache_key() {
        let a = profile_cache_key("https://WWW.Instagram.com/Someone/");
        let b = profile_cache_key("https://instagram.com/someone");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
