//! API key generation and hashing.
//!
//! Keys are 48 alphanumeric characters; only the SHA-256 hex digest is
//! persisted, plus an 8-character prefix for human identification.

use rand::Rng;

use crate::urls::sha256_hex;

/// Length of the generated API key string.
pub const KEY_LENGTH: usize = 48;

/// Number of leading characters stored as a human-visible prefix.
pub const KEY_PREFIX_LENGTH: usize = 8;

/// The result of generating a new API key.
pub struct GeneratedApiKey {
    /// The plaintext key, shown to the operator exactly once.
    pub plaintext: String,
    /// The first [`KEY_PREFIX_LENGTH`] characters for display.
    pub prefix: String,
    /// SHA-256 hex digest of the plaintext, stored in the database.
    pub hash: String,
}

/// Generate a new random API key.
pub fn generate_api_key() -> GeneratedApiKey {
    let key: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect();

    let prefix = key[..KEY_PREFIX_LENGTH].to_string();
    let hash = hash_api_key(&key);

    GeneratedApiKey {
        plaintext: key,
        prefix,
        hash,
    }
}

/// Compute the SHA-256 hex digest of an API key. Used at creation time
/// and during authentication lookup.
pub fn hash_api_key(key: &str) -> String {
    sha256_hex(key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_expected_shape() {
        let key = generate_api_key();
        assert_eq!(key.plaintext.len(), KEY_LENGTH);
        assert_eq!(key.prefix.len(), KEY_PREFIX_LENGTH);
        assert!(key.plaintext.starts_with(&key.prefix));
        assert_eq!(key.hash.len(), 64);
    }

    #[test]
    fn hash_is_deterministic_and_key_sensitive() {
        assert_eq!(hash_api_key("abc"), hash_api_key("abc"));
        assert_ne!(hash_api_key("abc"), hash_api_key("abd"));
    }
}
