//! Error type shared by the four provider clients.

use thiserror::Error;

/// Errors from outbound provider calls. The subtypes drive the engine's
/// recovery policy: `PaymentRequired` triggers the embedding fallback,
/// `Timeout` is counted per batch, everything else is retried or
/// propagated depending on the call site.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the call for billing reasons (HTTP 402).
    #[error("Payment required: {0}")]
    PaymentRequired(String),

    /// The call exceeded its deadline.
    #[error("Timed out calling {0}")]
    Timeout(String),

    /// The provider answered with a body we could not interpret.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The HTTP request itself failed (network, DNS, TLS).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl ProviderError {
    /// Stable subtype tag for ledger rows and events.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::PaymentRequired(_) => "payment_required",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Malformed(_) => "malformed_response",
            ProviderError::Transport(_) => "transport",
            ProviderError::Api { .. } => "api",
        }
    }

    /// Classify a reqwest failure, attributing timeouts to `operation`.
    pub fn from_reqwest(err: reqwest::Error, operation: &str) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(operation.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// Map a non-2xx response to the right subtype and surface the body.
pub async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    if status == 402 {
        ProviderError::PaymentRequired(body)
    } else {
        ProviderError::Api { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ProviderError::PaymentRequired(String::new()).kind(), "payment_required");
        assert_eq!(ProviderError::Timeout("op".into()).kind(), "timeout");
        assert_eq!(ProviderError::Malformed(String::new()).kind(), "malformed_response");
        assert_eq!(ProviderError::Transport(String::new()).kind(), "transport");
        assert_eq!(ProviderError::Api { status: 500, body: String::new() }.kind(), "api");
    }
}
