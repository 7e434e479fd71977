//! Domain-level error taxonomy shared by the admission service and the
//! execution engine.
//!
//! Each variant corresponds to one externally observable failure kind; the
//! HTTP layer maps them to status codes and the engine maps them to job
//! terminal states.

use thiserror::Error;

/// Domain error. The `code` method yields the wire-level error kind.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Request shape or bounds violate the contract.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The entity does not exist for the caller. Ownership mismatches are
    /// reported with this variant so they are indistinguishable from a
    /// genuinely missing row.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The operation is illegal for the entity's current status.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The caller's token bucket is empty.
    #[error("Rate limit exceeded for scope '{scope}'")]
    RateLimited { scope: &'static str, remaining: f64 },

    /// The caller already has the maximum number of active jobs.
    #[error("Active job limit reached ({active} of {cap})")]
    OverCap { active: i64, cap: i64 },

    /// The job was cancelled. Not an error in the usual sense, but a
    /// distinct terminal outcome.
    #[error("Cancelled")]
    Cancelled,

    /// An upstream provider call failed.
    #[error("Upstream failure from {service}: {message}")]
    Upstream { service: &'static str, message: String },

    /// Unrecoverable internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable error kind for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "validation",
            CoreError::Unauthorized(_) => "auth",
            CoreError::NotFound { .. } => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::RateLimited { .. } => "rate_limited",
            CoreError::OverCap { .. } => "over_cap",
            CoreError::Cancelled => "cancelled",
            CoreError::Upstream { .. } => "upstream",
            CoreError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CoreError::Validation("x".into()).code(), "validation");
        assert_eq!(
            CoreError::NotFound { entity: "Job" }.code(),
            "not_found"
        );
        assert_eq!(
            CoreError::RateLimited { scope: "s", remaining: 0.0 }.code(),
            "rate_limited"
        );
        assert_eq!(CoreError::OverCap { active: 3, cap: 3 }.code(), "over_cap");
    }

    #[test]
    fn not_found_hides_ownership() {
        // The message must not leak whether the row exists for another owner.
        let e = CoreError::NotFound { entity: "Job" };
        assert_eq!(e.to_string(), "Job not found");
    }
}
