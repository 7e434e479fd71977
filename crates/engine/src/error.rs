//! Engine-level error type.
//!
//! The split drives the worker's ack/retry decision: `Db` failures are
//! retried via queue redelivery, `Fatal` and `Cancelled` terminalize the
//! job inside the runner and do not propagate past it.

use thiserror::Error;

use scout_core::status::Stage;

#[derive(Debug, Error)]
pub enum EngineError {
    /// `cancel_requested` was observed (or the status flipped to
    /// cancelled). A clean, non-error termination.
    #[error("Job cancelled")]
    Cancelled,

    /// Unrecoverable stage failure; the job terminates as `error`.
    #[error("Fatal failure in {}: {message}", stage.as_str())]
    Fatal { stage: Stage, message: String },

    /// Persistence failure; retried by queue redelivery.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl EngineError {
    pub fn fatal(stage: Stage, message: impl Into<String>) -> Self {
        EngineError::Fatal {
            stage,
            message: message.into(),
        }
    }
}
