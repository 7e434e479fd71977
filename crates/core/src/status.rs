//! Closed status and kind tags stored as TEXT columns.
//!
//! Every tag round-trips through `as_str`/`parse` so the database, the API
//! surface, and the engine all speak the same literals.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "error" => Some(JobStatus::Error),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses are write-once: no transition ever leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The four pipeline stages, plus `None` before execution begins.
/// The linear order is fixed; enrichment and scoring interleave per batch
/// but the stage tag still advances linearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    None,
    QueryExpansion,
    VectorSearch,
    Enrichment,
    Scoring,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::None => "none",
            Stage::QueryExpansion => "query_expansion",
            Stage::VectorSearch => "vector_search",
            Stage::Enrichment => "enrichment",
            Stage::Scoring => "scoring",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Stage::None),
            "query_expansion" => Some(Stage::QueryExpansion),
            "vector_search" => Some(Stage::VectorSearch),
            "enrichment" => Some(Stage::Enrichment),
            "scoring" => Some(Stage::Scoring),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventLevel
// ---------------------------------------------------------------------------

/// Severity level of a job event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl EventLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EventLevel::Debug => "debug",
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// Recognized artifact kinds. `Batch(n)` serializes as `batch:N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Candidates,
    Batch(u32),
    Progressive,
    Final,
    Remaining,
    Timing,
}

impl ArtifactKind {
    pub fn to_key(self) -> String {
        match self {
            ArtifactKind::Candidates => "candidates".to_string(),
            ArtifactKind::Batch(n) => format!("batch:{n}"),
            ArtifactKind::Progressive => "progressive".to_string(),
            ArtifactKind::Final => "final".to_string(),
            ArtifactKind::Remaining => "remaining".to_string(),
            ArtifactKind::Timing => "timing".to_string(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "candidates" => Some(ArtifactKind::Candidates),
            "progressive" => Some(ArtifactKind::Progressive),
            "final" => Some(ArtifactKind::Final),
            "remaining" => Some(ArtifactKind::Remaining),
            "timing" => Some(ArtifactKind::Timing),
            other => other
                .strip_prefix("batch:")
                .and_then(|n| n.parse().ok())
                .map(ArtifactKind::Batch),
        }
    }

    /// Kinds a client may fetch via `GET …/artifacts/{kind}`. The `final`
    /// artifact has its own endpoint and per-batch blobs stay internal.
    pub fn is_client_fetchable(self) -> bool {
        matches!(
            self,
            ArtifactKind::Candidates
                | ArtifactKind::Progressive
                | ArtifactKind::Remaining
                | ArtifactKind::Timing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_round_trips() {
        for s in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Error,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobStatus::parse("paused"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn batch_kind_round_trips() {
        assert_eq!(ArtifactKind::Batch(7).to_key(), "batch:7");
        assert_eq!(ArtifactKind::parse("batch:7"), Some(ArtifactKind::Batch(7)));
        assert_eq!(ArtifactKind::parse("batch:x"), None);
        assert_eq!(ArtifactKind::parse("blob"), None);
    }

    #[test]
    fn client_fetchable_kinds_exclude_final_and_batches() {
        assert!(ArtifactKind::Candidates.is_client_fetchable());
        assert!(ArtifactKind::Timing.is_client_fetchable());
        assert!(!ArtifactKind::Final.is_client_fetchable());
        assert!(!ArtifactKind::Batch(0).is_client_fetchable());
    }
}
