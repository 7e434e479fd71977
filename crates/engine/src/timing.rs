//! Relative-time waterfall for the run's Gantt view.
//!
//! Spans are recorded as millisecond offsets from the run start, so the
//! rendered view is independent of wall-clock time zones.

use serde::Serialize;

use scout_core::types::Timestamp;

/// One stage (or sub-stage) span.
#[derive(Debug, Clone, Serialize)]
pub struct StageSpan {
    pub name: String,
    pub start_ms: i64,
    pub end_ms: Option<i64>,
}

/// Collects spans during a run and renders the `timing` artifact.
#[derive(Debug, Clone)]
pub struct Waterfall {
    run_started_at: Timestamp,
    spans: Vec<StageSpan>,
}

impl Waterfall {
    pub fn new(run_started_at: Timestamp) -> Self {
        Self {
            run_started_at,
            spans: Vec::new(),
        }
    }

    fn offset_ms(&self, now: Timestamp) -> i64 {
        now.signed_duration_since(self.run_started_at)
            .num_milliseconds()
            .max(0)
    }

    /// Open a span at `now`.
    pub fn begin(&mut self, name: &str, now: Timestamp) {
        let start_ms = self.offset_ms(now);
        self.spans.push(StageSpan {
            name: name.to_string(),
            start_ms,
            end_ms: None,
        });
    }

    /// Close the most recent open span with the given name. Closing is
    /// idempotent; a second close is ignored.
    pub fn end(&mut self, name: &str, now: Timestamp) {
        let end_ms = self.offset_ms(now);
        if let Some(span) = self
            .spans
            .iter_mut()
            .rev()
            .find(|s| s.name == name && s.end_ms.is_none())
        {
            span.end_ms = Some(end_ms);
        }
    }

    /// Close every still-open span (terminal transitions record the
    /// current stage's end time).
    pub fn end_open(&mut self, now: Timestamp) {
        let end_ms = self.offset_ms(now);
        for span in self.spans.iter_mut().filter(|s| s.end_ms.is_none()) {
            span.end_ms = Some(end_ms);
        }
    }

    /// Render the `timing` artifact payload.
    pub fn to_artifact(&self, now: Timestamp) -> serde_json::Value {
        serde_json::json!({
            "run_started_at": self.run_started_at,
            "total_ms": self.offset_ms(now),
            "stages": self.spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn spans_record_relative_offsets() {
        let mut w = Waterfall::new(t0());
        w.begin("query_expansion", t0());
        w.end("query_expansion", t0() + Duration::milliseconds(250));
        w.begin("vector_search", t0() + Duration::milliseconds(250));
        w.end("vector_search", t0() + Duration::seconds(2));

        let artifact = w.to_artifact(t0() + Duration::seconds(2));
        assert_eq!(artifact["total_ms"], 2000);
        assert_eq!(artifact["stages"][0]["start_ms"], 0);
        assert_eq!(artifact["stages"][0]["end_ms"], 250);
        assert_eq!(artifact["stages"][1]["end_ms"], 2000);
    }

    #[test]
    fn end_open_closes_dangling_spans() {
        let mut w = Waterfall::new(t0());
        w.begin("enrichment", t0());
        w.end_open(t0() + Duration::seconds(5));
        let artifact = w.to_artifact(t0() + Duration::seconds(5));
        assert_eq!(artifact["stages"][0]["end_ms"], 5000);
    }

    #[test]
    fn double_end_is_ignored() {
        let mut w = Waterfall::new(t0());
        w.begin("scoring", t0());
        w.end("scoring", t0() + Duration::seconds(1));
        w.end("scoring", t0() + Duration::seconds(9));
        let artifact = w.to_artifact(t0() + Duration::seconds(9));
        assert_eq!(artifact["stages"][0]["end_ms"], 1000);
    }
}
