//! Routes mounted at `/pipeline`.
//!
//! ```text
//! POST /start                      -> start_pipeline
//! GET  /jobs/{id}                  -> get_job
//! GET  /jobs/{id}/results          -> get_results
//! GET  /jobs/{id}/artifacts/{kind} -> get_artifact
//! GET  /jobs/{id}/events           -> get_events (json or sse)
//! POST /jobs/{id}/cancel           -> cancel_job
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{events, pipeline};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(pipeline::start_pipeline))
        .route("/jobs/{id}", get(pipeline::get_job))
        .route("/jobs/{id}/results", get(pipeline::get_results))
        .route("/jobs/{id}/artifacts/{kind}", get(pipeline::get_artifact))
        .route("/jobs/{id}/events", get(events::get_events))
        .route("/jobs/{id}/cancel", post(pipeline::cancel_job))
}
