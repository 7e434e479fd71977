//! Routes mounted at `/admin`. All require an admin API key.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(admin::list_jobs))
        .route("/usage", get(admin::usage))
        .route("/keys", post(admin::create_key))
        .route("/keys/{id}/revoke", post(admin::revoke_key))
}
