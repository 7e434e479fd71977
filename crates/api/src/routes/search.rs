//! Routes mounted at `/weaviate`.

use axum::routing::post;
use axum::Router;

use crate::handlers::search;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/search", post(search::search))
}
