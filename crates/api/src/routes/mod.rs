//! Route definitions, one module per resource.

pub mod admin;
pub mod health;
pub mod pipeline;
pub mod search;

use axum::Router;

use crate::state::AppState;

/// All resource routes (health is mounted separately at the root).
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/pipeline", pipeline::router())
        .nest("/weaviate", search::router())
        .nest("/admin", admin::router())
}
