//! Shared response envelope.
//!
//! Non-streaming responses use a `{ "data": ... }` envelope; use
//! [`DataResponse`] instead of ad-hoc `json!` for type safety and
//! consistent serialization.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
