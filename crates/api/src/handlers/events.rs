//! Job event reads: batched JSON polling and SSE streaming.
//!
//! Both read the durable event log with the monotonic row id as cursor,
//! so a client can switch freely between polling and streaming. On the
//! stream, a client-provided `Last-Event-ID` header wins over the `after`
//! query argument.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event as SseEvent, KeepAlive, KeepAliveStream, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use scout_core::types::{DbId, JobId};
use scout_db::repositories::event_repo::MAX_BATCH;
use scout_db::repositories::EventRepo;
use scout_db::DbPool;

use crate::error::AppResult;
use crate::handlers::pipeline::find_owned_job;
use crate::middleware::auth::AuthPrincipal;
use crate::response::DataResponse;
use crate::state::AppState;

/// Sleep between empty reads on the live stream.
const STREAM_IDLE_SLEEP: Duration = Duration::from_secs(1);

/// Query parameters for `GET /pipeline/jobs/{id}/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events with id strictly greater than this cursor.
    pub after: Option<DbId>,
    /// Batch size for JSON reads (clamped to 200).
    pub limit: Option<i64>,
    /// `json` (default) or `sse`.
    pub format: Option<String>,
}

/// GET /pipeline/jobs/{id}/events
///
/// JSON batch by default; switches to SSE when `format=sse` or the
/// client sends `Accept: text/event-stream`.
pub async fn get_events(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let _job = find_owned_job(&state.pool, job_id, principal.id).await?;

    let wants_sse = query.format.as_deref() == Some("sse")
        || headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/event-stream"));

    if wants_sse {
        // The last-seen-id header wins over the query argument.
        let cursor = headers
            .get("last-event-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<DbId>().ok())
            .or(query.after)
            .unwrap_or(0);
        return Ok(stream_events(state.pool.clone(), job_id, cursor).into_response());
    }

    let after = query.after.unwrap_or(0);
    let limit = query.limit.unwrap_or(MAX_BATCH);
    let events = EventRepo::list_after(&state.pool, job_id, after, limit).await?;
    let next_after = events.last().map(|e| e.id).unwrap_or(after);

    Ok(Json(DataResponse {
        data: serde_json::json!({
            "events": events,
            "next_after": next_after,
        }),
    })
    .into_response())
}

/// Build the SSE response: seed a heartbeat, then loop reading ≤200-event
/// chunks; empty chunks emit a heartbeat and sleep ~1s. The task exits
/// when the client disconnects (the channel closes).
fn stream_events(
    pool: DbPool,
    job_id: JobId,
    start_cursor: DbId,
) -> Sse<KeepAliveStream<ReceiverStream<Result<SseEvent, Infallible>>>> {
    let (tx, rx) = mpsc::channel::<Result<SseEvent, Infallible>>(64);

    tokio::spawn(async move {
        let mut cursor = start_cursor;

        // Seed heartbeat so proxies flush response headers immediately.
        if tx.send(Ok(ping())).await.is_err() {
            return;
        }

        loop {
            match EventRepo::list_after(&pool, job_id, cursor, MAX_BATCH).await {
                Ok(events) if events.is_empty() => {
                    if tx.send(Ok(ping())).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(STREAM_IDLE_SLEEP).await;
                }
                Ok(events) => {
                    let mut closed = false;
                    for event in events {
                        cursor = cursor.max(event.id);
                        let frame = SseEvent::default()
                            .event("job_event")
                            .id(event.id.to_string())
                            .data(serde_json::to_string(&event).unwrap_or_default());
                        if tx.send(Ok(frame)).await.is_err() {
                            closed = true;
                            break;
                        }
                    }
                    if closed {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Event stream read failed");
                    if tx.send(Ok(ping())).await.is_err() {
                        break;
                    }
                    tokio::time::sleep(STREAM_IDLE_SLEEP).await;
                }
            }
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .event(ping()),
    )
}

fn ping() -> SseEvent {
    SseEvent::default().event("ping").data("{}")
}
