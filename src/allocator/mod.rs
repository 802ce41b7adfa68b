//! Allocation-on-request demo service.
//!
//! Every `POST /allocate` allocates a buffer, touches all of its pages and
//! holds it for the requested time, so memory consumption follows the
//! request rate. The memory limiter middleware guards that route only;
//! `GET /stats` stays reachable under throttling.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AllocatorConfig;
use crate::service::Service;
use crate::stats::MemLimiterStats;

#[derive(Clone)]
struct AppState {
    service: Arc<dyn Service>,
    max_allocation_bytes: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AllocateRequest {
    /// Buffer size [bytes].
    pub size: u64,
    /// How long to hold the buffer.
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AllocateResponse {
    pub allocated: u64,
    pub held_ms: u64,
}

/// Builds the demo router around `service`.
#[allow(deprecated)]
pub fn router(service: Arc<dyn Service>, config: &AllocatorConfig) -> Router {
    let allocate_routes = service
        .middleware()
        .wrap(Router::new().route("/allocate", post(allocate)));

    let state = AppState {
        service,
        max_allocation_bytes: config.listener.max_allocation_bytes,
    };

    Router::new()
        .route("/stats", get(stats))
        .merge(allocate_routes)
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(TraceLayer::new_for_http())
}

async fn allocate(
    State(state): State<AppState>,
    Json(req): Json<AllocateRequest>,
) -> Result<Json<AllocateResponse>, (StatusCode, String)> {
    if req.size > state.max_allocation_bytes {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("allocation size exceeds {} bytes", state.max_allocation_bytes),
        ));
    }

    let size = usize::try_from(req.size)
        .map_err(|_| (StatusCode::BAD_REQUEST, "allocation size overflows usize".to_string()))?;

    let mut buffer = vec![0u8; size];
    // Random content keeps the pages resident.
    fastrand::fill(&mut buffer);

    tokio::time::sleep(Duration::from_millis(req.duration_ms)).await;
    drop(buffer);

    Ok(Json(AllocateResponse {
        allocated: req.size,
        held_ms: req.duration_ms,
    }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<MemLimiterStats>, (StatusCode, String)> {
    state.service.get_stats().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "Failed to collect stats");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}
