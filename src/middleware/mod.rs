//! Request admission middleware.
//!
//! Consults [`Operator::allow_request`] before running the inner service.
//! Throttled callers always get an explicit resource exhaustion error:
//! HTTP 429 for plain HTTP, or `grpc-status: 8` (RESOURCE_EXHAUSTED) for gRPC.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    Router,
};

use crate::backpressure::Operator;
use crate::observability::metrics;

/// Message returned to throttled callers.
pub const THROTTLED_MESSAGE: &str = "request has been throttled";

const GRPC_CONTENT_TYPE: &str = "application/grpc";
const GRPC_STATUS_RESOURCE_EXHAUSTED: &str = "8";

/// Wraps routers with memory-aware admission control.
#[derive(Clone, Default)]
pub struct Middleware {
    operator: Option<Arc<dyn Operator>>,
}

impl Middleware {
    pub fn new(operator: Arc<dyn Operator>) -> Self {
        Self {
            operator: Some(operator),
        }
    }

    /// Middleware admitting every request.
    pub fn passthrough() -> Self {
        Self { operator: None }
    }

    pub fn wrap<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        match &self.operator {
            Some(operator) => router.layer(axum_middleware::from_fn_with_state(
                operator.clone(),
                throttle_middleware,
            )),
            None => router,
        }
    }
}

pub async fn throttle_middleware(
    State(operator): State<Arc<dyn Operator>>,
    req: Request,
    next: Next,
) -> Response {
    let allowed = operator.allow_request();
    metrics::record_admission(allowed);

    if allowed {
        return next.run(req).await;
    }

    tracing::debug!(method = %req.method(), uri = %req.uri(), "Request throttled");

    if is_grpc(&req) {
        return grpc_throttled();
    }

    (StatusCode::TOO_MANY_REQUESTS, THROTTLED_MESSAGE).into_response()
}

fn is_grpc(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(GRPC_CONTENT_TYPE))
}

fn grpc_throttled() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));
    headers.insert("grpc-status", HeaderValue::from_static(GRPC_STATUS_RESOURCE_EXHAUSTED));
    headers.insert("grpc-message", HeaderValue::from_static(THROTTLED_MESSAGE));
    response
}
