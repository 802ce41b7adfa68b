//! Service facade, middleware and configuration loading end-to-end.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

use memlimiter::config::{load_config, load_memlimiter_config, ConfigError, MemLimiterConfig};
use memlimiter::controller::ControllerError;
use memlimiter::middleware::THROTTLED_MESSAGE;
use memlimiter::service::{new_service_from_config, Service, ServiceError, ServiceOptions};
use memlimiter::stats::{ChannelSubscription, ControlParameters, MemorySnapshot};

mod common;
use common::{controller_config, snapshot, terminator, RecordingOperator, MB};

fn limiter_config() -> MemLimiterConfig {
    MemLimiterConfig {
        controller_nextgc: Some(controller_config(Duration::from_millis(20))),
    }
}

/// The returned sender keeps the telemetry stream open.
fn service_with_operator(
    operator: Arc<RecordingOperator>,
) -> (Arc<dyn Service>, mpsc::Sender<MemorySnapshot>) {
    let (subscription, tx) = ChannelSubscription::new(1);
    let (terminator, _fatal_rx) = terminator();

    let service = new_service_from_config(
        Some(&limiter_config()),
        terminator,
        Arc::new(subscription),
        ServiceOptions::default().with_backpressure_operator(operator),
    )
    .unwrap();

    (service, tx)
}

fn app(service: &Arc<dyn Service>) -> Router {
    service
        .middleware()
        .wrap(Router::new().route("/work", get(|| async { "done" })))
}

#[tokio::test]
async fn test_throttled_http_request_gets_429() {
    let (operator, _rx) = RecordingOperator::new(false);
    let (service, _tx) = service_with_operator(operator);

    let req = Request::builder().uri("/work").body(Body::empty()).unwrap();
    let resp = app(&service).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], THROTTLED_MESSAGE.as_bytes());

    service.quit().await;
}

#[tokio::test]
async fn test_throttled_grpc_request_gets_resource_exhausted() {
    let (operator, _rx) = RecordingOperator::new(false);
    let (service, _tx) = service_with_operator(operator);

    let req = Request::builder()
        .uri("/work")
        .header(header::CONTENT_TYPE, "application/grpc")
        .body(Body::empty())
        .unwrap();
    let resp = app(&service).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["grpc-status"], "8");
    assert_eq!(resp.headers()["grpc-message"], THROTTLED_MESSAGE);

    service.quit().await;
}

#[tokio::test]
async fn test_admitted_request_reaches_handler() {
    let (operator, _rx) = RecordingOperator::new(true);
    let (service, _tx) = service_with_operator(operator);

    let req = Request::builder().uri("/work").body(Body::empty()).unwrap();
    let resp = app(&service).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"done");

    service.quit().await;
}

#[tokio::test]
async fn test_service_stats_aggregate_both_halves() {
    let (subscription, _tx) = ChannelSubscription::new(1);
    let (terminator, _fatal_rx) = terminator();

    let service = new_service_from_config(
        Some(&limiter_config()),
        terminator,
        Arc::new(subscription),
        ServiceOptions::default(),
    )
    .unwrap();

    let stats = service.get_stats().await.unwrap();
    assert_eq!(stats.controller.unwrap().memory_budget.rss_limit, 1000 * MB);
    let backpressure = stats.backpressure.unwrap();
    assert_eq!(backpressure.control_parameters, Some(ControlParameters::default()));
    assert_eq!(backpressure.throttling.total, 0);

    service.quit().await;
    assert!(service.get_stats().await.is_err());
}

#[tokio::test]
async fn test_stub_service_reports_rss() {
    let (subscription, tx) = ChannelSubscription::new(1);
    let (terminator, _fatal_rx) = terminator();

    let service = new_service_from_config(
        None,
        terminator,
        Arc::new(subscription),
        ServiceOptions::default(),
    )
    .unwrap();

    let stats = service.get_stats().await.unwrap();
    assert!(stats.controller.is_none());
    assert!(stats.backpressure.is_none());

    tx.send(snapshot(100 * MB, 123 * MB)).await.unwrap();

    let rss = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stats = service.get_stats().await.unwrap();
            if let Some(controller) = stats.controller {
                return controller.memory_budget.rss_actual;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(rss, 123 * MB);

    let req = Request::builder().uri("/work").body(Body::empty()).unwrap();
    let resp = app(&service).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    service.quit().await;
}

#[tokio::test]
async fn test_service_construction_errors() {
    let (terminator, _fatal_rx) = terminator();

    let (subscription, _tx) = ChannelSubscription::new(1);
    let err = new_service_from_config(
        Some(&MemLimiterConfig::default()),
        terminator.clone(),
        Arc::new(subscription),
        ServiceOptions::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ServiceError::Config(_)));

    let mut config = limiter_config();
    if let Some(controller) = config.controller_nextgc.as_mut() {
        controller.period = Duration::ZERO;
    }
    let (subscription, _tx) = ChannelSubscription::new(1);
    let err = new_service_from_config(
        Some(&config),
        terminator,
        Arc::new(subscription),
        ServiceOptions::default(),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        ServiceError::Controller(ControllerError::InvalidConfig(_))
    ));
}

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_toml_config() {
    let file = write_config(
        ".toml",
        r#"
        stats_period = "100ms"

        [listener]
        bind_address = "127.0.0.1:18080"

        [observability]
        log_level = "debug"
        metrics_enabled = false

        [memlimiter.controller_nextgc]
        rss_limit = "512MiB"
        danger_zone_gogc = 50
        danger_zone_throttling = 90
        period = "1s"

        [memlimiter.controller_nextgc.component_proportional]
        coefficient = 20.0
        window_size = 20
        "#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.stats_period, Duration::from_millis(100));
    assert_eq!(config.listener.bind_address, "127.0.0.1:18080");

    let controller = config.memlimiter.controller_nextgc.unwrap();
    assert_eq!(controller.rss_limit.as_u64(), 512 * 1024 * 1024);
    assert_eq!(controller.period, Duration::from_secs(1));
    assert_eq!(controller.component_proportional.coefficient, 20.0);
}

#[test]
fn test_load_json_memlimiter_config() {
    let file = write_config(
        ".json",
        r#"{
            "controller_nextgc": {
                "rss_limit": "1GB",
                "danger_zone_gogc": 50,
                "danger_zone_throttling": 90,
                "period": "250ms",
                "component_proportional": { "coefficient": 1.0 }
            }
        }"#,
    );

    let config = load_memlimiter_config(file.path()).unwrap();
    let controller = config.controller_nextgc.unwrap();
    assert_eq!(controller.rss_limit.as_u64(), 1_000_000_000);
    assert_eq!(controller.component_proportional.window_size, 0);
}

#[test]
fn test_load_config_reports_every_violation() {
    let file = write_config(
        ".toml",
        r#"
        [memlimiter.controller_nextgc]
        rss_limit = 0
        danger_zone_gogc = 150
        danger_zone_throttling = 90
        period = "1s"

        [memlimiter.controller_nextgc.component_proportional]
        coefficient = 0.0
        "#,
    );

    match load_config(file.path()) {
        Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 3),
        other => panic!("unexpected result: {other:?}"),
    }

    let missing = write_config(".toml", "");
    assert!(matches!(
        load_memlimiter_config(missing.path()),
        Err(ConfigError::Validation(_))
    ));
}
