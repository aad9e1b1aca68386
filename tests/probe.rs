//! Health probe tests against real listeners.
//!
//! Each test binds an ephemeral port on 127.0.0.1 and serves either the real
//! router or a stub health route, then probes it over TCP.
//!
//! Run with: cargo test --test probe
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;

use unbanbot::bot::Bot;
use unbanbot::config::AppConfig;
use unbanbot::probe::{self, HealthPolicy, ProbeError};
use unbanbot::routes::create_router;
use unbanbot::state::AppState;
use unbanbot::telegram::MockTelegram;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn health_url(addr: SocketAddr) -> String {
    format!("http://{}/health", addr)
}

fn app() -> Router {
    let config = Arc::new(
        AppConfig::from_sources(None, |key| match key {
            "BOT_TOKEN" => Some("123456789:probe".to_string()),
            "CHANNEL_ID" => Some("-100".to_string()),
            _ => None,
        })
        .unwrap(),
    );
    let bot = Bot::new(Arc::new(MockTelegram::new()), config.clone());
    create_router(AppState::new(config, bot))
}

fn fast_policy() -> HealthPolicy {
    HealthPolicy {
        interval: Duration::from_millis(10),
        timeout: Duration::from_millis(200),
        start_period: Duration::ZERO,
        retries: 3,
    }
}

#[tokio::test]
async fn test_probe_healthy_service() {
    let addr = serve(app()).await;
    let client = probe::build_client().unwrap();

    probe::probe(&client, &health_url(addr), Duration::from_secs(3))
        .await
        .expect("service should be healthy while the bot is still starting");
}

#[tokio::test]
async fn test_probe_non_200_is_unhealthy() {
    let stub = Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let addr = serve(stub).await;
    let client = probe::build_client().unwrap();

    let err = probe::probe(&client, &health_url(addr), Duration::from_secs(3))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Status(503)));
}

#[tokio::test]
async fn test_probe_connection_refused() {
    // Bind and drop to find a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = probe::build_client().unwrap();
    let err = probe::probe(&client, &health_url(addr), Duration::from_secs(3))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Request(_)));
}

#[tokio::test]
async fn test_probe_timeout() {
    let stub = Router::new().route(
        "/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let addr = serve(stub).await;
    let client = probe::build_client().unwrap();

    let err = probe::probe(&client, &health_url(addr), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Timeout(_)));
}

#[tokio::test]
async fn test_watch_reports_unhealthy_after_retries() {
    let stub = Router::new().route("/health", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let addr = serve(stub).await;
    let client = probe::build_client().unwrap();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        probe::watch(&client, &health_url(addr), fast_policy()),
    )
    .await
    .expect("watch should give up after three failures");
    assert!(matches!(err, ProbeError::Unhealthy(3)));
}
