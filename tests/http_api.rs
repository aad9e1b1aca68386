//! Router-level tests for the HTTP API.
//!
//! Drives the full router (including middleware layers) with
//! `tower::ServiceExt::oneshot` against a `MockTelegram` backend.
//!
//! Run with: cargo test --test http_api
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use unbanbot::bot::Bot;
use unbanbot::config::AppConfig;
use unbanbot::routes::create_router;
use unbanbot::state::AppState;
use unbanbot::telegram::{MockCall, MockTelegram, SetWebhook, TelegramError};

const TOKEN: &str = "123456789:TEST-token";
const CHANNEL: i64 = -1001234567890;

fn config(extra: &[(&str, &str)]) -> Arc<AppConfig> {
    let channel = CHANNEL.to_string();
    let mut env: Vec<(&str, &str)> = vec![("BOT_TOKEN", TOKEN), ("CHANNEL_ID", channel.as_str())];
    env.extend_from_slice(extra);
    let config = AppConfig::from_sources(None, |key| {
        env.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .expect("valid test config");
    Arc::new(config)
}

struct TestApp {
    router: Router,
    bot: Bot,
}

impl TestApp {
    /// Build the router; `ready` runs bot startup first (no webhook, no polling).
    async fn new(mock: Arc<MockTelegram>, extra: &[(&str, &str)], ready: bool) -> Self {
        Self::with_timeout(mock, extra, ready, None).await
    }

    async fn with_timeout(
        mock: Arc<MockTelegram>,
        extra: &[(&str, &str)],
        ready: bool,
        webhook_timeout: Option<Duration>,
    ) -> Self {
        Self::with_state(mock, extra, ready, |state| match webhook_timeout {
            Some(timeout) => state.with_webhook_timeout(timeout),
            None => state,
        })
        .await
    }

    async fn with_state<F>(mock: Arc<MockTelegram>, extra: &[(&str, &str)], ready: bool, adjust: F) -> Self
    where
        F: FnOnce(AppState) -> AppState,
    {
        let config = config(extra);
        let bot = Bot::new(mock, config.clone());
        if ready {
            bot.startup().await.expect("bot startup");
        }
        let state = adjust(AppState::new(config, bot.clone()));
        Self {
            router: create_router(state),
            bot,
        }
    }

    async fn request(&self, method: Method, uri: &str, body: &str) -> (StatusCode, Value, axum::http::HeaderMap) {
        send(self.router.clone(), method, uri, body.to_string()).await
    }

    /// Start a POST in the background, for requests that must overlap.
    fn spawn_post(&self, uri: &str, body: String) -> JoinHandle<(StatusCode, Value, axum::http::HeaderMap)> {
        tokio::spawn(send(self.router.clone(), Method::POST, uri.to_string(), body))
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value, axum::http::HeaderMap) {
        self.request(Method::GET, uri, "").await
    }

    async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let (status, json, _) = self.request(Method::POST, uri, body).await;
        (status, json)
    }
}

async fn send(
    router: Router,
    method: Method,
    uri: impl AsRef<str>,
    body: String,
) -> (StatusCode, Value, axum::http::HeaderMap) {
    let request = Request::builder()
        .method(method)
        .uri(uri.as_ref())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json, headers)
}

fn webhook_path() -> String {
    format!("/{}", TOKEN)
}

fn private_text_update(text: &str) -> String {
    serde_json::json!({
        "update_id": 1000,
        "message": {
            "message_id": 1,
            "date": 1700000000,
            "from": {"id": 555, "is_bot": false, "first_name": "Ada"},
            "chat": {"id": 555, "type": "private"},
            "text": text
        }
    })
    .to_string()
}

// =============================================================================
// Health, home and info
// =============================================================================

#[tokio::test]
async fn test_health_is_ok_while_bot_starting() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], false).await;

    let (status, body, headers) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["bot"], "starting");
    assert!(body["uptime"].as_str().is_some());
    assert!(body["uptime_seconds"].as_i64().unwrap() >= 0);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_health_reports_ready_after_startup() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], true).await;

    let (status, body, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bot"], "ready");

    app.bot.shutdown().await;
    let (status, body, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bot"], "stopping");
}

#[tokio::test]
async fn test_home_redacts_webhook_path() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], false).await;

    let (status, body, _) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["service"], "Telegram Unban Bot");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["endpoints"]["health"], "/health");
    assert_eq!(body["endpoints"]["info"], "/info");
    assert_eq!(body["endpoints"]["webhook"], "/123456789:...");
    assert!(!body.to_string().contains("TEST-token"));
}

#[tokio::test]
async fn test_info_reports_configuration() {
    let app = TestApp::new(
        Arc::new(MockTelegram::new()),
        &[
            ("USE_WEBHOOK", "true"),
            ("WEBHOOK_URL", "https://bot.example.com"),
            ("POOL_SIZE", "8"),
            ("DEVELOPMENT", "true"),
        ],
        false,
    )
    .await;

    let (status, body, _) = app.get("/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_id"], CHANNEL);
    assert_eq!(body["webhook_enabled"], true);
    assert_eq!(body["webhook_url"], "https://bot.example.com");
    assert_eq!(body["pool_size"], 8);
    assert_eq!(body["max_connections"], 100);
    assert_eq!(body["mode"], "development");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], false).await;
    let (status, _, _) = app.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Webhook delivery
// =============================================================================

#[tokio::test]
async fn test_webhook_before_ready_is_503() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], false).await;

    let (status, body) = app.post(&webhook_path(), &private_text_update("/help")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Bot not initialized");
}

#[tokio::test]
async fn test_webhook_without_data_is_400() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], true).await;

    let (status, body) = app.post(&webhook_path(), "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No data");

    let (status, body) = app.post(&webhook_path(), "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No data");

    let (status, body) = app.post(&webhook_path(), r#"{"foo": 1}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid update");
}

#[tokio::test]
async fn test_webhook_processes_unban() {
    let mock = Arc::new(MockTelegram::new());
    let app = TestApp::new(mock.clone(), &[], true).await;

    let (status, body) = app
        .post(&webhook_path(), &private_text_update("987654321"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    assert_eq!(mock.unbans(), vec![(CHANNEL, 987654321)]);
    let sent = mock.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 555);
    assert!(sent[0].1.contains("Successfully Unbanned"));
}

#[tokio::test]
async fn test_webhook_reports_not_banned() {
    let mock = Arc::new(
        MockTelegram::new()
            .with_unban_error(54321, TelegramError::bad_request("Bad Request: user is not banned")),
    );
    let app = TestApp::new(mock.clone(), &[], true).await;

    let (status, _) = app
        .post(&webhook_path(), &private_text_update("/unban 54321"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.sent_messages()[0].1, "✅ User is not banned!");
}

#[tokio::test]
async fn test_slow_webhook_processing_is_202() {
    let mock = Arc::new(MockTelegram::new().with_unban_delay(11111111, Duration::from_secs(2)));
    let app = TestApp::with_timeout(mock, &[], true, Some(Duration::from_millis(50))).await;

    let (status, body) = app
        .post(&webhook_path(), &private_text_update("11111111"))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");
}

#[tokio::test]
async fn test_webhook_path_requires_token() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], true).await;

    let (status, _) = app.post("/123456789:wrong", &private_text_update("/help")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = app.get(&webhook_path()).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Concurrency cap and request timeout
// =============================================================================

#[tokio::test]
async fn test_health_answers_while_webhook_holds_every_permit() {
    let mock = Arc::new(MockTelegram::new().with_unban_delay(22222222, Duration::from_secs(2)));
    let app = TestApp::new(mock, &[("MAX_CONNECTIONS", "1")], true).await;

    let slow = app.spawn_post(&webhook_path(), private_text_update("22222222"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!slow.is_finished());

    let health = tokio::time::timeout(Duration::from_secs(1), app.get("/health"))
        .await
        .expect("/health must not wait for a webhook permit");
    assert_eq!(health.0, StatusCode::OK);
    assert_eq!(health.1["status"], "healthy");

    let (status, _, _) = app.get("/info").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = slow.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_beyond_limit_waits_for_permit() {
    let mock = Arc::new(MockTelegram::new().with_unban_delay(33333333, Duration::from_millis(400)));
    let app = TestApp::new(mock.clone(), &[("MAX_CONNECTIONS", "1")], true).await;

    let slow = app.spawn_post(&webhook_path(), private_text_update("33333333"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = app.spawn_post(&webhook_path(), private_text_update("/help"));

    // Workers are idle, so only the permit can hold the second delivery back
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!queued.is_finished());
    assert!(mock.sent_messages().is_empty());

    let (status, body, _) = queued.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, _, _) = slow.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.sent_messages().len(), 2);
}

#[tokio::test]
async fn test_request_exceeding_deadline_is_408() {
    let mock = Arc::new(MockTelegram::new().with_unban_delay(44444444, Duration::from_secs(2)));
    let app = TestApp::with_state(mock, &[], true, |state| {
        state
            .with_webhook_timeout(Duration::from_secs(5))
            .with_request_timeout(Duration::from_millis(50))
    })
    .await;

    let (status, _) = app
        .post(&webhook_path(), &private_text_update("44444444"))
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    let (status, _, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Webhook management
// =============================================================================

#[tokio::test]
async fn test_set_webhook_requires_url() {
    let app = TestApp::new(Arc::new(MockTelegram::new()), &[], false).await;

    let (status, body) = app.post("/webhook/set", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "WEBHOOK_URL not configured");
}

#[tokio::test]
async fn test_set_webhook_registers_full_url() {
    let mock = Arc::new(MockTelegram::new());
    let app = TestApp::new(mock.clone(), &[("WEBHOOK_URL", "https://bot.example.com/")], false).await;

    let (status, body) = app.post("/webhook/set", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["webhook_url"], format!("https://bot.example.com/{}", TOKEN));
    assert_eq!(
        mock.calls(),
        vec![MockCall::SetWebhook(SetWebhook::url_only(format!(
            "https://bot.example.com/{}",
            TOKEN
        )))]
    );
}

#[tokio::test]
async fn test_webhook_management_errors_are_500() {
    let mock = Arc::new(
        MockTelegram::new().with_webhook_error(TelegramError::Http("connection refused".into())),
    );
    let app = TestApp::new(mock, &[("WEBHOOK_URL", "https://bot.example.com")], false).await;

    let (status, body) = app.post("/webhook/set", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "HTTP error: connection refused");

    let (status, body) = app.post("/webhook/delete", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_delete_webhook() {
    let mock = Arc::new(MockTelegram::new());
    let app = TestApp::new(mock.clone(), &[], false).await;

    let (status, body) = app.post("/webhook/delete", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(mock.calls(), vec![MockCall::DeleteWebhook]);
}
