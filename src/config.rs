//! Configuration loading and constants.
//!
//! Loads application configuration from an optional TOML file, then applies
//! environment variable overrides (`BOT_TOKEN`, `CHANNEL_ID`, `PORT`, ...), and
//! validates the result. Also defines the timeouts, limits and default paths
//! used across the service. `AppConfig` is the root configuration struct.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// HTTP Server Constants
// =============================================================================

/// Default listening port, matching the port the container image exposes
pub const DEFAULT_PORT: u16 = 10000;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default cap on concurrent in-flight HTTP requests
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

/// Per-request timeout applied to every HTTP route
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How long graceful shutdown waits for open connections to close
pub const HTTP_GRACEFUL_SHUTDOWN_SECS: u64 = 30;

/// Cache-Control value for all API responses
pub const CACHE_CONTROL_NO_STORE: &str = "no-store";

/// Service name reported by the home endpoint
pub const SERVICE_NAME: &str = "Telegram Unban Bot";

// =============================================================================
// Bot and Dispatch Constants
// =============================================================================

/// Default number of update-handling workers
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Capacity of the update dispatch queue shared by all workers
pub const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// Timeout for a single unbanChatMember call
pub const UNBAN_TIMEOUT_SECS: u64 = 15;

/// How long the webhook handler waits for an update to be processed before answering 202
pub const WEBHOOK_PROCESS_TIMEOUT_SECS: u64 = 10;

/// Timeout for manual setWebhook/deleteWebhook calls
pub const WEBHOOK_ADMIN_TIMEOUT_SECS: u64 = 5;

/// Time allowed for workers to drain on shutdown
pub const BOT_SHUTDOWN_DRAIN_SECS: u64 = 5;

/// Long-poll timeout passed to getUpdates
pub const POLL_TIMEOUT_SECS: u64 = 30;

/// Delay before retrying getUpdates after a transport failure
pub const POLL_RECONNECT_DELAY_SECS: u64 = 5;

/// Update kinds requested from Telegram
pub const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

/// Minimum length of a bare numeric message treated as a user ID
pub const MIN_BARE_USER_ID_LEN: usize = 5;

/// Number of token characters shown in the startup summary
pub const TOKEN_PREVIEW_LEN: usize = 10;

/// Telegram Bot API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Webhook path used when no bot token is configured
pub const FALLBACK_WEBHOOK_PATH: &str = "/webhook";

// =============================================================================
// Health Probe Constants
// =============================================================================
// Mirror the container HEALTHCHECK directive so `unbanbot healthcheck --watch`
// behaves like the runtime scheduler.

/// Seconds between probes
pub const HEALTHCHECK_INTERVAL_SECS: u64 = 30;

/// Seconds a single probe may take
pub const HEALTHCHECK_TIMEOUT_SECS: u64 = 10;

/// Startup grace period in seconds during which failures are not counted
pub const HEALTHCHECK_START_PERIOD_SECS: u64 = 30;

/// Consecutive failures needed to mark the service unhealthy
pub const HEALTHCHECK_RETRIES: u32 = 3;

/// Health endpoint path
pub const HEALTH_PATH: &str = "/health";

/// Default probe target
pub const DEFAULT_HEALTH_URL: &str = formatcp!("http://127.0.0.1:{}{}", DEFAULT_PORT, HEALTH_PATH);

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path (optional; skipped when absent)
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Upper bound accepted by setWebhook for max_connections
pub const MAX_WEBHOOK_CONNECTIONS: usize = 100;

/// Default log level, using the level names accepted by `LOG_LEVEL`
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Bot credentials and worker settings
    #[serde(default)]
    pub bot: BotConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Webhook registration
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Development mode: long polling instead of webhook, verbose defaults
    #[serde(default)]
    pub development: bool,
}

/// Bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot API token issued by BotFather
    #[serde(default)]
    pub token: String,
    /// Channel the bot unbans users from (0 means unset)
    #[serde(default)]
    pub channel_id: i64,
    /// Number of update-handling workers
    #[serde(default = "BotConfig::default_pool_size")]
    pub pool_size: usize,
    /// Bot API base URL (override for testing or a local Bot API server)
    #[serde(default = "BotConfig::default_api_base_url")]
    pub api_base_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel_id: 0,
            pool_size: Self::default_pool_size(),
            api_base_url: Self::default_api_base_url(),
        }
    }
}

impl BotConfig {
    fn default_pool_size() -> usize {
        DEFAULT_POOL_SIZE
    }

    fn default_api_base_url() -> String {
        TELEGRAM_API_BASE.to_string()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Maximum concurrent in-flight requests; also passed to setWebhook
    #[serde(default = "HttpServerConfig::default_max_connections")]
    pub max_connections: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            max_connections: Self::default_max_connections(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        DEFAULT_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_PORT
    }

    fn default_max_connections() -> usize {
        DEFAULT_MAX_CONNECTIONS
    }
}

/// Webhook configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Register the webhook with Telegram on startup
    #[serde(default)]
    pub enabled: bool,
    /// Public base URL; the webhook path is appended to it
    #[serde(default)]
    pub url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Level name: DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
    /// Optional file that receives a copy of all log output
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            format: Self::default_format(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        DEFAULT_LOG_LEVEL.to_string()
    }

    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    /// Map the configured level name to a tracing level. Unknown names fall back to info.
    pub fn tracing_level(&self) -> &'static str {
        match self.level.to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            _ => "info",
        }
    }

    /// Filter directive used when neither `--log-level` nor `RUST_LOG` is given.
    ///
    /// HTTP client internals are held at warn to keep per-request noise out of the log.
    pub fn filter_directive(&self) -> String {
        let level = self.tracing_level();
        format!("unbanbot={level},tower_http={level},reqwest=warn,hyper=warn")
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and the process environment.
    ///
    /// With `path == None` the default path is tried and silently skipped if it
    /// does not exist; an explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`AppConfig::load`] with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = match path {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => match std::fs::read_to_string(DEFAULT_CONFIG_PATH) {
                Ok(contents) => Some(contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            },
        };

        Self::from_sources(contents.as_deref(), env)
    }

    /// Build configuration from TOML contents and an environment lookup, then validate.
    pub fn from_sources<F>(toml_contents: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = match toml_contents {
            Some(contents) => toml::from_str(contents)?,
            None => AppConfig::default(),
        };

        config.apply_env(env)?;
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides on top of file values.
    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = non_empty(env("BOT_TOKEN")) {
            self.bot.token = token;
        }
        if let Some(channel) = non_empty(env("CHANNEL_ID")) {
            self.bot.channel_id = parse_env("CHANNEL_ID", &channel)?;
        }
        if let Some(pool_size) = non_empty(env("POOL_SIZE")) {
            self.bot.pool_size = parse_env("POOL_SIZE", &pool_size)?;
        }
        if let Some(base) = non_empty(env("TELEGRAM_API_BASE")) {
            self.bot.api_base_url = base;
        }
        if let Some(host) = non_empty(env("HOST")) {
            self.http.host = host;
        }
        if let Some(port) = non_empty(env("PORT")) {
            self.http.port = parse_env("PORT", &port)?;
        }
        if let Some(max) = non_empty(env("MAX_CONNECTIONS")) {
            self.http.max_connections = parse_env("MAX_CONNECTIONS", &max)?;
        }
        if let Some(url) = non_empty(env("WEBHOOK_URL")) {
            self.webhook.url = url;
        }
        if let Some(flag) = env("USE_WEBHOOK") {
            self.webhook.enabled = parse_flag(&flag);
        }
        if let Some(flag) = env("DEVELOPMENT") {
            self.development = parse_flag(&flag);
        }
        if let Some(level) = non_empty(env("LOG_LEVEL")) {
            self.logging.level = level;
        }
        if let Some(format) = non_empty(env("LOG_FORMAT")) {
            self.logging.format = format;
        }
        if let Some(file) = env("LOG_FILE") {
            self.logging.file = non_empty(Some(file));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.bot.token = self.bot.token.trim().to_string();
        self.webhook.url = self.webhook.url.trim().trim_end_matches('/').to_string();
        self.http.host = self.http.host.trim().to_string();
        self.logging.level = self.logging.level.trim().to_ascii_uppercase();
    }

    /// Collect every validation error rather than stopping at the first.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.bot.token.is_empty() {
            errors.push("BOT_TOKEN is required".to_string());
        } else if !is_bot_token(&self.bot.token) {
            errors.push("BOT_TOKEN must have the form <bot id>:<secret>".to_string());
        }

        if self.bot.channel_id == 0 {
            errors.push("CHANNEL_ID is required".to_string());
        }

        if self.bot.pool_size == 0 {
            errors.push("POOL_SIZE must be at least 1".to_string());
        }

        if !(1..=MAX_WEBHOOK_CONNECTIONS).contains(&self.http.max_connections) {
            errors.push(format!(
                "MAX_CONNECTIONS must be between 1 and {}",
                MAX_WEBHOOK_CONNECTIONS
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Path the webhook route is mounted on: `/{token}`.
    pub fn webhook_path(&self) -> String {
        if self.bot.token.is_empty() {
            FALLBACK_WEBHOOK_PATH.to_string()
        } else {
            format!("/{}", self.bot.token)
        }
    }

    /// Webhook path safe to show in responses and logs.
    pub fn redacted_webhook_path(&self) -> String {
        if self.bot.token.is_empty() {
            FALLBACK_WEBHOOK_PATH.to_string()
        } else {
            format!("/{}", self.redacted_token())
        }
    }

    /// Full URL registered with Telegram, if a public URL is configured.
    pub fn webhook_full_url(&self) -> Option<String> {
        if self.webhook.url.is_empty() {
            None
        } else {
            Some(format!("{}{}", self.webhook.url, self.webhook_path()))
        }
    }

    /// Webhook delivery is used only when enabled and a URL is set.
    pub fn webhook_active(&self) -> bool {
        self.webhook.enabled && !self.webhook.url.is_empty()
    }

    /// First characters of the token followed by an ellipsis.
    pub fn redacted_token(&self) -> String {
        let preview: String = self.bot.token.chars().take(TOKEN_PREVIEW_LEN).collect();
        format!("{}...", preview)
    }

    /// Mode as shown in the startup summary.
    pub fn mode_label(&self) -> &'static str {
        if self.development {
            "Development"
        } else {
            "Production"
        }
    }

    pub fn mode_name(&self) -> &'static str {
        if self.development {
            "development"
        } else {
            "production"
        }
    }
}

/// `<digits>:<secret>`, the secret limited to URL-safe characters.
fn is_bot_token(token: &str) -> bool {
    let Some((id, secret)) = token.split_once(':') else {
        return false;
    };
    !id.is_empty()
        && id.bytes().all(|b| b.is_ascii_digit())
        && !secret.is_empty()
        && secret
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
    #[error("Configuration errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}
