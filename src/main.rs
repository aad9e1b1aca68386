//! unbanbot: Telegram unban bot service.
//!
//! This is the application entry point. It parses the command line, then
//! either runs the service (load configuration, initialize tracing, build the
//! Bot API client and router, start the HTTP server) or runs a health probe
//! against a running instance.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unbanbot::bot::Bot;
use unbanbot::config::{
    AppConfig, LoggingConfig, HEALTHCHECK_INTERVAL_SECS, HEALTHCHECK_RETRIES,
    HEALTHCHECK_START_PERIOD_SECS, HEALTHCHECK_TIMEOUT_SECS,
};
use unbanbot::http::start_server;
use unbanbot::probe::{self, HealthPolicy};
use unbanbot::routes::create_router;
use unbanbot::state::AppState;
use unbanbot::telegram::HttpTelegramClient;

/// unbanbot: Telegram bot that unbans users from a channel
#[derive(Parser, Debug)]
#[command(name = "unbanbot", version, about)]
struct Args {
    /// Path to configuration file (default: config/default.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "unbanbot=debug,tower_http=info")
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bot service (default)
    Serve,
    /// Probe the health endpoint; exits non-zero when unhealthy
    Healthcheck(HealthcheckArgs),
}

#[derive(ClapArgs, Debug)]
struct HealthcheckArgs {
    /// Health endpoint URL (default: http://127.0.0.1:$PORT/health)
    #[arg(long)]
    url: Option<String>,

    /// Seconds a single probe may take
    #[arg(long, default_value_t = HEALTHCHECK_TIMEOUT_SECS)]
    timeout: u64,

    /// Keep probing with the container runtime's retry rules
    #[arg(long)]
    watch: bool,

    /// Seconds between probes in watch mode
    #[arg(long, default_value_t = HEALTHCHECK_INTERVAL_SECS)]
    interval: u64,

    /// Startup grace period in seconds in watch mode
    #[arg(long, default_value_t = HEALTHCHECK_START_PERIOD_SECS)]
    start_period: u64,

    /// Consecutive failures before unhealthy in watch mode
    #[arg(long, default_value_t = HEALTHCHECK_RETRIES)]
    retries: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Some(Command::Healthcheck(check)) => {
            init_tracing(args.log_level, &LoggingConfig::default())?;
            run_healthcheck(check).await
        }
        Some(Command::Serve) | None => serve(args.config.as_deref(), args.log_level).await,
    }
}

async fn serve(
    config_path: Option<&Path>,
    log_level: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    init_tracing(log_level, &config.logging)?;

    let webhook = if config.webhook_active() {
        "Enabled"
    } else {
        "Disabled"
    };
    tracing::info!(
        token = %config.redacted_token(),
        channel_id = config.bot.channel_id,
        port = config.http.port,
        pool_size = config.bot.pool_size,
        mode = config.mode_label(),
        webhook,
        "Configuration validated"
    );

    let config = Arc::new(config);
    let api = Arc::new(HttpTelegramClient::new(&config.bot.api_base_url, &config.bot.token)?);
    let bot = Bot::new(api, config.clone());

    let state = AppState::new(config.clone(), bot.clone());
    let app = create_router(state);

    start_server(app, &config, bot).await?;

    Ok(())
}

async fn run_healthcheck(check: HealthcheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let url = check.url.unwrap_or_else(|| {
        let port = std::env::var("PORT").ok().and_then(|p| p.trim().parse().ok());
        probe::default_health_url(port)
    });
    let client = probe::build_client()?;

    if check.watch {
        let policy = HealthPolicy {
            interval: Duration::from_secs(check.interval),
            timeout: Duration::from_secs(check.timeout),
            start_period: Duration::from_secs(check.start_period),
            retries: check.retries,
        };
        tracing::info!(%url, ?policy, "Watching health endpoint");
        return Err(probe::watch(&client, &url, policy).await.into());
    }

    probe::probe(&client, &url, Duration::from_secs(check.timeout)).await?;
    tracing::info!(%url, "Healthy");
    Ok(())
}

/// Initialize tracing with priority: CLI > env > configured level.
///
/// Output goes to stdout; when a log file is configured, a second layer
/// appends the same events to it without ANSI colors.
fn init_tracing(
    cli_filter: Option<String>,
    logging: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_filter = cli_filter
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| logging.filter_directive());

    let log_file = match &logging.file {
        Some(path) => Some(open_log_file(Path::new(path))?),
        None => None,
    };

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));

    if logging.is_json() {
        let file_layer = log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(file)
        });
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .with(file_layer)
            .init();
    } else {
        let file_layer = log_file.map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file)
        });
        registry
            .with(tracing_subscriber::fmt::layer())
            .with(file_layer)
            .init();
    }

    Ok(())
}

/// Open the log file for appending, creating its directory if needed.
fn open_log_file(path: &Path) -> std::io::Result<Mutex<std::fs::File>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(file))
}
