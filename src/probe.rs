//! Health probe client for the container HEALTHCHECK.
//!
//! `unbanbot healthcheck` replaces `curl -f` in the image: one GET against
//! the health endpoint, exit status 0 on HTTP 200 within the timeout and 1
//! otherwise. `--watch` keeps probing and applies the same interval, start
//! period and retry rules as the container runtime via [`HealthTracker`].

use std::time::{Duration, Instant};

use crate::config::{
    DEFAULT_HEALTH_URL, DEFAULT_PORT, HEALTHCHECK_INTERVAL_SECS, HEALTHCHECK_RETRIES, HEALTHCHECK_START_PERIOD_SECS,
    HEALTHCHECK_TIMEOUT_SECS, HEALTH_PATH,
};

/// Error type for a failed probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Health check timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Health check request failed: {0}")]
    Request(String),

    #[error("Health check returned HTTP {0}")]
    Status(u16),

    #[error("Service became unhealthy after {0} consecutive failures")]
    Unhealthy(u32),
}

/// Probe scheduling rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub start_period: Duration,
    pub retries: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(HEALTHCHECK_INTERVAL_SECS),
            timeout: Duration::from_secs(HEALTHCHECK_TIMEOUT_SECS),
            start_period: Duration::from_secs(HEALTHCHECK_START_PERIOD_SECS),
            retries: HEALTHCHECK_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

/// Health state machine driven by probe outcomes.
///
/// Failures inside the start period are not counted while the service has
/// never been healthy. After that, `retries` consecutive failures mark it
/// unhealthy and any success resets the streak.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    policy: HealthPolicy,
    state: HealthState,
    failing_streak: u32,
}

impl HealthTracker {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            policy,
            state: HealthState::Starting,
            failing_streak: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn failing_streak(&self) -> u32 {
        self.failing_streak
    }

    /// Record one probe outcome, `since_start` measured from container start.
    pub fn record(&mut self, healthy: bool, since_start: Duration) -> HealthState {
        if healthy {
            self.failing_streak = 0;
            self.state = HealthState::Healthy;
        } else if self.state == HealthState::Starting && since_start < self.policy.start_period {
            // grace period
        } else {
            self.failing_streak += 1;
            if self.failing_streak >= self.policy.retries {
                self.state = HealthState::Unhealthy;
            }
        }
        self.state
    }
}

/// `http://127.0.0.1:{port}/health`
pub fn default_health_url(port: Option<u16>) -> String {
    match port {
        Some(port) if port != DEFAULT_PORT => format!("http://127.0.0.1:{}{}", port, HEALTH_PATH),
        _ => DEFAULT_HEALTH_URL.to_string(),
    }
}

pub fn build_client() -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| ProbeError::Client(e.to_string()))
}

/// Run a single probe. Only HTTP 200 counts as healthy.
pub async fn probe(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<(), ProbeError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Request(e.to_string())
            }
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::OK {
        Ok(())
    } else {
        Err(ProbeError::Status(status.as_u16()))
    }
}

/// Probe repeatedly until the service becomes unhealthy.
pub async fn watch(client: &reqwest::Client, url: &str, policy: HealthPolicy) -> ProbeError {
    let started = Instant::now();
    let mut tracker = HealthTracker::new(policy);

    loop {
        let outcome = probe(client, url, policy.timeout).await;
        let previous = tracker.state();
        let state = tracker.record(outcome.is_ok(), started.elapsed());

        if let Err(e) = &outcome {
            tracing::warn!(
                error = %e,
                state = state.as_str(),
                failing_streak = tracker.failing_streak(),
                "Health probe failed"
            );
        }
        if state != previous {
            tracing::info!(from = previous.as_str(), to = state.as_str(), "Health state changed");
        }
        if state == HealthState::Unhealthy {
            return ProbeError::Unhealthy(tracker.failing_streak());
        }

        tokio::time::sleep(policy.interval).await;
    }
}
