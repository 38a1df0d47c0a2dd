//! HTTP fetching with a per-attempt timeout and a bounded number of attempts.
//!
//! Every failure is folded into a [`FetchOutcome::Failed`] value carrying the
//! last recorded reason (`"timeout"`, `"status 503"`, `"network: ..."`), so no
//! error escapes this layer and one bad source cannot abort a run.
//!
//! # Retry Strategy
//!
//! By default attempts follow each other immediately. A [`Backoff`] may be
//! configured, in which case the delay between attempts is:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use rand::{Rng, rng};
use reqwest::Client;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

/// Why a fetch ultimately failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// An attempt exceeded its timeout and was aborted.
    Timeout,
    /// The server answered with a non-2xx status.
    Status(u16),
    /// Connection, TLS or body-read failure.
    Network(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => f.write_str("timeout"),
            FetchFailure::Status(code) => write!(f, "status {code}"),
            FetchFailure::Network(msg) => write!(f, "network: {msg}"),
        }
    }
}

/// Result of [`fetch_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Ok { status: u16, body: String },
    Failed { reason: FetchFailure },
}

/// Exponential delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failed attempt (doubles with each attempt).
    pub base_delay: Duration,
    /// Cap before jitter is added.
    pub max_delay: Duration,
}

impl Backoff {
    /// Delay to wait after the given 1-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// How many times to try a URL and how long each try may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    /// `None` retries immediately.
    pub backoff: Option<Backoff>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(10),
            backoff: None,
        }
    }
}

/// Anything that can turn a URL into a [`FetchOutcome`].
///
/// The collection driver only depends on this trait so tests can substitute
/// canned responses for the network.
pub trait Fetch {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// [`Fetch`] implementation backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, policy })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        fetch_with_retry(&self.client, url, &self.policy).await
    }
}

/// Issue a GET for `url`, retrying up to `policy.max_attempts` times.
///
/// Each attempt runs under its own timer; when it fires the in-flight request
/// is dropped and the attempt records `"timeout"`. Non-2xx responses record
/// `"status <code>"`.
///
/// # Arguments
///
/// * `client` - Shared HTTP client (carries the User-Agent)
/// * `url` - Feed or page to fetch
/// * `policy` - Attempt count, per-attempt timeout and optional backoff; a
///   `max_attempts` of zero is treated as one
///
/// # Returns
///
/// [`FetchOutcome::Ok`] with the body of the first 2xx response, otherwise
/// [`FetchOutcome::Failed`] with the reason recorded by the last attempt.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_with_retry(client: &Client, url: &str, policy: &RetryPolicy) -> FetchOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let total_t0 = Instant::now();
    let mut last = FetchFailure::Timeout;

    for attempt in 1..=max_attempts {
        let attempt_t0 = Instant::now();
        match timeout(policy.timeout, attempt_once(client, url)).await {
            Ok(Ok((status, body))) => {
                debug!(
                    attempt,
                    status,
                    bytes = body.len(),
                    elapsed_ms = attempt_t0.elapsed().as_millis() as u64,
                    "Fetched"
                );
                return FetchOutcome::Ok { status, body };
            }
            Ok(Err(reason)) => last = reason,
            Err(_) => last = FetchFailure::Timeout,
        }

        warn!(
            attempt,
            max = max_attempts,
            elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
            reason = %last,
            "Fetch attempt failed"
        );

        if attempt < max_attempts {
            if let Some(backoff) = policy.backoff {
                let delay = backoff.delay_for(attempt);
                debug!(?delay, "Backing off before next attempt");
                sleep(delay).await;
            }
        }
    }

    FetchOutcome::Failed { reason: last }
}

async fn attempt_once(client: &Client, url: &str) -> Result<(u16, String), FetchFailure> {
    let resp = client.get(url).send().await.map_err(classify)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchFailure::Status(status.as_u16()));
    }
    let body = resp.text().await.map_err(classify)?;
    Ok((status.as_u16(), body))
}

fn classify(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Network(e.to_string())
    }
}
