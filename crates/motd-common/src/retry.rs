use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use tracing::warn;

/// Retry and backoff knobs shared by the HTTP clients in this crate.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Reads `<PREFIX>_MAX_RETRIES`, `<PREFIX>_RETRY_INITIAL_MS` and
    /// `<PREFIX>_RETRY_MAX_MS` from the environment, with defaults of
    /// 3 retries, 200ms initial and 5s cap.
    pub fn from_env(prefix: &str) -> Self {
        let max_retries = std::env::var(format!("{prefix}_MAX_RETRIES"))
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(3);

        let initial_backoff = std::env::var(format!("{prefix}_RETRY_INITIAL_MS"))
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var(format!("{prefix}_RETRY_MAX_MS"))
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }
}

/// True for transport-level failures worth another attempt.
pub fn retryable_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() || err.is_decode()
}

/// True for HTTP statuses worth another attempt (429 and 5xx).
pub fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff with a cap and additive jitter.
pub fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

/// Reads at most `max_bytes` of an error body for diagnostics.
pub async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}
