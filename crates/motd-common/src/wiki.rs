use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::retry::{self, RetryPolicy};

#[derive(Clone, Debug)]
pub struct WikiClientConfig {
    /// MediaWiki Action API endpoint (the api.php URL).
    pub api_url: String,
    /// Base URL for canonical article links, without a trailing slash.
    pub page_base: String,
    pub user_agent: String,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_error_body_bytes: usize,
}

impl WikiClientConfig {
    pub fn from_env() -> Self {
        let api_url = std::env::var("WIKI_API_URL")
            .unwrap_or_else(|_| "https://en.wikipedia.org/w/api.php".to_string());

        let page_base = std::env::var("WIKI_PAGE_BASE")
            .unwrap_or_else(|_| "https://en.wikipedia.org/wiki".to_string());

        let user_agent = std::env::var("WIKI_USER_AGENT")
            .unwrap_or_else(|_| "misconception-of-the-day/0.1".to_string());

        let default_timeout = std::env::var("WIKI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        let max_error_body_bytes = std::env::var("WIKI_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            api_url,
            page_base: page_base.trim_end_matches('/').to_string(),
            user_agent,
            default_timeout,
            retry: RetryPolicy::from_env("WIKI"),
            max_error_body_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("wiki API error: code={code} info={info}")]
    Api { code: String, info: String },

    #[error("wiki returned error: status={status} body={body}")]
    Status { status: StatusCode, body: String },

    #[error("parse response carried neither content nor an error")]
    EmptyEnvelope,
}

/// A rendered page as returned by `action=parse`: the section listing
/// plus the full body markup.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedPage {
    pub title: String,
    pub pageid: u64,
    #[serde(default)]
    pub sections: Vec<PageSection>,
    pub text: String,
}

/// One entry of the page's section listing. `level` is the heading
/// element level as a string ("2" for h2), `anchor` the fragment id.
#[derive(Debug, Clone, Deserialize)]
pub struct PageSection {
    pub toclevel: Option<u32>,
    pub level: String,
    pub line: String,
    pub anchor: String,
}

#[derive(Debug, Deserialize)]
struct ParseEnvelope {
    parse: Option<ParsedPage>,
    error: Option<ApiErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorObject {
    code: String,
    info: String,
}

#[derive(Clone)]
pub struct WikiClient {
    config: WikiClientConfig,
    http: reqwest::Client,
}

impl WikiClient {
    pub fn new(config: WikiClientConfig) -> Result<Self, WikiError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &WikiClientConfig {
        &self.config
    }

    /// Canonical article URL for a title, recorded on extracted entries.
    pub fn page_url(&self, title: &str) -> String {
        format!("{}/{}", self.config.page_base, title.replace(' ', "_"))
    }

    /// Fetches the rendered body markup and section listing for one page.
    /// Follows redirects server-side so the returned title is canonical.
    pub async fn fetch_page(&self, title: &str) -> Result<ParsedPage, WikiError> {
        let query = [
            ("action", "parse"),
            ("page", title),
            ("prop", "text|sections"),
            ("format", "json"),
            ("formatversion", "2"),
            ("redirects", "1"),
        ];
        self.request_with_retry(|| async {
            let resp = self
                .http
                .get(&self.config.api_url)
                .query(&query)
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            Self::parse_envelope(resp, self.config.max_error_body_bytes).await
        })
        .await
    }

    async fn parse_envelope(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<ParsedPage, WikiError> {
        let status = resp.status();
        if !status.is_success() {
            let body = retry::read_limited_text(resp, max_error_body_bytes).await;
            return Err(WikiError::Status { status, body });
        }
        let envelope = resp.json::<ParseEnvelope>().await?;
        if let Some(err) = envelope.error {
            return Err(WikiError::Api {
                code: err.code,
                info: err.info,
            });
        }
        envelope.parse.ok_or(WikiError::EmptyEnvelope)
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, WikiError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, WikiError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.retry.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = retry::backoff_delay(
                        self.config.retry.initial_backoff,
                        self.config.retry.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "wiki request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn should_retry(err: &WikiError) -> bool {
    match err {
        WikiError::Request(e) => retry::retryable_transport(e),
        WikiError::Status { status, .. } => retry::retryable_status(*status),
        WikiError::Api { .. } | WikiError::InvalidJson(_) | WikiError::EmptyEnvelope => false,
    }
}
