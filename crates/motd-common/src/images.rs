use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::retry::{self, RetryPolicy};

#[derive(Clone, Debug)]
pub struct ImageClientConfig {
    /// OpenAI-compatible API base, e.g. "https://api.openai.com/v1".
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub size: String,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_error_body_bytes: usize,
}

impl ImageClientConfig {
    /// `IMAGE_API_URL` is required; the remaining knobs have defaults.
    ///
    /// Optional: `IMAGE_API_KEY`, `IMAGE_MODEL`, `IMAGE_SIZE`,
    /// `IMAGE_TIMEOUT_SECS`, `IMAGE_MAX_RETRIES`, `IMAGE_RETRY_INITIAL_MS`,
    /// `IMAGE_RETRY_MAX_MS`, `IMAGE_MAX_ERROR_BODY_BYTES`.
    pub fn from_env() -> Result<Self, ImageError> {
        let base_url = std::env::var("IMAGE_API_URL").map_err(|_| {
            ImageError::Config("IMAGE_API_URL environment variable is required".to_string())
        })?;

        let api_key = std::env::var("IMAGE_API_KEY").ok();

        let model =
            std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string());

        let size = std::env::var("IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".to_string());

        let default_timeout = std::env::var("IMAGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(120));

        let max_error_body_bytes = std::env::var("IMAGE_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            size,
            default_timeout,
            retry: RetryPolicy::from_env("IMAGE"),
            max_error_body_bytes,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },

    #[error("image response contained no data")]
    EmptyResponse,

    #[error("image response carried no download URL")]
    MissingUrl,

    #[error("config error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorEnvelope {
    error: UpstreamErrorObject,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorObject {
    message: Option<String>,
    #[allow(dead_code)]
    r#type: Option<String>,
    #[allow(dead_code)]
    code: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct ImageClient {
    config: ImageClientConfig,
    http: reqwest::Client,
}

impl ImageClient {
    pub fn new(config: ImageClientConfig) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .user_agent("misconception-of-the-day/0.1")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ImageClientConfig {
        &self.config
    }

    /// Generates one image for the prompt and returns the PNG bytes.
    ///
    /// The endpoint is asked for a download URL rather than an inline
    /// payload; the URL is fetched in a second request.
    pub async fn generate_png(&self, prompt: &str) -> Result<Vec<u8>, ImageError> {
        let url = format!("{}/images/generations", self.config.base_url);
        let response: ImageGenerationResponse = self
            .request_with_retry(|| async {
                let request = ImageGenerationRequest {
                    model: &self.config.model,
                    prompt,
                    n: 1,
                    size: &self.config.size,
                    response_format: "url",
                };
                let mut builder = self
                    .http
                    .post(&url)
                    .timeout(self.config.default_timeout)
                    .json(&request);
                if let Some(key) = &self.config.api_key {
                    builder = builder.bearer_auth(key);
                }
                let resp = builder.send().await?;
                Self::parse_json_response(resp, self.config.max_error_body_bytes).await
            })
            .await?;

        let datum = response
            .data
            .into_iter()
            .next()
            .ok_or(ImageError::EmptyResponse)?;
        let image_url = datum.url.ok_or(ImageError::MissingUrl)?;
        self.download(&image_url).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        self.request_with_retry(|| async {
            let resp = self
                .http
                .get(url)
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = retry::read_limited_text(resp, self.config.max_error_body_bytes).await;
                return Err(ImageError::UpstreamBody { status, body });
            }
            Ok(resp.bytes().await?.to_vec())
        })
        .await
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, ImageError> {
        if resp.status().is_success() {
            let json = resp.json::<T>().await?;
            return Ok(json);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> ImageError {
        let status = resp.status();
        let body = retry::read_limited_text(resp, max_error_body_bytes).await;
        if let Ok(parsed) = serde_json::from_str::<UpstreamErrorEnvelope>(&body) {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "unknown upstream error".to_string());
            return ImageError::Upstream { status, message };
        }
        ImageError::UpstreamBody { status, body }
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, ImageError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ImageError>>,
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
                        "image request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn should_retry(err: &ImageError) -> bool {
    match err {
        ImageError::Request(e) => retry::retryable_transport(e),
        ImageError::Upstream { status, .. } | ImageError::UpstreamBody { status, .. } => {
            retry::retryable_status(*status)
        }
        ImageError::InvalidJson(_)
        | ImageError::EmptyResponse
        | ImageError::MissingUrl
        | ImageError::Config(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generation_response() {
        let raw = r#"{"created": 1719000000, "data": [{"url": "https://cdn.example/img.png"}]}"#;
        let resp: ImageGenerationResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0].url.as_deref(), Some("https://cdn.example/img.png"));
    }

    #[test]
    fn parses_upstream_error_envelope() {
        let raw = r#"{"error": {"message": "billing hard limit reached", "type": "invalid_request_error", "code": null}}"#;
        let envelope: UpstreamErrorEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(
            envelope.error.message.as_deref(),
            Some("billing hard limit reached")
        );
    }

    #[test]
    fn request_serializes_url_format() {
        let request = ImageGenerationRequest {
            model: "dall-e-3",
            prompt: "a teapot",
            n: 1,
            size: "1024x1024",
            response_format: "url",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"], "url");
        assert_eq!(json["n"], 1);
    }
}
