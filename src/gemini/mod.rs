// Gemini REST transport
// Shared by the embedding and generation clients


use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::GeminiConfig;

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

/// Text content as the REST API expects it in requests
#[derive(Debug, Serialize)]
pub(crate) struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
    pub parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Part<'a> {
    pub text: &'a str,
}

impl<'a> Content<'a> {
    pub(crate) fn text(text: &'a str) -> Self {
        Self {
            role: None,
            parts: vec![Part { text }],
        }
    }

    pub(crate) fn user(text: &'a str) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, rename = "inputTokenLimit")]
    pub input_token_limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: &str) -> Result<Self> {
        let mut base_url = config
            .api_url()
            .context("Failed to build Gemini URL from config")?;
        // Relative joins replace the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: config.retry_attempts.max(1),
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// URL of a model method such as `generateContent`
    #[inline]
    pub fn model_method_url(&self, model: &str, method: &str) -> Result<Url> {
        let model = model.trim_start_matches("models/");
        self.base_url
            .join(&format!("{API_VERSION}/models/{model}:{method}"))
            .with_context(|| format!("Failed to build URL for {model}:{method}"))
    }

    /// Fetch model metadata, used to verify the key and model name
    #[inline]
    pub fn get_model(&self, model: &str) -> Result<ModelInfo> {
        let model = model.trim_start_matches("models/");
        let url = self
            .base_url
            .join(&format!("{API_VERSION}/models/{model}"))
            .context("Failed to build model URL")?;

        debug!("Fetching model info from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .header(API_KEY_HEADER, &self.api_key)
                    .call()
            })
            .with_context(|| format!("Failed to fetch model {model}"))?;

        serde_json::from_str(&response_text).context("Failed to parse model response")
    }

    /// POST a JSON body and decode the JSON response
    #[inline]
    pub fn post_json<B, R>(&self, url: &Url, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header(API_KEY_HEADER, &self.api_key)
                .send(&request_json)
        })?;

        serde_json::from_str(&response_text).context("Failed to parse response")
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(mut response) => {
                    let status = response.status();
                    let body = response
                        .body_mut()
                        .read_to_string()
                        .context("Failed to read response body")?;

                    if status.is_success() {
                        debug!("Request succeeded on attempt {}", attempt);
                        return Ok(body);
                    }

                    let message = api_error_message(&body);
                    if status.is_server_error() {
                        warn!(
                            "Server error (status {}), attempt {}/{}",
                            status, attempt, self.retry_attempts
                        );
                        last_error = Some(anyhow::anyhow!(
                            "Server error: HTTP {}: {}",
                            status.as_u16(),
                            message
                        ));
                    } else {
                        warn!("Client error (status {}), not retrying", status);
                        return Err(anyhow::anyhow!(
                            "Client error: HTTP {}: {}",
                            status.as_u16(),
                            message
                        ));
                    }
                }
                Err(error) => {
                    let should_retry = matches!(
                        error,
                        ureq::Error::ConnectionFailed
                            | ureq::Error::HostNotFound
                            | ureq::Error::Timeout(_)
                            | ureq::Error::Io(_)
                    );

                    if !should_retry {
                        warn!("Non-retryable error: {}", error);
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(anyhow::anyhow!("Request error: {}", error));
                }
            }

            if attempt < self.retry_attempts {
                let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                let delay = Duration::from_millis(delay_ms);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Prefer the message from a Google API error envelope, fall back to the raw body
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{} ({})", envelope.error.message, status),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}
