//! HTTP collaborator.
//!
//! The reconciler only needs `send(method, path, body) -> (status, bytes)`.
//! [`ReqwestClient`] is the bundled implementation against the Datadog API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::settings::EngineSettings;

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a single transport backoff (5 minutes).
const MAX_TRANSPORT_DELAY_SECS: u64 = 300;

/// Raw answer of a request. Non-2xx statuses are not errors at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the body as JSON. An empty body is `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations return `Err` only when no response was received.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<HttpResponse>;
}

/// Datadog API client with credential headers and transient-error retries.
pub struct ReqwestClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    app_key: SecretString,
    max_retries: u32,
    base_delay_secs: u64,
}

/// Creates an HTTP client with appropriate timeouts.
fn create_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| EngineError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

fn is_transient(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl ReqwestClient {
    pub fn new(settings: &EngineSettings, api_key: SecretString, app_key: SecretString) -> Result<Self> {
        Ok(Self {
            client: create_http_client()?,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            api_key,
            app_key,
            max_retries: settings.transport_max_retries,
            base_delay_secs: settings.transport_base_delay_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> std::result::Result<HttpResponse, reqwest::Error> {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header("DD-API-KEY", self.api_key.expose_secret())
            .header("DD-APPLICATION-KEY", self.app_key.expose_secret())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok(HttpResponse::new(status, bytes.to_vec()))
    }
}

impl std::fmt::Debug for ReqwestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    /// Retries 429, 5xx and network failures with exponential backoff.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<HttpResponse> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = transport_delay(self.base_delay_secs, attempt); // 2s, 4s, 8s
                log::info!(
                    "Retrying {} {} (attempt {}/{}) after {}s...",
                    method,
                    path,
                    attempt + 1,
                    self.max_retries.saturating_add(1),
                    delay
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }

            match self.send_once(&method, path, body).await {
                Ok(response) if is_transient(response.status) && attempt < self.max_retries => {
                    log::warn!("{} {} answered HTTP {}", method, path, response.status);
                    last_error = Some(EngineError::Transport {
                        kind: String::new(),
                        id: String::new(),
                        status: response.status,
                        message: String::from_utf8_lossy(&response.body).into_owned(),
                    });
                    continue;
                }
                Ok(response) => {
                    log::debug!("{} {} -> {}", method, path, response.status);
                    return Ok(response);
                }
                Err(e) => {
                    let error = EngineError::Transport {
                        kind: String::new(),
                        id: String::new(),
                        status: 0,
                        message: e.to_string(),
                    };
                    if attempt < self.max_retries {
                        log::warn!("{} {} failed with retryable error: {}", method, path, e);
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EngineError::Transport {
            kind: String::new(),
            id: String::new(),
            status: 0,
            message: "request failed after all retries".to_string(),
        }))
    }
}

/// Backoff before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
fn transport_delay(base_secs: u64, attempt: u32) -> u64 {
    1u64.checked_shl(attempt.saturating_sub(1))
        .and_then(|factor| base_secs.checked_mul(factor))
        .map_or(MAX_TRANSPORT_DELAY_SECS, |delay| delay.min(MAX_TRANSPORT_DELAY_SECS))
}
