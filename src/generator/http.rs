//! HTTP transport for the generation API

use super::{GenerationError, Result};
use crate::config::ApiConfig;
use crate::humanize::ByteSize;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ERROR_BODY_CHARS: usize = 512;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub max_download_bytes: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            max_retries: 3,
            max_download_bytes: 200 * 1024 * 1024,
            user_agent: concat!("mediaslots/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn from_api(api: &ApiConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(api.connect_timeout_secs),
            request_timeout: Duration::from_secs(api.request_timeout_secs),
            max_retries: api.download_retries.max(1),
            max_download_bytes: api.max_download_bytes.as_u64(),
            ..Self::default()
        }
    }
}

/// JSON client that authenticates every request with the API key header
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig, api_key: &str) -> Result<Self> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| GenerationError::InvalidRequest("API key is not a valid header value".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(url, "POST");
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode_json(check_status(response).await?).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        decode_json(check_status(response).await?).await
    }

    /// Download a media artifact, retrying transient failures
    pub async fn download(&self, url: &str) -> Result<Bytes> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.download_once(url).await {
                Ok(bytes) => {
                    if attempts > 1 {
                        debug!(attempts, "Download succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempts < self.config.max_retries => {
                    warn!(attempts, error = %e, "Download failed, retrying");

                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(2u64.pow(attempts - 1));
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    warn!(attempts, error = %e, "Download failed");
                    return Err(e);
                }
            }
        }
    }

    async fn download_once(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let response = check_status(response).await?;

        let limit = self.config.max_download_bytes;
        if let Some(length) = response.content_length() {
            ensure_within_limit(length, limit)?;
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Transport(format!("Failed to read body: {e}")))?;
        ensure_within_limit(bytes.len() as u64, limit)?;

        debug!(size = %ByteSize(bytes.len() as u64), "Download completed");
        Ok(bytes)
    }
}

fn ensure_within_limit(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(GenerationError::DownloadTooLarge {
            size: ByteSize(size),
            limit: ByteSize(limit),
        });
    }
    Ok(())
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Transport("request timed out".to_string())
    } else {
        // Strip the URL, media URIs carry the API key as a query parameter
        GenerationError::Transport(e.without_url().to_string())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::HttpStatus {
        status: status.as_u16(),
        body: truncate_error_body(&body),
    })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| GenerationError::Transport(format!("Failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}

pub(crate) fn truncate_error_body(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let truncated = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_from_api() {
        let mut api = ApiConfig::default();
        api.request_timeout_secs = 45;
        api.download_retries = 0;

        let config = HttpConfig::from_api(&api);
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.max_download_bytes, 200 * 1024 * 1024);
        assert!(config.user_agent.starts_with("mediaslots/"));
    }

    #[test]
    fn test_truncate_error_body() {
        assert_eq!(truncate_error_body("   "), "<empty>");
        assert_eq!(truncate_error_body(" quota exceeded \n"), "quota exceeded");

        let long = "x".repeat(MAX_ERROR_BODY_CHARS + 10);
        let truncated = truncate_error_body(&long);
        assert_eq!(truncated.len(), MAX_ERROR_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_download_limit() {
        assert!(ensure_within_limit(10, 10).is_ok());
        assert!(matches!(
            ensure_within_limit(11, 10),
            Err(GenerationError::DownloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = HttpClient::new(HttpConfig::default(), "bad\nkey");
        assert!(matches!(result, Err(GenerationError::InvalidRequest(_))));
    }
}
