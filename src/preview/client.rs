use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use super::{Result, SessionError};
use crate::api::models::{ErrorResponse, GenerateBody, VariantRef};
use crate::generator::BatchReport;
use crate::generator::http::truncate_error_body;
use crate::manifest::{Manifest, MediaKind, Slot};

/// Request/response access to the staging endpoints
#[async_trait]
pub trait StagingClient: Send + Sync {
    async fn fetch_manifest(&self, kind: MediaKind) -> Result<Manifest>;

    async fn save_selection(&self, kind: MediaKind, variant: &VariantRef) -> Result<Slot>;

    async fn delete_variant(&self, kind: MediaKind, variant: &VariantRef) -> Result<Slot>;

    async fn regenerate(&self, kind: MediaKind, body: &GenerateBody) -> Result<BatchReport>;
}

/// [`StagingClient`] over HTTP
///
/// No overall request timeout: a generate call lasts as long as its batch.
#[derive(Debug, Clone)]
pub struct HttpStagingClient {
    client: Client,
    base_url: Url,
}

impl HttpStagingClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| SessionError::Transport(format!("invalid staging URL '{base_url}': {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, kind: MediaKind, action: Option<&str>) -> Result<Url> {
        let path = match action {
            Some(action) => format!("api/slots/{kind}/{action}"),
            None => format!("api/slots/{kind}"),
        };
        self.base_url
            .join(&path)
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Staging response");

        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorResponse>(&raw) {
                Ok(body) => SessionError::Rejected {
                    status: status.as_u16(),
                    code: body.code,
                    message: body.message,
                },
                Err(_) => SessionError::Rejected {
                    status: status.as_u16(),
                    code: "HTTP_ERROR".to_string(),
                    message: truncate_error_body(&raw),
                },
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SessionError::Decode(e.without_url().to_string()))
    }
}

#[async_trait]
impl StagingClient for HttpStagingClient {
    async fn fetch_manifest(&self, kind: MediaKind) -> Result<Manifest> {
        let url = self.endpoint(kind, None)?;
        self.send(self.client.get(url)).await
    }

    async fn save_selection(&self, kind: MediaKind, variant: &VariantRef) -> Result<Slot> {
        let url = self.endpoint(kind, Some("select"))?;
        self.send(self.client.post(url).json(variant)).await
    }

    async fn delete_variant(&self, kind: MediaKind, variant: &VariantRef) -> Result<Slot> {
        let url = self.endpoint(kind, Some("delete"))?;
        self.send(self.client.post(url).json(variant)).await
    }

    async fn regenerate(&self, kind: MediaKind, body: &GenerateBody) -> Result<BatchReport> {
        let url = self.endpoint(kind, Some("generate"))?;
        self.send(self.client.post(url).json(body)).await
    }
}
