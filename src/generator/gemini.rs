//! Gemini / Veo implementation of [`MediaBackend`]
//!
//! - Images: `POST {base}/models/{model}:generateContent`, inline base64 data
//!   in `candidates[0].content.parts[].inlineData`.
//! - Videos: `POST {base}/models/{model}:predictLongRunning` returns an
//!   operation `name`; `GET {base}/{name}` reports `done`, `error` or
//!   `response.generateVideoResponse.generatedSamples[0].video.uri`.

use super::backend::{
    GeneratedImage, ImageRequest, MediaBackend, OperationHandle, OperationStatus, VideoRequest,
};
use super::http::{HttpClient, HttpConfig};
use super::{GenerationError, Result};
use crate::config::ApiConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub struct GeminiBackend {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let api_key = api
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(GenerationError::MissingCredential)?;
        let http = HttpClient::new(HttpConfig::from_api(api), &api_key)?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }
}

#[async_trait]
impl MediaBackend for GeminiBackend {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let body = image_request_body(request);
        let response: GenerateContentResponse = self
            .http
            .post_json(&self.model_url(&request.model, "generateContent"), &body)
            .await?;
        extract_inline_image(response)
    }

    async fn submit_video(&self, request: &VideoRequest) -> Result<OperationHandle> {
        let body = json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": {
                "aspectRatio": request.aspect.as_str(),
                "durationSeconds": request.duration.get(),
            },
        });

        let operation: Operation = self
            .http
            .post_json(&self.model_url(&request.model, "predictLongRunning"), &body)
            .await?;
        if operation.name.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "operation response without a name".to_string(),
            ));
        }

        debug!(operation = %operation.name, "Video operation submitted");
        Ok(OperationHandle {
            name: operation.name,
        })
    }

    async fn poll_video(&self, operation: &OperationHandle) -> Result<OperationStatus> {
        let url = format!("{}/{}", self.base_url, operation.name);
        let state: Operation = self.http.get_json(&url).await?;
        operation_status(state)
    }

    async fn download(&self, media_uri: &str) -> Result<Bytes> {
        self.http.download(&with_api_key(media_uri, &self.api_key)).await
    }
}

fn image_request_body(request: &ImageRequest) -> serde_json::Value {
    // The image endpoint has no aspect parameter; it is requested in the prompt
    let text = format!("{}\n\n{}", request.prompt, request.aspect.prompt_hint());
    json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] },
    })
}

/// Media URIs are fetched with the key as a query parameter
pub fn with_api_key(uri: &str, api_key: &str) -> String {
    if uri.contains("key=") {
        return uri.to_string();
    }
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}key={api_key}")
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn extract_inline_image(response: GenerateContentResponse) -> Result<GeneratedImage> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(GenerationError::MissingMedia("candidates"))?;

    let inline = candidate
        .content
        .into_iter()
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .ok_or(GenerationError::MissingMedia("inline image data"))?;

    let bytes = BASE64_STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| GenerationError::MalformedResponse(format!("invalid base64 image: {e}")))?;
    if bytes.is_empty() {
        return Err(GenerationError::MissingMedia("inline image data"));
    }

    Ok(GeneratedImage {
        bytes: Bytes::from(bytes),
        mime_type: inline.mime_type,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

fn operation_status(operation: Operation) -> Result<OperationStatus> {
    if !operation.done {
        return Ok(OperationStatus::Pending);
    }

    if let Some(error) = operation.error {
        return Ok(OperationStatus::Failed(format!(
            "{} (code {})",
            error.message, error.code
        )));
    }

    let media_uri = operation
        .response
        .and_then(|r| r.generate_video_response)
        .and_then(|r| r.generated_samples.into_iter().next())
        .and_then(|sample| sample.video)
        .and_then(|video| video.uri)
        .filter(|uri| !uri.is_empty())
        .ok_or(GenerationError::MissingMedia("generated video sample"))?;

    Ok(OperationStatus::Completed { media_uri })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::AspectRatio;

    fn parse<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_image_request_body_carries_aspect_hint() {
        let request = ImageRequest {
            model: "gemini-2.5-flash-image".to_string(),
            prompt: "Abstract gradient mesh".to_string(),
            aspect: AspectRatio::Square,
        };

        let body = image_request_body(&request);
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Abstract gradient mesh"));
        assert!(text.contains("1:1"));
        assert_eq!(body["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn test_extract_inline_image() {
        let response: GenerateContentResponse = parse(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64_STANDARD.encode(b"png-bytes") } }
                    ]
                }
            }]
        }));

        let image = extract_inline_image(response).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(&image.bytes[..], b"png-bytes");
    }

    #[test]
    fn test_extract_without_candidates() {
        let response: GenerateContentResponse = parse(json!({ "candidates": [] }));
        assert!(matches!(
            extract_inline_image(response),
            Err(GenerationError::MissingMedia("candidates"))
        ));
    }

    #[test]
    fn test_extract_text_only_response() {
        let response: GenerateContentResponse = parse(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        }));
        assert!(matches!(
            extract_inline_image(response),
            Err(GenerationError::MissingMedia("inline image data"))
        ));
    }

    #[test]
    fn test_operation_pending() {
        let operation: Operation = parse(json!({ "name": "models/veo/operations/1" }));
        assert_eq!(operation_status(operation).unwrap(), OperationStatus::Pending);
    }

    #[test]
    fn test_operation_failed() {
        let operation: Operation = parse(json!({
            "name": "models/veo/operations/1",
            "done": true,
            "error": { "code": 3, "message": "prompt rejected" }
        }));
        assert_eq!(
            operation_status(operation).unwrap(),
            OperationStatus::Failed("prompt rejected (code 3)".to_string())
        );
    }

    #[test]
    fn test_operation_completed() {
        let operation: Operation = parse(json!({
            "name": "models/veo/operations/1",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": "https://files.example/v1/abc:download?alt=media" } }]
                }
            }
        }));
        assert_eq!(
            operation_status(operation).unwrap(),
            OperationStatus::Completed {
                media_uri: "https://files.example/v1/abc:download?alt=media".to_string()
            }
        );
    }

    #[test]
    fn test_operation_done_without_sample() {
        let operation: Operation = parse(json!({ "done": true, "response": {} }));
        assert!(matches!(
            operation_status(operation),
            Err(GenerationError::MissingMedia(_))
        ));
    }

    #[test]
    fn test_with_api_key() {
        assert_eq!(
            with_api_key("https://files.example/abc", "k"),
            "https://files.example/abc?key=k"
        );
        assert_eq!(
            with_api_key("https://files.example/abc?alt=media", "k"),
            "https://files.example/abc?alt=media&key=k"
        );
        assert_eq!(
            with_api_key("https://files.example/abc?key=other", "k"),
            "https://files.example/abc?key=other"
        );
    }

    #[test]
    fn test_backend_requires_key() {
        let api = ApiConfig::default();
        assert!(matches!(
            GeminiBackend::new(&api),
            Err(GenerationError::MissingCredential)
        ));
    }
}
