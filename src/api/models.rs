//! Wire types of the staging endpoints
//!
//! Shared by the axum handlers and the preview session's HTTP client. All
//! bodies are camelCase JSON, matching the manifest file format.
//!
//! | Method | Path | Body | Response |
//! |---|---|---|---|
//! | GET | `/api/slots/{kind}` | | [`Manifest`](crate::manifest::Manifest) |
//! | POST | `/api/slots/{kind}/select` | [`VariantRef`] | [`Slot`](crate::manifest::Slot) |
//! | POST | `/api/slots/{kind}/delete` | [`VariantRef`] | [`Slot`](crate::manifest::Slot) |
//! | POST | `/api/slots/{kind}/generate` | [`GenerateBody`] | [`BatchReport`](crate::generator::BatchReport) |
//! | POST | `/api/slots/{kind}/prompt` | [`PromptUpdate`] | [`Slot`](crate::manifest::Slot) |
//! | GET | `/health` | | [`HealthResponse`] |
//!
//! Errors come back as [`ErrorResponse`] with a stable `code`.

use crate::generator::GenerationRequest;
use crate::manifest::{AspectRatio, ClipSeconds};
use crate::observability::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names one variant of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRef {
    pub slot: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    pub slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<ClipSeconds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Defaults to true; false keeps the slot's stored prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_prompt: Option<bool>,
}

impl GenerateBody {
    pub fn into_request(self) -> GenerationRequest {
        GenerationRequest::builder()
            .slot(self.slot)
            .maybe_prompt(self.prompt)
            .maybe_count(self.count)
            .maybe_aspect(self.aspect)
            .maybe_duration(self.duration)
            .maybe_name(self.name)
            .persist_prompt(self.persist_prompt.unwrap_or(true))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptUpdate {
    pub slot: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub components: BTreeMap<String, String>,
    pub metrics: MetricsSnapshot,
    pub version: String,
}
