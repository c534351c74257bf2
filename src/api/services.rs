use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{GenerateBody, HealthResponse, PromptUpdate, VariantRef},
    state::AppState,
    utils::{artifact_disk_path, parse_content_type, parse_kind, validate_body_size},
    validation::{validate_generate, validate_prompt_update, validate_variant_ref},
};
use crate::manifest::{Manifest, ManifestError, MediaKind, Slot};

/// Manifest of one media kind (GET /api/slots/{kind})
pub async fn list_slots(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Manifest>, ApiError> {
    let kind = parse_kind(&kind)?;
    let manifest = state.store(kind).blocking(|store| store.load()).await?;
    Ok(Json(manifest))
}

/// Mark a variant as the slot's production choice (POST /api/slots/{kind}/select)
pub async fn select_variant(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Json<Slot>, ApiError> {
    let kind = parse_kind(&kind)?;
    let request: VariantRef = read_json(&state, &headers, body).await?;
    validate_variant_ref(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let (slot_name, filename) = (request.slot.clone(), request.filename.clone());
    let slot = state
        .store(kind)
        .blocking(move |store| {
            store.update(|manifest| manifest.select(&slot_name, &filename).cloned())
        })
        .await?;

    state.metrics.selection_saved();
    info!(kind = %kind, slot = %request.slot, filename = %request.filename, "Selection saved");
    Ok(Json(slot))
}

/// Remove a variant from the manifest and its artifact from disk
/// (POST /api/slots/{kind}/delete)
///
/// Removing the file is best-effort; the manifest entry is authoritative.
pub async fn delete_variant(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Json<Slot>, ApiError> {
    let kind = parse_kind(&kind)?;
    let request: VariantRef = read_json(&state, &headers, body).await?;
    validate_variant_ref(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let (slot_name, filename) = (request.slot.clone(), request.filename.clone());
    let (removed, slot) = state
        .store(kind)
        .blocking(move |store| {
            store.update(|manifest| {
                let removed = manifest.remove_variant(&slot_name, &filename)?;
                let slot = manifest
                    .slot(&slot_name)
                    .cloned()
                    .ok_or_else(|| ManifestError::SlotNotFound(slot_name.clone()))?;
                Ok((removed, slot))
            })
        })
        .await?;

    state.metrics.variant_deleted();
    info!(kind = %kind, slot = %request.slot, filename = %request.filename, "Variant deleted");

    remove_artifact(&state, &removed.path).await;
    Ok(Json(slot))
}

/// Run a generation batch for a slot (POST /api/slots/{kind}/generate)
///
/// Serialised by a concurrency limit on the route; batches can take minutes.
pub async fn generate_variants(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let request: GenerateBody = read_json(&state, &headers, body).await?;
    validate_generate(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let generator = state.generator(kind).ok_or_else(|| {
        ApiError::GenerationUnavailable("set GEMINI_API_KEY and restart the server".to_string())
    })?;

    let report = generator.generate(request.into_request()).await?;
    info!(summary = %report.summary(), "Generation request finished");

    Ok((StatusCode::OK, Json(report)))
}

/// Replace a slot's canonical prompt (POST /api/slots/{kind}/prompt)
pub async fn update_prompt(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<Json<Slot>, ApiError> {
    let kind = parse_kind(&kind)?;
    let request: PromptUpdate = read_json(&state, &headers, body).await?;
    validate_prompt_update(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    let slot_name = request.slot.clone();
    let prompt = request.prompt.trim().to_string();
    let slot = state
        .store(kind)
        .blocking(move |store| {
            store.update(|manifest| manifest.set_prompt(&slot_name, &prompt).cloned())
        })
        .await?;

    info!(kind = %kind, slot = %request.slot, "Prompt updated");
    Ok(Json(slot))
}

/// Health check endpoint (GET /health)
///
/// Reports each manifest as healthy when it loads; a corrupt manifest makes
/// the whole service answer 503.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = BTreeMap::new();

    for kind in [MediaKind::Image, MediaKind::Video] {
        let status = match state.store(kind).blocking(|store| store.load()).await {
            Ok(_) => "healthy".to_string(),
            Err(e) => format!("unhealthy: {e}"),
        };
        components.insert(format!("{kind}_manifest"), status);
    }

    let generation = if state.image_generator.is_some() {
        "enabled"
    } else {
        "disabled"
    };
    components.insert("generation".to_string(), generation.to_string());

    let all_healthy = components.values().all(|s| !s.starts_with("unhealthy"));
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        environment: format!("{:?}", state.config.environment).to_lowercase(),
        components,
        metrics: state.metrics.snapshot(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

/// Reads a JSON request body after checking Content-Type and size
async fn read_json<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: axum::body::Body,
) -> Result<T, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes();

    let max_size = usize::try_from(state.config.staging.max_payload_bytes.as_u64())
        .unwrap_or(usize::MAX);
    validate_body_size(&data, max_size)?;

    Ok(serde_json::from_slice(&data)?)
}

async fn remove_artifact(state: &AppState, public_path: &str) {
    let Some(path) = artifact_disk_path(&state.config.paths.public_dir, public_path) else {
        warn!(path = %public_path, "Refusing to delete artifact outside the public directory");
        return;
    };

    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!(path = %path.display(), "Artifact removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Artifact already missing on disk");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove artifact"),
    }
}
