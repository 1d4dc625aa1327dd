//! HTTP handlers for the harassment-check gateway.

use crate::services::providers::ImageAttachment;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use service_core::error::AppError;

/// Maximum number of image parts accepted per request.
const MAX_IMAGES: usize = 3;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "harassment-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// `POST /check_harassment`: multipart form with a required `text` field and
/// 0-3 `images` file parts. Forwards to the model and relays the structured
/// scores.
pub async fn check_harassment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut text: Option<String> = None;
    let mut images: Vec<ImageAttachment> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("text") => {
                let value = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read text field: {}", e))
                })?;
                text = Some(value);
            }
            Some("images") => {
                if images.len() >= MAX_IMAGES {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Too many images: at most {} are allowed",
                        MAX_IMAGES
                    )));
                }

                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!("Failed to read image bytes: {}", e))
                    })?
                    .to_vec();

                let position = images.len() + 1;
                if !mime_type.starts_with("image/") || image::load_from_memory(&data).is_err() {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Invalid image at position {}",
                        position
                    )));
                }

                images.push(ImageAttachment { mime_type, data });
            }
            // Unknown fields are ignored.
            _ => {}
        }
    }

    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Missing text: the text field is required and must be non-empty"
            )))
        }
    };

    // One fresh model call per request, with a single retry on transient
    // failures (timeout, connection error).
    let report = match state.analyzer.analyze(&text, &images).await {
        Ok(report) => report,
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, "Transient model error, retrying once");
            state.analyzer.analyze(&text, &images).await?
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        image_count = images.len(),
        text_len = text.len(),
        "Harassment check completed"
    );

    Ok(Json(report))
}
