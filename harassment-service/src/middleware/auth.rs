use crate::startup::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

/// Gatekeeping for `/check_harassment`: the X-API-Key header must match a
/// configured key, and the Referer must match the configured origin when one
/// is set. Checks short-circuit on the first failure.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    match api_key {
        Some(key) if state.config.auth.api_keys.contains(key) => {}
        Some(_) => {
            tracing::warn!("Rejected request with unknown API key");
            return Err(AppError::Unauthorized(anyhow::anyhow!("Invalid API key")));
        }
        None => {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Missing X-API-Key header"
            )));
        }
    }

    if let Some(allowed) = &state.config.auth.allowed_referer {
        let referer = request
            .headers()
            .get(header::REFERER)
            .and_then(|value| value.to_str().ok());

        match referer {
            Some(referer) if referer_allowed(referer, allowed) => {}
            _ => {
                tracing::warn!(referer = ?referer, "Rejected request with bad referer");
                return Err(AppError::Forbidden(anyhow::anyhow!("Referer not allowed")));
            }
        }
    }

    Ok(next.run(request).await)
}

/// Compare referer against the allowed origin, tolerating a trailing slash
/// on either side.
fn referer_allowed(referer: &str, allowed: &str) -> bool {
    referer.trim_end_matches('/') == allowed.trim_end_matches('/')
}
