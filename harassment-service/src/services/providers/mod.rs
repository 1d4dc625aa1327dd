//! Remote model providers.

pub mod gemini;

use crate::models::HarassmentReport;
use async_trait::async_trait;
use thiserror::Error;

/// Errors talking to the remote model, split by whether a retry makes sense.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("model request timed out")]
    Timeout,

    #[error("model API error: {0}")]
    Api(String),

    #[error("malformed model response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Transient errors are eligible for a single internal retry and map to
    /// 504; everything else is permanent and maps to 502.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Timeout)
    }
}

impl From<ProviderError> for service_core::error::AppError {
    fn from(err: ProviderError) -> Self {
        if err.is_transient() {
            service_core::error::AppError::GatewayTimeout(err.to_string())
        } else {
            service_core::error::AppError::BadGateway(err.to_string())
        }
    }
}

/// An image attached to the conversation, already validated by the handler.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait HarassmentAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        text: &str,
        images: &[ImageAttachment],
    ) -> Result<HarassmentReport, ProviderError>;
}
