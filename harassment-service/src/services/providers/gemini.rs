//! Gemini analyzer implementation.
//!
//! Sends the conversation text and images to Google's Gemini API with a
//! fixed response schema and parses the constrained JSON output.

use super::{HarassmentAnalyzer, ImageAttachment, ProviderError};
use crate::models::HarassmentReport;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_INSTRUCTION: &str = "\
あなたはハラスメントの専門家です。
入力された写真(0~3枚)と会話内容をもとに分析し、
下記9種ハラスメントを0〜100点で数値化し、
総合コメントを日本語で出力してください。
答えは必ずstrictなJSONのみで返してください。";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

pub struct GeminiAnalyzer {
    config: GeminiConfig,
    client: Client,
}

impl GeminiAnalyzer {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base, self.config.model, method, self.config.api_key
        )
    }

    fn user_prompt(text: &str) -> String {
        format!(
            "【会話内容】\n{}\n\n\
             出力JSONのフォーマット:\n{{\n\
             \x20 \"パワーハラスメント\": 0〜100,\n\
             \x20 \"スメルハラスメント\": 0〜100,\n\
             \x20 \"カスタマーハラスメント\": 0〜100,\n\
             \x20 \"ハラスメントハラスメント\": 0〜100,\n\
             \x20 \"マタニティハラスメント\": 0〜100,\n\
             \x20 \"リモートハラスメント\": 0〜100,\n\
             \x20 \"テクノロジーハラスメント\": 0〜100,\n\
             \x20 \"セクシュアルハラスメント\": 0〜100,\n\
             \x20 \"モラルハラスメント\": 0〜100,\n\
             \x20 \"総合コメント\": \"XXX\"\n}}",
            text
        )
    }

    fn build_request(&self, text: &str, images: &[ImageAttachment]) -> GenerateContentRequest {
        let mut parts: Vec<ContentPart> = images
            .iter()
            .map(|img| ContentPart::InlineData {
                inline_data: InlineData {
                    mime_type: img.mime_type.clone(),
                    data: BASE64.encode(&img.data),
                },
            })
            .collect();
        parts.push(ContentPart::Text {
            text: Self::user_prompt(text),
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: Some(Content {
                role: None,
                parts: vec![ContentPart::Text {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(0.3),
                top_p: Some(0.95),
                top_k: Some(10),
                max_output_tokens: Some(512),
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(HarassmentReport::response_schema()),
            }),
        }
    }
}

#[async_trait]
impl HarassmentAnalyzer for GeminiAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        images: &[ImageAttachment],
    ) -> Result<HarassmentReport, ProviderError> {
        let request = self.build_request(text, images);
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            text_len = text.len(),
            image_count = images.len(),
            "Sending request to Gemini API"
        );

        let response = self.client.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Malformed(format!("Failed to parse response envelope: {}", e))
            }
        })?;

        let candidate_text = api_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| match p {
                ContentPart::Text { text } => Some(text.clone()),
                _ => None,
            })
            .ok_or_else(|| ProviderError::Malformed("no text candidate in response".to_string()))?;

        let json_str = extract_json(&candidate_text)
            .ok_or_else(|| ProviderError::Malformed("no JSON object in response".to_string()))?;

        let report: HarassmentReport = serde_json::from_str(json_str)
            .map_err(|e| ProviderError::Malformed(format!("schema mismatch: {}", e)))?;

        report.validate().map_err(ProviderError::Malformed)?;

        Ok(report)
    }
}

/// Cut the JSON object out of the model text. Tolerates markdown fences and
/// surrounding prose by slicing from the first `{` to the last `}`.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContentPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}
