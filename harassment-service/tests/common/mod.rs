//! Shared helpers: spawn the gateway on a random port and stand up a local
//! mock of the Gemini generateContent endpoint with scriptable behavior.
#![allow(dead_code)]

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use harassment_service::config::GatewayConfig;
use harassment_service::startup::Application;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the mock upstream does with each call.
pub enum MockBehavior {
    /// Respond with the given report JSON as the candidate text.
    Report(serde_json::Value),
    /// Respond with arbitrary candidate text.
    RawText(String),
    /// Respond with the given HTTP status and no candidates.
    Status(u16),
    /// Sleep before responding with the given report.
    Delay(Duration, serde_json::Value),
}

struct MockState {
    hits: Arc<AtomicUsize>,
    behavior: MockBehavior,
}

pub struct MockGemini {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl MockGemini {
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

fn envelope(text: String) -> Response {
    Json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

async fn mock_handler(State(state): State<Arc<MockState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match &state.behavior {
        MockBehavior::Report(report) => envelope(report.to_string()),
        MockBehavior::RawText(text) => envelope(text.clone()),
        MockBehavior::Status(code) => (
            StatusCode::from_u16(*code).expect("valid status code"),
            "upstream failure",
        )
            .into_response(),
        MockBehavior::Delay(delay, report) => {
            tokio::time::sleep(*delay).await;
            envelope(report.to_string())
        }
    }
}

pub async fn spawn_mock_gemini(behavior: MockBehavior) -> MockGemini {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = Arc::new(MockState {
        hits: hits.clone(),
        behavior,
    });

    let app = Router::new().fallback(mock_handler).with_state(state);
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("Failed to bind mock listener");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockGemini {
        base_url: format!("http://127.0.0.1:{}", port),
        hits,
    }
}

/// Load a test configuration pointed at the mock upstream. Individual tests
/// override fields on the returned value.
pub fn test_config(mock_base: &str) -> GatewayConfig {
    std::env::set_var("ENVIRONMENT", "test");
    std::env::set_var("APP__PORT", "0");
    std::env::set_var("GATEWAY_API_KEYS", "test-key");
    std::env::set_var("GOOGLE_API_KEY", "test-google-key");

    let mut config = GatewayConfig::load().expect("Failed to load config");
    config.gemini.api_base = mock_base.to_string();
    config.gemini.request_timeout_secs = 5;
    config.auth.allowed_referer = None;
    // High enough that only the rate-limit tests trip it.
    config.rate_limit.max_requests = 100;
    config.rate_limit.window_seconds = 60;
    config
}

pub struct TestApp {
    pub address: String,
}

pub async fn spawn_app(config: GatewayConfig) -> TestApp {
    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
    }
}

/// A well-formed model report used as the default mock response.
pub fn sample_report() -> serde_json::Value {
    json!({
        "パワーハラスメント": 85,
        "スメルハラスメント": 0,
        "カスタマーハラスメント": 5,
        "ハラスメントハラスメント": 0,
        "マタニティハラスメント": 0,
        "リモートハラスメント": 10,
        "テクノロジーハラスメント": 0,
        "セクシュアルハラスメント": 0,
        "モラルハラスメント": 70,
        "総合コメント": "日常的に怒鳴られている状況はパワーハラスメントに該当する可能性が高いです。信頼できる窓口への相談をおすすめします。"
    })
}

/// A 1x1 PNG that decodes successfully.
pub fn valid_png() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        1,
        1,
        image::Rgb([0, 0, 0]),
    ));
    let mut bytes: Vec<u8> = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageOutputFormat::Png,
    )
    .expect("Failed to encode PNG");
    bytes
}

/// Parameters for a `/check_harassment` request; defaults are a valid
/// text-only request with the test API key.
pub struct CheckRequest<'a> {
    pub api_key: Option<&'a str>,
    pub referer: Option<&'a str>,
    pub forwarded_for: Option<&'a str>,
    pub text: Option<&'a str>,
    pub images: Vec<(Vec<u8>, &'a str)>,
}

impl Default for CheckRequest<'_> {
    fn default() -> Self {
        Self {
            api_key: Some("test-key"),
            referer: None,
            forwarded_for: None,
            text: Some("同僚に毎日怒鳴られます"),
            images: Vec::new(),
        }
    }
}

pub async fn post_check(address: &str, request: CheckRequest<'_>) -> reqwest::Response {
    let client = reqwest::Client::new();

    let mut form = reqwest::multipart::Form::new();
    if let Some(text) = request.text {
        form = form.text("text", text.to_string());
    }
    for (i, (bytes, mime)) in request.images.into_iter().enumerate() {
        form = form.part(
            "images",
            reqwest::multipart::Part::bytes(bytes)
                .file_name(format!("image{}.png", i))
                .mime_str(mime)
                .expect("valid mime"),
        );
    }

    let mut req = client
        .post(format!("{}/check_harassment", address))
        .multipart(form);
    if let Some(key) = request.api_key {
        req = req.header("X-API-Key", key);
    }
    if let Some(referer) = request.referer {
        req = req.header("Referer", referer);
    }
    if let Some(ip) = request.forwarded_for {
        req = req.header("x-forwarded-for", ip);
    }

    req.send().await.expect("Failed to send request")
}
