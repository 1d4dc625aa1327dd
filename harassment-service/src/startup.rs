//! Application startup and lifecycle management.

use crate::config::GatewayConfig;
use crate::handlers;
use crate::middleware::auth;
use crate::services::providers::gemini::{GeminiAnalyzer, GeminiConfig};
use crate::services::providers::HarassmentAnalyzer;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::{
    ip_rate_limit_middleware, FixedWindowLimiter, SharedLimiter,
};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Request body cap; three images plus text fit comfortably under this.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub analyzer: Arc<dyn HarassmentAnalyzer>,
}

pub struct Application {
    port: u16,
    server: Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>,
}

impl Application {
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let analyzer: Arc<dyn HarassmentAnalyzer> = Arc::new(GeminiAnalyzer::new(GeminiConfig {
            api_key: config.gemini.api_key.clone(),
            model: config.gemini.model.clone(),
            api_base: config.gemini.api_base.clone(),
            request_timeout: Duration::from_secs(config.gemini.request_timeout_secs),
        }));

        tracing::info!(model = %config.gemini.model, "Initialized Gemini analyzer");

        let limiter: SharedLimiter = Arc::new(FixedWindowLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_seconds),
        ));

        let state = AppState {
            config: config.clone(),
            analyzer,
        };

        // route_layer ordering: the limiter wraps the auth check, so a
        // rate-limited client is turned away before key validation.
        let app = Router::new()
            .route("/check_harassment", post(handlers::check_harassment))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_api_key,
            ))
            .route_layer(middleware::from_fn_with_state(
                limiter,
                ip_rate_limit_middleware,
            ))
            .route("/health", get(handlers::health_check))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

        Ok(Self {
            port,
            server: Box::pin(server),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
