use service_core::config as core_config;
use service_core::error::AppError;
use std::collections::HashSet;
use std::env;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub common: core_config::Config,
    pub auth: AuthConfig,
    pub gemini: GeminiSettings,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Accepted values for the X-API-Key header.
    pub api_keys: HashSet<String>,
    /// Expected Referer origin. `None` disables the referer check.
    pub allowed_referer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    /// Base URL of the generative language API. Overridable so tests can
    /// point the service at a local stand-in.
    pub api_base: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let api_keys = get_env("GATEWAY_API_KEYS", Some("dev-key"), is_prod)?
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect::<HashSet<_>>();

        if api_keys.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "GATEWAY_API_KEYS must contain at least one key"
            )));
        }

        Ok(GatewayConfig {
            common: common_config,
            auth: AuthConfig {
                api_keys,
                allowed_referer: env::var("ALLOWED_REFERER").ok(),
            },
            gemini: GeminiSettings {
                api_key: get_env("GOOGLE_API_KEY", Some("dev-api-key"), is_prod)?,
                model: get_env("GEMINI_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                api_base: get_env(
                    "GEMINI_API_BASE",
                    Some("https://generativelanguage.googleapis.com/v1beta"),
                    is_prod,
                )?,
                request_timeout_secs: get_env("GEMINI_TIMEOUT_SECS", Some("30"), is_prod)?
                    .parse()
                    .unwrap_or(30),
            },
            rate_limit: RateLimitConfig {
                max_requests: get_env("RATE_LIMIT_MAX_REQUESTS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                window_seconds: get_env("RATE_LIMIT_WINDOW_SECONDS", Some("60"), is_prod)?
                    .parse()
                    .unwrap_or(60),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
