use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

/// Per-IP request counter over a fixed time window.
///
/// Owned explicitly by the application (constructed in startup, passed into
/// the middleware as state) so tests can build a fresh store per case.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<IpAddr, Window>,
}

struct Window {
    started: Instant,
    count: u32,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            windows: DashMap::new(),
        }
    }

    /// Record one request from `ip`. `Err` carries the seconds until the
    /// current window rolls over.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), u64> {
        // The dashmap entry guard serializes access per key, so concurrent
        // requests from one IP cannot undercount.
        let mut window = self.windows.entry(ip).or_insert_with(|| Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        window.count += 1;
        if window.count <= self.max_requests {
            Ok(())
        } else {
            let remaining = self.window.saturating_sub(now.duration_since(window.started));
            Err(remaining.as_secs().max(1))
        }
    }
}

pub type SharedLimiter = Arc<FixedWindowLimiter>;

/// Middleware for IP-based rate limiting.
pub async fn ip_rate_limit_middleware(
    State(limiter): State<SharedLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let forwarded_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    let ip = forwarded_ip.or_else(|| {
        request
            .extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|axum::extract::ConnectInfo(addr)| addr.ip())
    });

    match ip {
        Some(ip) => match limiter.check(ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(retry_after) => Err(AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(retry_after),
            )),
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
