//! Fixed-window request limits keyed by client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::Mutex;

use crate::routes::ErrorResponse;
use crate::state::AppState;

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    pub scope: &'static str,
    pub max: u32,
    pub window: Duration,
    /// Count only responses with an error status.
    pub failures_only: bool,
    pub message: &'static str,
}

pub const GENERAL: RateLimitRule = RateLimitRule {
    scope: "general",
    max: 100,
    window: FIFTEEN_MINUTES,
    failures_only: false,
    message: "Too many requests from this IP, please try again after 15 minutes.",
};

pub const AUTH: RateLimitRule = RateLimitRule {
    scope: "auth",
    max: 5,
    window: FIFTEEN_MINUTES,
    failures_only: true,
    message: "Too many authentication attempts, please try again after 15 minutes.",
};

pub const TASK_CREATION: RateLimitRule = RateLimitRule {
    scope: "task-creation",
    max: 20,
    window: ONE_HOUR,
    failures_only: false,
    message: "Too many task creation requests, please try again after 1 hour.",
};

pub const ANALYTICS: RateLimitRule = RateLimitRule {
    scope: "analytics",
    max: 30,
    window: FIFTEEN_MINUTES,
    failures_only: false,
    message: "Too many analytics requests, please try again after 15 minutes.",
};

pub const FILE_UPLOAD: RateLimitRule = RateLimitRule {
    scope: "file-upload",
    max: 10,
    window: ONE_HOUR,
    failures_only: false,
    message: "Too many file uploads, please try again after 1 hour.",
};

struct Window {
    started: Instant,
    hits: u32,
}

pub struct RateLimiter {
    enabled: bool,
    /// Key clients on `x-forwarded-for` instead of the peer address.
    trust_proxy: bool,
    windows: Mutex<HashMap<(&'static str, String), Window>>,
}

impl RateLimiter {
    pub fn new(enabled: bool, trust_proxy: bool) -> Self {
        Self {
            enabled,
            trust_proxy,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }

    /// Time left in the current window when `key` has used up `rule`.
    pub async fn blocked_for(&self, rule: &RateLimitRule, key: &str) -> Option<Duration> {
        let windows = self.windows.lock().await;
        let window = windows.get(&(rule.scope, key.to_string()))?;
        let elapsed = window.started.elapsed();
        if elapsed >= rule.window || window.hits < rule.max {
            return None;
        }
        Some(rule.window - elapsed)
    }

    pub async fn record(&self, rule: &RateLimitRule, key: &str) {
        let mut windows = self.windows.lock().await;
        windows.retain(|(scope, _), window| {
            *scope != rule.scope || window.started.elapsed() < rule.window
        });
        let window = windows
            .entry((rule.scope, key.to_string()))
            .or_insert_with(|| Window {
                started: Instant::now(),
                hits: 0,
            });
        if window.started.elapsed() >= rule.window {
            window.started = Instant::now();
            window.hits = 0;
        }
        window.hits += 1;
    }
}

/// Client address used as the limiter key.
///
/// The first `x-forwarded-for` entry counts only behind a trusted proxy;
/// otherwise the peer IP is used.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

fn too_many_requests(rule: &RateLimitRule, wait: Duration) -> Response {
    let seconds = wait.as_secs().max(1);
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(RETRY_AFTER, seconds.to_string())],
        Json(ErrorResponse::new(rule.message)),
    )
        .into_response()
}

async fn enforce(rule: &RateLimitRule, state: &AppState, req: Request, next: Next) -> Response {
    let limiter = state.limiter();
    if !limiter.enabled() {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, limiter.trust_proxy());
    if let Some(wait) = limiter.blocked_for(rule, &key).await {
        tracing::warn!(scope = rule.scope, client = %key, "Rate limit exceeded");
        return too_many_requests(rule, wait);
    }

    if !rule.failures_only {
        limiter.record(rule, &key).await;
        return next.run(req).await;
    }

    let response = next.run(req).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        limiter.record(rule, &key).await;
    }
    response
}

pub async fn limit_general(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }
    enforce(&GENERAL, &state, req, next).await
}

pub async fn limit_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    enforce(&AUTH, &state, req, next).await
}

pub async fn limit_task_creation(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    enforce(&TASK_CREATION, &state, req, next).await
}

pub async fn limit_file_upload(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    enforce(&FILE_UPLOAD, &state, req, next).await
}

pub async fn limit_analytics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    enforce(&ANALYTICS, &state, req, next).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const TINY: RateLimitRule = RateLimitRule {
        scope: "tiny",
        max: 2,
        window: Duration::from_millis(60),
        failures_only: false,
        message: "slow down",
    };

    #[tokio::test]
    async fn blocks_after_max_hits_until_window_ends() {
        let limiter = RateLimiter::new(true, false);
        limiter.record(&TINY, "a").await;
        assert!(limiter.blocked_for(&TINY, "a").await.is_none());
        limiter.record(&TINY, "a").await;

        let wait = limiter.blocked_for(&TINY, "a").await.unwrap();
        assert!(wait <= TINY.window);
        assert!(limiter.blocked_for(&TINY, "b").await.is_none());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.blocked_for(&TINY, "a").await.is_none());
        limiter.record(&TINY, "a").await;
        assert!(limiter.blocked_for(&TINY, "a").await.is_none());
    }

    #[tokio::test]
    async fn expired_windows_are_dropped() {
        let limiter = RateLimiter::new(true, false);
        let brief = RateLimitRule {
            window: Duration::from_millis(1),
            ..TINY
        };
        for i in 0..1000 {
            limiter.record(&brief, &format!("10.0.{}.{}", i / 256, i % 256)).await;
        }
        limiter.record(&GENERAL, "10.9.9.9").await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        limiter.record(&brief, "10.9.9.9").await;

        let windows = limiter.windows.lock().await;
        assert_eq!(windows.len(), 2);
        assert!(windows.contains_key(&(GENERAL.scope, "10.9.9.9".to_string())));
        assert!(windows.contains_key(&(brief.scope, "10.9.9.9".to_string())));
    }

    #[test]
    fn client_key_uses_peer_address() {
        let peer: SocketAddr = "198.51.100.7:51234".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer), false), "198.51.100.7");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(peer), false), "198.51.100.7");
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");
    }
}
