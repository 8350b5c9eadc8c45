//! Per-IP rate limits for system-user login and for gate submissions
//! (`POST /d/{id}`), so neither file passwords nor account passwords can be
//! brute-forced.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};

use super::client::client_ip;
use crate::web::error::ApiError;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

fn per_minute(requests: u32) -> KeyedLimiter {
    RateLimiter::keyed(Quota::per_minute(
        NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN),
    ))
}

/// Keyed limiters for the two rate-limited surfaces.
pub struct RateLimitState {
    login: KeyedLimiter,
    unlock: KeyedLimiter,
}

impl RateLimitState {
    /// Limits in requests per minute per client IP.
    pub fn new(login_per_minute: u32, unlock_per_minute: u32) -> Self {
        Self {
            login: per_minute(login_per_minute),
            unlock: per_minute(unlock_per_minute),
        }
    }

    /// Whether a login attempt from `ip` is allowed.
    pub fn check_login(&self, ip: &str) -> bool {
        self.login.check_key(&ip.to_string()).is_ok()
    }

    /// Whether a gate submission from `ip` is allowed.
    pub fn check_unlock(&self, ip: &str) -> bool {
        self.unlock.check_key(&ip.to_string()).is_ok()
    }

    /// Forget IPs whose budget has fully refilled.
    pub fn cleanup(&self) {
        for limiter in [&self.login, &self.unlock] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of IPs currently tracked.
    pub fn tracked(&self) -> usize {
        self.login.len() + self.unlock.len()
    }

    /// Run [`cleanup`](Self::cleanup) every five minutes.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup();
                tracing::debug!(tracked = self.tracked(), "Rate limiter cleanup");
            }
        });
    }
}

/// Middleware for `POST /api/auth/login`.
pub async fn login_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(req.headers(), req.extensions());
    if !state.check_login(&ip) {
        tracing::warn!(%ip, "Login rate limit exceeded");
        return ApiError::too_many_requests("Too many login attempts. Please try again later.")
            .into_response();
    }
    next.run(req).await
}

/// Middleware for `/d/{id}`. Only `POST` submissions are counted.
pub async fn unlock_rate_limit(
    state: Arc<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    let ip = client_ip(req.headers(), req.extensions());
    if !state.check_unlock(&ip) {
        tracing::warn!(%ip, "Unlock rate limit exceeded");
        return ApiError::too_many_requests("Too many attempts. Please try again later.")
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::any, Router};
    use tower::ServiceExt;

    #[test]
    fn test_login_limit_is_per_ip() {
        let state = RateLimitState::new(3, 100);

        assert!(state.check_login("10.0.0.1"));
        assert!(state.check_login("10.0.0.1"));
        assert!(state.check_login("10.0.0.1"));
        assert!(!state.check_login("10.0.0.1"));

        assert!(state.check_login("10.0.0.2"));
        assert_eq!(state.tracked(), 2);
    }

    #[test]
    fn test_unlock_budget_is_separate() {
        let state = RateLimitState::new(1, 2);

        assert!(state.check_login("10.0.0.1"));
        assert!(state.check_unlock("10.0.0.1"));
        assert!(state.check_unlock("10.0.0.1"));
        assert!(!state.check_unlock("10.0.0.1"));
        assert!(!state.check_login("10.0.0.1"));
    }

    #[test]
    fn test_zero_limit_allows_one() {
        let state = RateLimitState::new(0, 0);
        assert!(state.check_login("10.0.0.1"));
        assert!(!state.check_login("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_unlock_middleware_only_counts_posts() {
        let state = Arc::new(RateLimitState::new(10, 1));
        let app = Router::new()
            .route("/d/:id", any(|| async { "ok" }))
            .layer(middleware::from_fn(move |req, next| {
                unlock_rate_limit(state.clone(), req, next)
            }));

        let request = |method: &str| {
            Request::builder()
                .method(method)
                .uri("/d/abc")
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..3 {
            let response = app.clone().oneshot(request("GET")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.clone().oneshot(request("POST")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.clone().oneshot(request("POST")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
