use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::cache::models::RateLimitDecision;
use crate::cache::operations::RateLimitCacheOperations;
use crate::config::Config;

/// 限流错误码
pub const RATE_LIMIT_CODE: i32 = 1005;

#[derive(Serialize)]
struct RateLimitResponse {
    code: i32,
    msg: String,
    reset_at: i64,
}

/// 按客户端 IP 做固定窗口限流
#[derive(Clone)]
pub struct RateLimiter {
    limits: RateLimitCacheOperations,
    requests: i64,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(limits: RateLimitCacheOperations, config: &Config) -> Self {
        Self {
            limits,
            requests: i64::from(config.rate_limit_requests),
            window_secs: config.rate_limit_window_secs,
        }
    }

    /// 优先取代理头里的 IP，没有时用连接地址
    fn client_ip(req: &Request<Body>) -> String {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());

        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
            .or(remote_ip.as_deref())
            .unwrap_or("unknown")
            .trim()
            .to_string()
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let ip = Self::client_ip(&req);

        let decision = match self
            .limits
            .check_rate_limit(&ip, self.requests, self.window_secs)
            .await
        {
            Ok(decision) => decision,
            Err(e) => {
                // 后端故障已放行，这里只剩参数错误（例如超长的伪造 IP 头）
                tracing::warn!(ip = %ip, error = %e, "rate limit check rejected request");
                return e.into_response();
            }
        };

        match decision {
            RateLimitDecision::Allowed(_) => next.run(req).await,
            RateLimitDecision::Exceeded(window) => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                let retry_after = window.retry_after_secs(now_ms);
                tracing::info!(ip = %ip, count = window.count, "rate limit exceeded");

                let body = Json(RateLimitResponse {
                    code: RATE_LIMIT_CODE,
                    msg: format!("too many requests, retry in {} seconds", retry_after),
                    reset_at: window.reset_at,
                });
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
