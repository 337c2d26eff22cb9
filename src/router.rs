use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::{RateLimiter, log_errors, rate_limit};
use crate::routes;

// 健康检查路由，不参与限流
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/ping", get(routes::health::ping))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(
        state.cache.rate_limits.clone(),
        &state.config,
    ));

    // 业务路由挂在这里，统一走限流
    let api_routes = Router::new()
        .route("/api/ping", get(routes::health::ping))
        .layer(axum::middleware::from_fn_with_state(rate_limiter, rate_limit));

    let router = Router::new()
        .merge(health_routes())
        .merge(api_routes)
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = router.layer(tower_http::cors::CorsLayer::permissive());

    router.with_state(state)
}
