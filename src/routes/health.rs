use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;
use crate::cache::models::HealthStatus;
use crate::error::CacheError;

/// 缓存健康检查，unhealthy 时返回 503 供负载均衡摘除
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.cache.health.health_check().await;

    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(report))
}

#[derive(Serialize)]
pub struct PingResponse {
    pub reply: String,
}

pub async fn ping(State(state): State<AppState>) -> Result<Json<PingResponse>, CacheError> {
    let reply = state.cache.health.ping().await?;
    Ok(Json(PingResponse { reply }))
}
