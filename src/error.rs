use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 缓存层统一错误类型
///
/// 调用方只会看到这里的几种错误，后端（redis）的错误类型在边界处被转换掉。
#[derive(Debug, Error)]
pub enum CacheError {
    /// 参数不合法（键、TTL、窗口、会话ID、邮箱等），在访问后端之前抛出
    #[error("validation failed: {0}")]
    Validation(String),

    /// 后端连接失败或命令执行失败
    #[error("cache backend unavailable during {op}: {message}")]
    Unavailable { op: &'static str, message: String },

    /// 命令超时，降级策略上等同于 Unavailable
    #[error("cache operation {op} timed out")]
    Timeout { op: &'static str },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 当前环境不允许的操作（例如生产环境 flush）
    #[error("operation not permitted: {0}")]
    Forbidden(&'static str),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl CacheError {
    pub fn validation(message: impl Into<String>) -> Self {
        CacheError::Validation(message.into())
    }

    pub fn unavailable(op: &'static str, message: impl Into<String>) -> Self {
        CacheError::Unavailable {
            op,
            message: message.into(),
        }
    }

    /// 把 redis 错误映射为缓存错误，超时单独区分
    pub fn redis(op: &'static str, err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CacheError::Timeout { op }
        } else {
            CacheError::Unavailable {
                op,
                message: err.to_string(),
            }
        }
    }

    /// 是否属于“后端不可用”类错误（降级策略使用）
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CacheError::Unavailable { .. } | CacheError::Timeout { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CacheError::Validation(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::redis("command", err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Validation(_) => StatusCode::BAD_REQUEST,
            CacheError::Forbidden(_) => StatusCode::FORBIDDEN,
            CacheError::Unavailable { .. } | CacheError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // 后端错误细节只进日志，不返回给客户端
        let error_message = match &self {
            CacheError::Validation(msg) => msg.clone(),
            CacheError::Forbidden(msg) => (*msg).to_string(),
            _ => {
                tracing::error!(error = %self, "cache error surfaced to HTTP layer");
                "cache unavailable".to_string()
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_outages_share_the_degrade_class() {
        assert!(CacheError::Timeout { op: "get" }.is_unavailable());
        assert!(CacheError::unavailable("set", "connection refused").is_unavailable());
        assert!(!CacheError::validation("bad key").is_unavailable());
    }

    #[test]
    fn redis_timeout_maps_to_timeout() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = CacheError::redis("get", redis::RedisError::from(io));
        assert!(matches!(err, CacheError::Timeout { op: "get" }));
    }

    #[test]
    fn status_codes_follow_error_class() {
        let resp = CacheError::validation("ttl out of range").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CacheError::unavailable("ping", "down").into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = CacheError::Forbidden("flush in production").into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
