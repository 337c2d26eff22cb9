/// 缓存键模块
/// 提供各种缓存键生成函数与默认 TTL
///
/// 这里的键都不带进程级前缀，前缀由 `CacheStore` 在访问后端时统一加上。

// 会话与刷新令牌键
pub mod session_keys;

// 用户维度的键（会话索引、资料缓存）
pub mod user_keys;

// 限流与登录尝试计数键
pub mod limit_keys;

// 默认 TTL
pub mod ttl;

pub use limit_keys::{login_attempts_key, rate_limit_key};
pub use session_keys::{REFRESH_TOKEN_PATTERN, SESSION_PATTERN, refresh_token_key, session_key};
pub use user_keys::{user_data_pattern, user_profile_key, user_sessions_key};

/// 健康检查冒烟测试使用的一次性键
pub fn health_check_key(nonce: &str) -> String {
    format!("health:check:{}", nonce)
}
