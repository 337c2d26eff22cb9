use serde::{Deserialize, Serialize};

/// 刷新令牌缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedRefreshToken {
    pub token_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub issued_at: i64,  // Unix timestamp
    pub expires_at: i64, // Unix timestamp
}

impl CachedRefreshToken {
    pub fn new(token_id: &str, user_id: &str, ttl: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            token_id: token_id.to_string(),
            user_id: user_id.to_string(),
            session_id: None,
            issued_at: now,
            expires_at: now + ttl as i64,
        }
    }
}
