use serde::{Deserialize, Serialize};

/// 会话缓存数据模型
///
/// 会话存储本身对载荷类型是泛型的，这是认证流程默认使用的载荷。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedSession {
    pub session_id: String,
    pub user_id: String,
    pub device: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: i64, // Unix timestamp
    pub expires_at: i64, // Unix timestamp
    pub is_active: bool,
}

impl CachedSession {
    /// 以当前时间创建一个在 `ttl` 秒后过期的会话
    pub fn new(session_id: &str, user_id: &str, ttl: u64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            device: None,
            ip_address: None,
            user_agent: None,
            created_at: now,
            expires_at: now + ttl as i64,
            is_active: true,
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
