use serde::{Deserialize, Serialize};

/// 用户资料缓存数据模型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedUserProfile {
    pub user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub updated_at: i64, // Unix timestamp
}
