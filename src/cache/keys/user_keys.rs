/// 用户维度缓存键前缀
const USER_PREFIX: &str = "user:";

/// 生成用户活跃会话索引键
pub fn user_sessions_key(user_id: &str) -> String {
    format!("{}{}:sessions", USER_PREFIX, user_id)
}

/// 生成用户资料缓存键
pub fn user_profile_key(user_id: &str) -> String {
    format!("{}{}:profile", USER_PREFIX, user_id)
}

/// 某个用户名下所有键的匹配模式
///
/// user_id 必须先经过校验（不含通配符），否则模式可能匹配到其他用户。
pub fn user_data_pattern(user_id: &str) -> String {
    format!("{}{}:*", USER_PREFIX, user_id)
}
