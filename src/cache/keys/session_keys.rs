/// 会话缓存键前缀
const SESSION_PREFIX: &str = "session:";

/// 刷新令牌缓存键前缀
const REFRESH_TOKEN_PREFIX: &str = "refresh:";

/// 所有会话键的匹配模式
pub const SESSION_PATTERN: &str = "session:*";

/// 所有刷新令牌键的匹配模式
pub const REFRESH_TOKEN_PATTERN: &str = "refresh:*";

/// 生成会话缓存键
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

/// 生成刷新令牌缓存键
pub fn refresh_token_key(token_id: &str) -> String {
    format!("{}{}", REFRESH_TOKEN_PREFIX, token_id)
}
