//! 参数校验
//!
//! 读路径用 `is_valid_*` 做宽松判断（不合法直接当作未命中），
//! 写路径用 `validate_*` 返回 `CacheError::Validation`。

use crate::cache::keys::ttl::{MAX_TTL, MAX_WINDOW};
use crate::error::{CacheError, CacheResult};

pub const MAX_KEY_LEN: usize = 250;
pub const MAX_ID_LEN: usize = 128;
pub const MAX_EMAIL_LEN: usize = 254;

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN
}

pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::validation("cache key must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(CacheError::validation(format!(
            "cache key exceeds {MAX_KEY_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_ttl(secs: u64) -> CacheResult<u64> {
    if secs == 0 || secs > MAX_TTL {
        return Err(CacheError::validation(format!(
            "ttl must be between 1 and {MAX_TTL} seconds, got {secs}"
        )));
    }
    Ok(secs)
}

pub fn validate_window(secs: u64) -> CacheResult<u64> {
    if secs == 0 || secs > MAX_WINDOW {
        return Err(CacheError::validation(format!(
            "rate limit window must be between 1 and {MAX_WINDOW} seconds, got {secs}"
        )));
    }
    Ok(secs)
}

/// 会话ID / 刷新令牌ID：`[A-Za-z0-9_-]{1,128}`
pub fn is_valid_token_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn validate_token_id(kind: &str, id: &str) -> CacheResult<()> {
    if is_valid_token_id(id) {
        Ok(())
    } else {
        Err(CacheError::validation(format!("malformed {kind} id")))
    }
}

/// 用户ID会被拼进 `user:{id}:*`，不能包含空白、通配符和键分隔符 `:`
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= MAX_ID_LEN
        && !user_id
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | '*' | '?' | '[' | ']' | '\\'))
}

pub fn validate_user_id(user_id: &str) -> CacheResult<()> {
    if is_valid_user_id(user_id) {
        Ok(())
    } else {
        Err(CacheError::validation("malformed user id"))
    }
}

/// 规范化邮箱（去空白、转小写）并做基本格式检查
pub fn normalize_email(email: &str) -> CacheResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return Err(CacheError::validation("malformed email"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(CacheError::validation("malformed email"));
    };
    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(CacheError::validation("malformed email"));
    }
    Ok(email)
}
