/// 接口限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "ratelimit:";

/// 登录失败计数键前缀
const LOGIN_ATTEMPTS_PREFIX: &str = "login_attempts:";

/// 生成限流计数键
pub fn rate_limit_key(identifier: &str) -> String {
    format!("{}{}", RATE_LIMIT_PREFIX, identifier)
}

/// 生成登录尝试计数键，email 需已规范化为小写
pub fn login_attempts_key(email: &str) -> String {
    format!("{}{}", LOGIN_ATTEMPTS_PREFIX, email)
}
