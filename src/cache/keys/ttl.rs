//! 各类缓存条目的默认 TTL（秒）

/// 任意写入允许的最大 TTL：7 天
pub const MAX_TTL: u64 = 7 * 24 * 3600;

/// 限流窗口上限：24 小时
pub const MAX_WINDOW: u64 = 24 * 3600;

pub const SESSION: u64 = 30 * 60;
pub const REFRESH_TOKEN: u64 = 7 * 24 * 3600;
pub const LOGIN_ATTEMPT_WINDOW: u64 = 15 * 60;
pub const USER_PROFILE: u64 = 30 * 60;
pub const API_RATE_LIMIT_WINDOW: u64 = 60;

/// 健康检查键只需要活过一次读写
pub const HEALTH_CHECK: u64 = 10;

/// 把配置得到的 TTL 夹到 [1, MAX_TTL]
pub fn clamp(secs: u64) -> u64 {
    secs.clamp(1, MAX_TTL)
}
