use serde::{Deserialize, Serialize};

/// 固定窗口计数的当前状态
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub count: i64,
    pub reset_at: i64, // Unix timestamp (ms)
}

impl RateLimitWindow {
    /// resetAt = now + (ttl > 0 ? ttl : window) * 1000
    pub fn from_ttl(count: i64, ttl: i64, window_secs: u64, now_ms: i64) -> Self {
        let remaining = if ttl > 0 { ttl } else { window_secs as i64 };
        Self {
            count,
            reset_at: now_ms + remaining * 1000,
        }
    }

    /// 距离窗口重置还剩多少秒（向上取整）
    pub fn retry_after_secs(&self, now_ms: i64) -> i64 {
        ((self.reset_at - now_ms).max(0) + 999) / 1000
    }
}

/// 限流判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitWindow),
    Exceeded(RateLimitWindow),
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed(_))
    }

    pub fn window(&self) -> RateLimitWindow {
        match self {
            RateLimitDecision::Allowed(w) | RateLimitDecision::Exceeded(w) => *w,
        }
    }
}
