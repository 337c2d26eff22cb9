use std::sync::Arc;

use crate::cache::keys::rate_limit_key;
use crate::cache::models::rate_limit::{RateLimitDecision, RateLimitWindow};
use crate::cache::store::CacheStore;
use crate::cache::validation::{is_valid_key, validate_window};
use crate::error::CacheResult;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 速率限制缓存操作（固定窗口计数）
///
/// 递增与首次命中设置过期在后端的同一个原子单元里完成，窗口边界在第一次
/// 命中时确定，之后的命中不会延长窗口。
#[derive(Clone)]
pub struct RateLimitCacheOperations {
    store: Arc<CacheStore>,
}

impl RateLimitCacheOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// 增加速率限制计数
    pub async fn increment_rate_limit(
        &self,
        identifier: &str,
        window_secs: u64,
    ) -> CacheResult<RateLimitWindow> {
        self.increment_key(&rate_limit_key(identifier), window_secs)
            .await
            .inspect_err(|e| {
                tracing::warn!(op = "increment_rate_limit", identifier, error = %e, "rate limit increment failed");
            })
    }

    /// 对任意计数键做窗口递增，登录尝试计数也走这里
    pub(crate) async fn increment_key(
        &self,
        key: &str,
        window_secs: u64,
    ) -> CacheResult<RateLimitWindow> {
        validate_window(window_secs)?;
        let (count, ttl) = self.store.increment_window(key, window_secs).await?;
        Ok(RateLimitWindow::from_ttl(count, ttl, window_secs, now_ms()))
    }

    /// 读取当前窗口（只读），未命中或后端故障返回 None
    pub async fn get_rate_limit(&self, identifier: &str) -> Option<RateLimitWindow> {
        let key = rate_limit_key(identifier);
        if !is_valid_key(&key) {
            return None;
        }

        let read = async {
            let count = self.store.get::<i64>(&key).await?;
            let ttl = self.store.ttl(&key).await?;
            CacheResult::Ok(count.map(|count| {
                let now = now_ms();
                RateLimitWindow {
                    count,
                    reset_at: now + ttl.max(0) * 1000,
                }
            }))
        };

        match read.await {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(op = "get_rate_limit", identifier, error = %e, "rate limit lookup failed");
                None
            }
        }
    }

    /// 重置计数，后端故障时返回 false
    pub async fn reset_rate_limit(&self, identifier: &str) -> bool {
        match self.store.del(&rate_limit_key(identifier)).await {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                tracing::warn!(op = "reset_rate_limit", identifier, error = %e, "rate limit reset failed");
                false
            }
        }
    }

    /// 递增并与上限比较
    ///
    /// 后端不可用时放行（限流是可选能力，不能挡住主流程），参数错误仍然返回错误。
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        limit: i64,
        window_secs: u64,
    ) -> CacheResult<RateLimitDecision> {
        match self.increment_rate_limit(identifier, window_secs).await {
            Ok(window) if window.count > limit => Ok(RateLimitDecision::Exceeded(window)),
            Ok(window) => Ok(RateLimitDecision::Allowed(window)),
            Err(e) if e.is_unavailable() => {
                tracing::warn!(identifier, "rate limiter unavailable, allowing request");
                Ok(RateLimitDecision::Allowed(RateLimitWindow {
                    count: 0,
                    reset_at: now_ms() + window_secs as i64 * 1000,
                }))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::MemoryBackend;
    use crate::config::Config;

    fn ops() -> (Arc<MemoryBackend>, RateLimitCacheOperations) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CacheStore::new(backend.clone(), Config::default()));
        (backend, RateLimitCacheOperations::new(store))
    }

    #[tokio::test]
    async fn counts_and_reports_reset() {
        let (_, limits) = ops();
        let before = now_ms();
        let first = limits.increment_rate_limit("10.0.0.1", 60).await.unwrap();
        let second = limits.increment_rate_limit("10.0.0.1", 60).await.unwrap();

        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert!(first.reset_at >= before + 59_000);

        let current = limits.get_rate_limit("10.0.0.1").await.unwrap();
        assert_eq!(current.count, 2);
    }

    #[tokio::test]
    async fn window_is_validated() {
        let (_, limits) = ops();
        assert!(limits.increment_rate_limit("x", 0).await.unwrap_err().is_validation());
        assert!(limits
            .increment_rate_limit("x", 24 * 3600 + 1)
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn check_allows_until_limit() {
        let (_, limits) = ops();
        for _ in 0..3 {
            assert!(limits.check_rate_limit("ip", 3, 60).await.unwrap().is_allowed());
        }
        let decision = limits.check_rate_limit("ip", 3, 60).await.unwrap();
        assert!(!decision.is_allowed());
        assert_eq!(decision.window().count, 4);

        assert!(limits.reset_rate_limit("ip").await);
        assert!(limits.check_rate_limit("ip", 3, 60).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn outage_fails_open() {
        let (backend, limits) = ops();
        backend.set_available(false);
        let decision = limits.check_rate_limit("ip", 1, 60).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(limits.get_rate_limit("ip").await, None);
        assert!(limits.increment_rate_limit("ip", 60).await.unwrap_err().is_unavailable());
    }
}
