use std::sync::Arc;

use super::rate_limit::RateLimitCacheOperations;
use crate::cache::keys::login_attempts_key;
use crate::cache::store::CacheStore;
use crate::cache::validation::normalize_email;
use crate::error::CacheResult;

/// 登录失败次数跟踪
///
/// 以小写邮箱为键的固定窗口计数。读取永远不报错：缓存故障时返回 0，
/// 只跳过限流判断，不挡住登录本身。
#[derive(Clone)]
pub struct LoginAttemptOperations {
    store: Arc<CacheStore>,
    rate_limits: RateLimitCacheOperations,
}

impl LoginAttemptOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        let rate_limits = RateLimitCacheOperations::new(store.clone());
        Self { store, rate_limits }
    }

    /// 记录一次登录尝试，返回当前窗口内的次数
    pub async fn record_login_attempt(&self, email: &str) -> CacheResult<i64> {
        let email = normalize_email(email)?;
        let window = self.store.config().login_attempt_window_secs;

        let current = self
            .rate_limits
            .increment_key(&login_attempts_key(&email), window)
            .await
            .inspect_err(|e| {
                tracing::warn!(op = "record_login_attempt", email = %email, error = %e, "failed to record login attempt");
            })?;

        tracing::debug!(email = %email, count = current.count, "login attempt recorded");
        Ok(current.count)
    }

    /// 当前窗口内的登录尝试次数
    pub async fn get_login_attempts(&self, email: &str) -> i64 {
        let Ok(email) = normalize_email(email) else {
            return 0;
        };

        match self.store.get::<i64>(&login_attempts_key(&email)).await {
            Ok(count) => count.unwrap_or(0),
            Err(e) => {
                tracing::warn!(op = "get_login_attempts", email = %email, error = %e, "login attempt lookup failed, assuming 0");
                0
            }
        }
    }

    /// 登录成功后清除计数
    pub async fn clear_login_attempts(&self, email: &str) -> bool {
        let Ok(email) = normalize_email(email) else {
            return false;
        };

        match self.store.del(&login_attempts_key(&email)).await {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                tracing::warn!(op = "clear_login_attempts", email = %email, error = %e, "failed to clear login attempts");
                false
            }
        }
    }

    /// 是否已达到配置的尝试上限
    pub async fn is_login_locked(&self, email: &str) -> bool {
        self.get_login_attempts(email).await >= self.store.config().max_login_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::MemoryBackend;
    use crate::config::Config;

    #[tokio::test]
    async fn email_is_case_insensitive() {
        let backend = Arc::new(MemoryBackend::new());
        let attempts = LoginAttemptOperations::new(Arc::new(CacheStore::new(backend, Config::default())));

        assert_eq!(attempts.record_login_attempt("User@Example.com").await.unwrap(), 1);
        assert_eq!(attempts.record_login_attempt("user@example.com").await.unwrap(), 2);
        assert_eq!(attempts.get_login_attempts("USER@EXAMPLE.COM").await, 2);
    }

    #[tokio::test]
    async fn lock_after_ceiling() {
        let backend = Arc::new(MemoryBackend::new());
        let config = Config {
            max_login_attempts: 2,
            ..Config::default()
        };
        let attempts = LoginAttemptOperations::new(Arc::new(CacheStore::new(backend, config)));

        attempts.record_login_attempt("a@b.com").await.unwrap();
        assert!(!attempts.is_login_locked("a@b.com").await);
        attempts.record_login_attempt("a@b.com").await.unwrap();
        assert!(attempts.is_login_locked("a@b.com").await);
    }

    #[tokio::test]
    async fn malformed_email_is_rejected_on_record_only() {
        let backend = Arc::new(MemoryBackend::new());
        let attempts = LoginAttemptOperations::new(Arc::new(CacheStore::new(backend, Config::default())));
        assert!(attempts.record_login_attempt("nope").await.unwrap_err().is_validation());
        assert_eq!(attempts.get_login_attempts("nope").await, 0);
        assert!(!attempts.clear_login_attempts("nope").await);
    }
}
