use std::sync::Arc;
use std::time::Instant;

use crate::cache::keys::{health_check_key, ttl};
use crate::cache::models::health::{HealthReport, HealthStatus};
use crate::cache::store::{CacheStore, SetOptions};
use crate::error::CacheResult;

/// 健康检查操作
#[derive(Clone)]
pub struct HealthCacheOperations {
    store: Arc<CacheStore>,
}

impl HealthCacheOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub async fn ping(&self) -> CacheResult<String> {
        self.store.ping().await
    }

    /// 写入、读回、删除一个一次性键，验证读写是否真的正确
    pub async fn smoke_test(&self) -> CacheResult<bool> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let key = health_check_key(&nonce);

        self.store
            .set(&key, &nonce, SetOptions::ttl(ttl::HEALTH_CHECK))
            .await?;
        let read_back = self.store.get::<String>(&key).await?;
        let deleted = self.store.del(&key).await?;

        Ok(read_back.as_deref() == Some(nonce.as_str()) && deleted == 1)
    }

    /// 汇总连通性、冒烟测试、延迟和后端统计
    ///
    /// ping 失败为 unhealthy；延迟超过阈值或冒烟测试失败为 degraded。
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        let ping = self.store.ping().await;
        let latency = started.elapsed();
        let latency_ms = latency.as_millis() as u64;

        if let Err(e) = ping {
            tracing::warn!(error = %e, "cache health check failed");
            return HealthReport {
                status: HealthStatus::Unhealthy,
                latency_ms,
                connected: false,
                smoke_test_passed: false,
                key_count: None,
                memory_usage: None,
                error: Some(e.to_string()),
                checked_at: chrono::Utc::now(),
            };
        }

        let (smoke_test_passed, mut error) = match self.smoke_test().await {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("smoke test read back a different value".to_string())),
            Err(e) => (false, Some(e.to_string())),
        };

        let stats = match self.store.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::debug!(error = %e, "cache stats unavailable");
                Default::default()
            }
        };

        let threshold = self.store.config().health_latency_threshold();
        let status = if !smoke_test_passed || latency > threshold {
            if smoke_test_passed {
                error = Some(format!(
                    "latency {}us exceeds {}ms",
                    latency.as_micros(),
                    threshold.as_millis()
                ));
            }
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        if status != HealthStatus::Healthy {
            tracing::warn!(?status, latency_ms, error = ?error, "cache health degraded");
        }

        HealthReport {
            status,
            latency_ms,
            connected: self.store.is_connected(),
            smoke_test_passed,
            key_count: stats.key_count,
            memory_usage: stats.memory_human,
            error,
            checked_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::MemoryBackend;
    use crate::cache::validation::MAX_KEY_LEN;
    use crate::config::Config;

    #[tokio::test]
    async fn healthy_backend_reports_healthy() {
        let backend = Arc::new(MemoryBackend::new());
        let health = HealthCacheOperations::new(Arc::new(CacheStore::new(backend.clone(), Config::default())));

        assert_eq!(health.ping().await.unwrap(), "PONG");
        assert!(health.smoke_test().await.unwrap());

        let report = health.health_check().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.connected);
        assert_eq!(report.key_count, Some(0));
        assert!(report.error.is_none());
        // 冒烟测试的键不会残留
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_unhealthy() {
        let backend = Arc::new(MemoryBackend::new());
        let health = HealthCacheOperations::new(Arc::new(CacheStore::new(backend.clone(), Config::default())));
        backend.set_available(false);

        let report = health.health_check().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.error.is_some());
    }

    #[tokio::test]
    async fn slow_ping_is_degraded() {
        let config = Config {
            health_latency_threshold_ms: 0,
            ..Config::default()
        };
        let backend = Arc::new(MemoryBackend::new());
        let health = HealthCacheOperations::new(Arc::new(CacheStore::new(backend, config)));

        let report = health.health_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.smoke_test_passed);
        assert!(report.connected);
        let error = report.error.unwrap();
        assert!(error.contains("exceeds 0ms"), "{error}");
    }

    #[tokio::test]
    async fn failed_smoke_test_is_degraded() {
        let backend = Arc::new(MemoryBackend::new());
        // 前缀超长时冒烟测试的键写不进去，但 ping 正常
        let config = Config {
            key_prefix: "p".repeat(MAX_KEY_LEN),
            ..Config::default()
        };
        let health = HealthCacheOperations::new(Arc::new(CacheStore::new(backend, config)));

        let report = health.health_check().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!report.smoke_test_passed);
        assert!(report.error.is_some());
    }
}
