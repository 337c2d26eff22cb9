use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::keys::{
    REFRESH_TOKEN_PATTERN, SESSION_PATTERN, session_key, user_data_pattern, user_sessions_key,
};
use crate::cache::store::CacheStore;
use crate::cache::validation::validate_user_id;
use crate::error::{CacheError, CacheResult};

/// 单个命名空间一次扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: u64,
    pub expired: u64,
    /// 没有过期时间的键（写入方漏了 TTL）
    pub persistent: u64,
}

/// 一轮维护的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub sessions: SweepStats,
    pub refresh_tokens: SweepStats,
}

/// 从载荷里取出所属用户（`user_id` 或 `userId` 字段）
fn payload_owner(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value
        .get("user_id")
        .or_else(|| value.get("userId"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// 维护操作：过期键统计、按用户批量清除、全量清空
#[derive(Clone)]
pub struct MaintenanceOperations {
    store: Arc<CacheStore>,
}

impl MaintenanceOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// 统计会话命名空间里已过期的键
    pub async fn cleanup_expired_sessions(&self) -> CacheResult<u64> {
        Ok(self.sweep("sessions", SESSION_PATTERN).await?.expired)
    }

    /// 统计刷新令牌命名空间里已过期的键
    pub async fn cleanup_expired_tokens(&self) -> CacheResult<u64> {
        Ok(self.sweep("refresh_tokens", REFRESH_TOKEN_PATTERN).await?.expired)
    }

    /// 分批扫描并查询 TTL
    ///
    /// 后端自己的 TTL 机制负责真正删除，这里只做统计：-2 计为已过期，
    /// -1（没有过期时间）说明写入方漏了 TTL，作为异常记日志。
    async fn sweep(&self, namespace: &'static str, pattern: &str) -> CacheResult<SweepStats> {
        let batch = self.store.config().scan_batch_size;
        let mut cursor = 0;
        let mut stats = SweepStats::default();

        loop {
            let (next, keys) = self.store.scan_page(cursor, pattern, batch).await?;
            if !keys.is_empty() {
                let ttls = self.store.ttl_many(&keys).await?;
                stats.scanned += keys.len() as u64;
                stats.expired += ttls.iter().filter(|ttl| **ttl == -2).count() as u64;
                stats.persistent += ttls.iter().filter(|ttl| **ttl == -1).count() as u64;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        if stats.persistent > 0 {
            tracing::warn!(namespace, persistent = stats.persistent, "found cache entries without expiry");
        }
        tracing::info!(
            namespace,
            scanned = stats.scanned,
            expired = stats.expired,
            "cache cleanup pass finished"
        );
        Ok(stats)
    }

    /// 删除某个用户在缓存里的全部数据（注销账号时调用）
    ///
    /// 尽力而为：某一步失败会记日志并继续后面的步骤，最后返回第一个错误。
    pub async fn delete_user_data(&self, user_id: &str) -> CacheResult<u64> {
        validate_user_id(user_id)?;

        let mut deleted = 0;
        let mut first_error: Option<CacheError> = None;
        let mut record = |step: &'static str, result: CacheResult<u64>| match result {
            Ok(n) => deleted += n,
            Err(e) => {
                tracing::error!(op = "delete_user_data", step, user_id, error = %e, "user data purge step failed");
                first_error.get_or_insert(e);
            }
        };

        record("indexed_sessions", self.delete_indexed_sessions(user_id).await);
        record("user_keys", self.store.delete_by_pattern(&user_data_pattern(user_id)).await);
        record("sessions", self.delete_owned(SESSION_PATTERN, user_id).await);
        record("refresh_tokens", self.delete_owned(REFRESH_TOKEN_PATTERN, user_id).await);

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!(user_id, deleted, "user cache data purged");
                Ok(deleted)
            }
        }
    }

    /// 删除索引里列出的会话，只删载荷确实属于该用户的
    async fn delete_indexed_sessions(&self, user_id: &str) -> CacheResult<u64> {
        let ids = self
            .store
            .get::<Vec<String>>(&user_sessions_key(user_id))
            .await?
            .unwrap_or_default();
        if ids.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = ids.iter().map(|id| session_key(id)).collect();
        let values = self.store.get_many_raw(&keys).await?;
        let (owned, foreign): (Vec<_>, Vec<_>) = keys
            .into_iter()
            .zip(values)
            .filter(|(_, raw)| raw.is_some())
            .partition(|(_, raw)| {
                raw.as_deref().and_then(payload_owner).as_deref() == Some(user_id)
            });

        if !foreign.is_empty() {
            tracing::warn!(
                user_id,
                skipped = foreign.len(),
                "session index lists sessions owned by someone else, leaving them in place"
            );
        }

        let owned: Vec<String> = owned.into_iter().map(|(key, _)| key).collect();
        self.store.del_many(&owned).await
    }

    /// 扫描命名空间，删除载荷属于该用户的键
    async fn delete_owned(&self, pattern: &str, user_id: &str) -> CacheResult<u64> {
        let batch = self.store.config().scan_batch_size;
        let mut owned = Vec::new();
        let mut cursor = 0;

        loop {
            let (next, keys) = self.store.scan_page(cursor, pattern, batch).await?;
            let values = self.store.get_many_raw(&keys).await?;
            owned.extend(
                keys.into_iter()
                    .zip(values)
                    .filter(|(_, raw)| {
                        raw.as_deref().and_then(payload_owner).as_deref() == Some(user_id)
                    })
                    .map(|(key, _)| key),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // 扫描结束后再删除，避免边扫边删影响游标
        let mut deleted = 0;
        for chunk in owned.chunks(batch.max(1)) {
            deleted += self.store.del_many(chunk).await?;
        }
        Ok(deleted)
    }

    /// 清空缓存，生产环境禁止
    pub async fn flush_all(&self) -> CacheResult<()> {
        if self.store.config().is_production() {
            tracing::warn!("refusing to flush cache in production");
            return Err(CacheError::Forbidden("flush_all is disabled in production"));
        }
        let deleted = self.store.flush().await?;
        tracing::warn!(deleted, "cache flushed");
        Ok(())
    }

    /// 执行一轮维护；后端未连接且探测失败时跳过
    pub async fn run_once(&self) -> Option<MaintenanceReport> {
        if !self.store.is_connected() {
            if let Err(e) = self.store.ping().await {
                tracing::debug!(error = %e, "cache disconnected, skipping maintenance tick");
                return None;
            }
        }

        let mut report = MaintenanceReport::default();
        match self.sweep("sessions", SESSION_PATTERN).await {
            Ok(stats) => report.sessions = stats,
            Err(e) => tracing::warn!(error = %e, "session cleanup failed"),
        }
        match self.sweep("refresh_tokens", REFRESH_TOKEN_PATTERN).await {
            Ok(stats) => report.refresh_tokens = stats,
            Err(e) => tracing::warn!(error = %e, "refresh token cleanup failed"),
        }
        Some(report)
    }
}

/// 后台维护任务
pub struct MaintenanceWorker {
    shutdown: watch::Sender<bool>,
    reports: watch::Receiver<Option<MaintenanceReport>>,
    handle: JoinHandle<()>,
}

impl MaintenanceWorker {
    pub fn spawn(operations: MaintenanceOperations, interval: Duration) -> Self {
        let (shutdown, mut signal) = watch::channel(false);
        let (publish, reports) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_secs = interval.as_secs(), "cache maintenance worker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Some(report) = operations.run_once().await {
                            tracing::debug!(?report, "maintenance tick finished");
                            publish.send_replace(Some(report));
                        }
                    }
                    changed = signal.changed() => {
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("cache maintenance worker stopped");
        });

        Self {
            shutdown,
            reports,
            handle,
        }
    }

    /// 最近一轮完成的维护统计，还没有跑完过一轮时为 None
    pub fn last_report(&self) -> Option<MaintenanceReport> {
        *self.reports.borrow()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "maintenance worker panicked");
        }
    }
}
