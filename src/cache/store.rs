//! 缓存存储适配层
//!
//! 在 `CacheBackend` 之上提供带类型的读写：
//! - 所有键统一加上进程级前缀（多租户隔离），`keys()` 返回时去掉前缀；
//! - 值用 JSON 序列化，原子递增产生的整数计数本身也是合法 JSON；
//! - 读 / 删路径遇到不合法的键返回空值（None / false / 0 / -2），写路径返回校验错误；
//! - 每条命令都有超时上限，超时返回 `CacheError::Timeout`。

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::backend::{self, CacheBackend};
use crate::cache::models::BackendStats;
use crate::cache::validation::{MAX_KEY_LEN, is_valid_key, validate_key, validate_ttl, validate_window};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};

/// `set` 的可选参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub ttl: Option<u64>,
    pub nx: bool,
}

impl SetOptions {
    pub fn ttl(secs: u64) -> Self {
        Self {
            ttl: Some(secs),
            nx: false,
        }
    }

    /// 仅在键不存在时写入
    pub fn nx(mut self) -> Self {
        self.nx = true;
        self
    }
}

/// `set` 的结果，区分真正写入和 NX 条件下的跳过
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Written,
    Skipped,
}

impl SetOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, SetOutcome::Written)
    }
}

pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    config: Config,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, config: Config) -> Self {
        Self { backend, config }
    }

    /// 根据配置创建后端（不会立即连接）
    pub fn from_config(config: Config) -> CacheResult<Self> {
        let backend = backend::from_config(&config)?;
        Ok(Self::new(backend, config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    pub async fn connect(&self) -> CacheResult<()> {
        self.backend.connect().await?;
        tracing::info!(
            backend = self.backend.name(),
            prefix = %self.config.key_prefix,
            "cache store connected"
        );
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.backend.disconnect().await;
    }

    /// 长度上限按加上前缀后的完整键计算
    fn key_fits(&self, key: &str) -> bool {
        is_valid_key(key) && self.config.key_prefix.len() + key.len() <= MAX_KEY_LEN
    }

    fn check_key(&self, key: &str) -> CacheResult<()> {
        validate_key(key)?;
        if self.config.key_prefix.len() + key.len() > MAX_KEY_LEN {
            return Err(CacheError::validation(format!(
                "cache key exceeds {MAX_KEY_LEN} characters including the prefix"
            )));
        }
        Ok(())
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn strip_prefix(&self, full: String) -> String {
        match full.strip_prefix(self.config.key_prefix.as_str()) {
            Some(rest) => rest.to_string(),
            None => full,
        }
    }

    fn command_timeout(&self) -> Duration {
        self.config.command_timeout()
    }

    async fn run<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        match tokio::time::timeout(self.command_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.config.command_timeout_ms, "cache command timed out");
                Err(CacheError::Timeout { op })
            }
        }
    }

    // ---------- 标量 ----------

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        if !self.key_fits(key) {
            return Ok(None);
        }
        let full = self.full_key(key);
        self.run("get", self.backend.get(&full)).await
    }

    /// 批量读取原始值，不合法的键对应 None
    pub async fn get_many_raw(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let full: Vec<String> = keys
            .iter()
            .filter(|key| self.key_fits(key))
            .map(|key| self.full_key(key))
            .collect();
        let mut fetched = self.run("mget", self.backend.mget(&full)).await?.into_iter();

        Ok(keys
            .iter()
            .map(|key| {
                if self.key_fits(key) {
                    fetched.next().flatten()
                } else {
                    None
                }
            })
            .collect())
    }

    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> CacheResult<SetOutcome> {
        self.check_key(key)?;
        if let Some(ttl) = options.ttl {
            validate_ttl(ttl)?;
        }
        let json = serde_json::to_string(value)?;
        let full = self.full_key(key);

        let written = self
            .run("set", self.backend.set(&full, &json, options.ttl, options.nx))
            .await?;
        Ok(if written {
            SetOutcome::Written
        } else {
            SetOutcome::Skipped
        })
    }

    pub async fn del(&self, key: &str) -> CacheResult<u64> {
        if !self.key_fits(key) {
            return Ok(0);
        }
        self.run("del", self.backend.del(&[self.full_key(key)])).await
    }

    pub async fn del_many(&self, keys: &[String]) -> CacheResult<u64> {
        let full: Vec<String> = keys
            .iter()
            .filter(|key| self.key_fits(key))
            .map(|key| self.full_key(key))
            .collect();
        if full.is_empty() {
            return Ok(0);
        }
        self.run("del", self.backend.del(&full)).await
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        if !self.key_fits(key) {
            return Ok(false);
        }
        self.run("exists", self.backend.exists(&self.full_key(key))).await
    }

    pub async fn expire(&self, key: &str, secs: u64) -> CacheResult<bool> {
        validate_ttl(secs)?;
        if !self.key_fits(key) {
            return Ok(false);
        }
        self.run("expire", self.backend.expire(&self.full_key(key), secs))
            .await
    }

    pub async fn ttl(&self, key: &str) -> CacheResult<i64> {
        if !self.key_fits(key) {
            return Ok(-2);
        }
        self.run("ttl", self.backend.ttl(&self.full_key(key))).await
    }

    /// 一次往返查询多个键的 TTL
    pub async fn ttl_many(&self, keys: &[String]) -> CacheResult<Vec<i64>> {
        let full: Vec<String> = keys
            .iter()
            .filter(|key| self.key_fits(key))
            .map(|key| self.full_key(key))
            .collect();
        let mut ttls = self.run("ttl_many", self.backend.ttl_many(&full)).await?.into_iter();

        Ok(keys
            .iter()
            .map(|key| {
                if self.key_fits(key) {
                    ttls.next().unwrap_or(-2)
                } else {
                    -2
                }
            })
            .collect())
    }

    /// 原子递增窗口计数，首次命中时设置窗口过期，返回 (计数, 当前TTL)
    pub async fn increment_window(&self, key: &str, window_secs: u64) -> CacheResult<(i64, i64)> {
        self.check_key(key)?;
        validate_window(window_secs)?;
        self.run(
            "increment_window",
            self.backend.increment_window(&self.full_key(key), window_secs),
        )
        .await
    }

    // ---------- 集合 ----------

    pub async fn sadd(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        self.check_key(key)?;
        self.run("sadd", self.backend.sadd(&self.full_key(key), members))
            .await
    }

    pub async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if !self.key_fits(key) {
            return Ok(0);
        }
        self.run("srem", self.backend.srem(&self.full_key(key), members))
            .await
    }

    pub async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        if !self.key_fits(key) {
            return Ok(Vec::new());
        }
        self.run("smembers", self.backend.smembers(&self.full_key(key)))
            .await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool> {
        if !self.key_fits(key) {
            return Ok(false);
        }
        self.run(
            "sismember",
            self.backend.sismember(&self.full_key(key), member),
        )
        .await
    }

    // ---------- 哈希 ----------

    pub async fn hset<T: Serialize + ?Sized>(
        &self,
        key: &str,
        field: &str,
        value: &T,
    ) -> CacheResult<bool> {
        self.check_key(key)?;
        let json = serde_json::to_string(value)?;
        self.run("hset", self.backend.hset(&self.full_key(key), field, &json))
            .await
    }

    pub async fn hget<T: DeserializeOwned>(&self, key: &str, field: &str) -> CacheResult<Option<T>> {
        if !self.key_fits(key) {
            return Ok(None);
        }
        match self
            .run("hget", self.backend.hget(&self.full_key(key), field))
            .await?
        {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        if !self.key_fits(key) {
            return Ok(0);
        }
        self.run("hdel", self.backend.hdel(&self.full_key(key), fields))
            .await
    }

    pub async fn hgetall<T: DeserializeOwned>(&self, key: &str) -> CacheResult<HashMap<String, T>> {
        if !self.key_fits(key) {
            return Ok(HashMap::new());
        }
        let raw = self
            .run("hgetall", self.backend.hgetall(&self.full_key(key)))
            .await?;
        raw.into_iter()
            .map(|(field, json)| {
                serde_json::from_str(&json)
                    .map(|value| (field, value))
                    .map_err(CacheError::from)
            })
            .collect()
    }

    // ---------- 模式扫描 ----------

    /// 扫描一页匹配的键（已去掉前缀），游标为 0 表示结束
    pub async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        let full_pattern = self.full_key(pattern);
        let (next, keys) = self
            .run("scan", self.backend.scan_page(cursor, &full_pattern, count))
            .await?;
        Ok((next, keys.into_iter().map(|k| self.strip_prefix(k)).collect()))
    }

    /// 列出匹配模式的全部键
    ///
    /// O(keyspace)，分批 SCAN，只用于账号删除、测试清理之类的低频管理路径。
    pub async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        if !self.key_fits(pattern) {
            return Ok(Vec::new());
        }
        let mut found = BTreeSet::new();
        let mut cursor = 0;
        loop {
            let (next, page) = self
                .scan_page(cursor, pattern, self.config.scan_batch_size)
                .await?;
            found.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(found.into_iter().collect())
    }

    /// 先枚举再分批删除，返回删除数量
    ///
    /// 与 `keys` 一样是 O(keyspace)，不要放在请求热路径上。
    pub async fn delete_by_pattern(&self, pattern: &str) -> CacheResult<u64> {
        if !self.key_fits(pattern) {
            return Ok(0);
        }
        let keys = self.keys(pattern).await?;
        let mut deleted = 0;
        for chunk in keys.chunks(self.config.scan_batch_size.max(1)) {
            deleted += self.del_many(chunk).await?;
        }
        tracing::debug!(pattern, deleted, "deleted keys by pattern");
        Ok(deleted)
    }

    // ---------- 运维 ----------

    pub async fn ping(&self) -> CacheResult<String> {
        self.run("ping", self.backend.ping()).await
    }

    pub async fn stats(&self) -> CacheResult<BackendStats> {
        self.run("stats", self.backend.stats()).await
    }

    /// 清空本前缀下的全部数据；没有前缀时清空整个库
    pub(crate) async fn flush(&self) -> CacheResult<u64> {
        if self.config.key_prefix.is_empty() {
            self.run("flushdb", self.backend.flush_db()).await?;
            Ok(0)
        } else {
            self.delete_by_pattern("*").await
        }
    }
}
