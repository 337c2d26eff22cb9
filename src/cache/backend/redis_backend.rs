use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client as RedisClient, RedisResult, Script};
use tokio::sync::RwLock;

use super::{CacheBackend, WINDOW_INCREMENT_SCRIPT};
use crate::cache::models::BackendStats;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};

/// Redis 后端
///
/// 连接在第一次使用时建立（`ConnectionManager` 自带断线重连和指数退避），
/// 连接状态的变化会记录日志，供健康检查和维护任务判断。
pub struct RedisBackend {
    client: RedisClient,
    manager: RwLock<Option<ConnectionManager>>,
    connected: AtomicBool,
    connect_timeout: Duration,
    response_timeout: Duration,
    max_retries: usize,
    window_script: Script,
}

impl RedisBackend {
    pub fn new(config: &Config) -> CacheResult<Self> {
        let client = RedisClient::open(config.redis_url.as_str())
            .map_err(|e| CacheError::redis("open", e))?;

        Ok(Self {
            client,
            manager: RwLock::new(None),
            connected: AtomicBool::new(false),
            connect_timeout: config.connect_timeout(),
            response_timeout: config.command_timeout(),
            max_retries: config.max_retries,
            window_script: Script::new(WINDOW_INCREMENT_SCRIPT),
        })
    }

    fn mark(&self, up: bool) {
        let was = self.connected.swap(up, Ordering::SeqCst);
        if was != up {
            if up {
                tracing::info!("redis connection established");
            } else {
                tracing::warn!("redis connection lost");
            }
        }
    }

    /// 统一处理命令结果：更新连接状态并转换错误
    fn track<T>(&self, op: &'static str, result: RedisResult<T>) -> CacheResult<T> {
        match result {
            Ok(value) => {
                self.mark(true);
                Ok(value)
            }
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
                    self.mark(false);
                }
                Err(CacheError::redis(op, e))
            }
        }
    }

    async fn conn(&self) -> CacheResult<ConnectionManager> {
        if let Some(manager) = self.manager.read().await.as_ref() {
            return Ok(manager.clone());
        }

        self.connect().await?;

        self.manager
            .read()
            .await
            .clone()
            .ok_or_else(|| CacheError::unavailable("connect", "connection closed"))
    }
}

fn parse_info_field<'a>(info: &'a str, field: &str) -> Option<&'a str> {
    info.lines().find_map(|line| {
        line.strip_prefix(field)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
    })
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> CacheResult<()> {
        let mut guard = self.manager.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(self.max_retries)
            .set_connection_timeout(self.connect_timeout)
            .set_response_timeout(self.response_timeout);

        match self.client.get_connection_manager_with_config(config).await {
            Ok(manager) => {
                *guard = Some(manager);
                self.mark(true);
                Ok(())
            }
            Err(e) => {
                self.mark(false);
                tracing::error!(error = %e, "failed to connect to redis");
                Err(CacheError::redis("connect", e))
            }
        }
    }

    async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        if guard.take().is_some() {
            tracing::info!("redis connection closed");
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        let result: RedisResult<Option<String>> = conn.get(key).await;
        self.track("get", result)
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let result: RedisResult<Vec<Option<String>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await;
        self.track("mget", result)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
        nx: bool,
    ) -> CacheResult<bool> {
        let mut conn = self.conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl_secs {
            cmd.arg("EX").arg(ttl);
        }
        if nx {
            cmd.arg("NX");
        }

        // NX 条件不满足时返回 nil
        let result: RedisResult<Option<String>> = cmd.query_async(&mut conn).await;
        self.track("set", result).map(|reply| reply.is_some())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let result: RedisResult<u64> = conn.del(keys).await;
        self.track("del", result)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let result: RedisResult<bool> = conn.exists(key).await;
        self.track("exists", result)
    }

    async fn expire(&self, key: &str, secs: u64) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let result: RedisResult<bool> = conn.expire(key, secs as i64).await;
        self.track("expire", result)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        let result: RedisResult<i64> = conn.ttl(key).await;
        self.track("ttl", result)
    }

    async fn ttl_many(&self, keys: &[String]) -> CacheResult<Vec<i64>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.cmd("TTL").arg(key);
        }
        let result: RedisResult<Vec<i64>> = pipe.query_async(&mut conn).await;
        self.track("ttl_many", result)
    }

    async fn increment_window(&self, key: &str, window_secs: u64) -> CacheResult<(i64, i64)> {
        let mut conn = self.conn().await?;
        let result: RedisResult<(i64, i64)> = self
            .window_script
            .key(key)
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await;
        self.track("increment_window", result)
    }

    async fn sadd(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let result: RedisResult<u64> = conn.sadd(key, members).await;
        self.track("sadd", result)
    }

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let result: RedisResult<u64> = conn.srem(key, members).await;
        self.track("srem", result)
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let result: RedisResult<Vec<String>> = conn.smembers(key).await;
        self.track("smembers", result)
    }

    async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let result: RedisResult<bool> = conn.sismember(key, member).await;
        self.track("sismember", result)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let result: RedisResult<u64> = conn.hset(key, field, value).await;
        self.track("hset", result).map(|added| added > 0)
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        let result: RedisResult<Option<String>> = conn.hget(key, field).await;
        self.track("hget", result)
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let result: RedisResult<u64> = conn.hdel(key, fields).await;
        self.track("hdel", result)
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        let result: RedisResult<HashMap<String, String>> = conn.hgetall(key).await;
        self.track("hgetall", result)
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        let mut conn = self.conn().await?;
        let result: RedisResult<(u64, Vec<String>)> = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await;
        self.track("scan", result)
    }

    async fn ping(&self) -> CacheResult<String> {
        let mut conn = self.conn().await?;
        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        self.track("ping", result)
    }

    async fn stats(&self) -> CacheResult<BackendStats> {
        let mut conn = self.conn().await?;

        let key_count: RedisResult<u64> = redis::cmd("DBSIZE").query_async(&mut conn).await;
        let key_count = self.track("dbsize", key_count)?;

        let info: RedisResult<String> = redis::cmd("INFO").arg("memory").query_async(&mut conn).await;
        let info = self.track("info", info)?;

        Ok(BackendStats {
            key_count: Some(key_count),
            memory_used_bytes: parse_info_field(&info, "used_memory").and_then(|v| v.parse().ok()),
            memory_human: parse_info_field(&info, "used_memory_human").map(str::to_string),
        })
    }

    async fn flush_db(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let result: RedisResult<()> = redis::cmd("FLUSHDB").query_async(&mut conn).await;
        self.track("flushdb", result)
    }
}
