//! 键值后端抽象
//!
//! `CacheBackend` 只暴露原始命令（值都是字符串），键校验、前缀、序列化和超时
//! 都由上层的 `CacheStore` 负责。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::models::BackendStats;
use crate::config::Config;
use crate::error::CacheResult;

mod memory;
mod redis_backend;

pub use self::memory::MemoryBackend;
pub use self::redis_backend::RedisBackend;

/// 原子递增计数器并在首次命中时设置窗口过期的 Lua 脚本
///
/// 递增、读 TTL、设置过期在同一个脚本里执行，并发的首次命中不会重复设置窗口。
pub(crate) const WINDOW_INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
local ttl = redis.call('TTL', KEYS[1])
if ttl == -1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_connected(&self) -> bool;

    async fn connect(&self) -> CacheResult<()>;

    async fn disconnect(&self);

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    /// 返回是否真正写入（nx 且键已存在时为 false）
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>, nx: bool)
    -> CacheResult<bool>;

    async fn del(&self, keys: &[String]) -> CacheResult<u64>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn expire(&self, key: &str, secs: u64) -> CacheResult<bool>;

    /// -2 表示键不存在，-1 表示没有过期时间
    async fn ttl(&self, key: &str) -> CacheResult<i64>;

    /// 一次往返查询多个键的 TTL，顺序与输入一致
    async fn ttl_many(&self, keys: &[String]) -> CacheResult<Vec<i64>>;

    /// 原子递增，并在键没有过期时间时设置为 `window_secs`，返回 (计数, 当前TTL)
    async fn increment_window(&self, key: &str, window_secs: u64) -> CacheResult<(i64, i64)>;

    async fn sadd(&self, key: &str, members: &[String]) -> CacheResult<u64>;

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64>;

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool>;

    /// 返回字段是否为新建
    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<bool>;

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>>;

    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64>;

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// 游标式扫描一页，返回 (下一个游标, 本页键)，游标为 0 表示扫描结束
    async fn scan_page(&self, cursor: u64, pattern: &str, count: usize)
    -> CacheResult<(u64, Vec<String>)>;

    async fn ping(&self) -> CacheResult<String>;

    async fn stats(&self) -> CacheResult<BackendStats>;

    async fn flush_db(&self) -> CacheResult<()>;
}

/// 按配置的 URL 选择后端：`memory://` 使用进程内后端，其余交给 redis
pub fn from_config(config: &Config) -> CacheResult<Arc<dyn CacheBackend>> {
    if config.redis_url.starts_with("memory://") {
        tracing::warn!("using in-process memory cache backend; data is not shared across instances");
        Ok(Arc::new(MemoryBackend::new()))
    } else {
        Ok(Arc::new(RedisBackend::new(config)?))
    }
}
