use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::CacheBackend;
use crate::cache::models::BackendStats;
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
}

impl Value {
    fn approx_size(&self) -> usize {
        match self {
            Value::Str(s) => s.len(),
            Value::Set(set) => set.iter().map(String::len).sum(),
            Value::Hash(hash) => hash.iter().map(|(k, v)| k.len() + v.len()).sum(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn ttl_secs(&self, now: Instant) -> i64 {
        match self.expires_at {
            None => -1,
            Some(at) => {
                let remaining = at.saturating_duration_since(now).as_millis() as i64;
                (remaining + 999) / 1000
            }
        }
    }
}

type Entries = HashMap<String, Entry>;

fn wrong_type(op: &'static str) -> CacheError {
    CacheError::unavailable(
        op,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )
}

/// 进程内后端
///
/// 语义与 redis 保持一致（TTL、-1/-2、NX、通配符扫描、原子窗口递增），
/// 所有命令在同一把锁内执行。时钟使用 `tokio::time`，测试里可以暂停和快进。
/// `set_available(false)` 用来模拟后端故障。
pub struct MemoryBackend {
    entries: Mutex<Entries>,
    available: AtomicBool,
    connected: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        }
    }

    /// 模拟后端故障 / 恢复
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        if !available {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn run<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Entries, Instant) -> CacheResult<R>,
    ) -> CacheResult<R> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(CacheError::unavailable(op, "memory backend offline"));
        }
        self.connected.store(true, Ordering::SeqCst);

        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| !entry.is_expired(now));
        f(&mut entries, now)
    }
}

/// redis 风格的通配符匹配，支持 `*`、`?` 和 `\` 转义
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
                continue;
            }
            Some('?') => {
                pi += 1;
                ti += 1;
                continue;
            }
            Some('\\') if p.get(pi + 1) == Some(&t[ti]) => {
                pi += 2;
                ti += 1;
                continue;
            }
            Some(c) if *c != '\\' && *c == t[ti] => {
                pi += 1;
                ti += 1;
                continue;
            }
            _ => {}
        }

        match star {
            Some((star_pi, star_ti)) => {
                pi = star_pi + 1;
                ti = star_ti + 1;
                star = Some((star_pi, star_ti + 1));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}

fn string_value<'a>(entries: &'a Entries, key: &str, op: &'static str) -> CacheResult<Option<&'a str>> {
    match entries.get(key) {
        None => Ok(None),
        Some(Entry {
            value: Value::Str(s),
            ..
        }) => Ok(Some(s.as_str())),
        Some(_) => Err(wrong_type(op)),
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_connected(&self) -> bool {
        self.available.load(Ordering::SeqCst) && self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> CacheResult<()> {
        self.run("connect", |_, _| Ok(()))
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.run("get", |entries, _| {
            string_value(entries, key, "get").map(|v| v.map(str::to_string))
        })
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        self.run("mget", |entries, _| {
            Ok(keys
                .iter()
                .map(|key| match entries.get(key) {
                    Some(Entry {
                        value: Value::Str(s),
                        ..
                    }) => Some(s.clone()),
                    _ => None,
                })
                .collect())
        })
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
        nx: bool,
    ) -> CacheResult<bool> {
        self.run("set", |entries, now| {
            if nx && entries.contains_key(key) {
                return Ok(false);
            }
            let entry = Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl_secs.map(|secs| now + Duration::from_secs(secs)),
            };
            entries.insert(key.to_string(), entry);
            Ok(true)
        })
    }

    async fn del(&self, keys: &[String]) -> CacheResult<u64> {
        self.run("del", |entries, _| {
            Ok(keys
                .iter()
                .filter(|key| entries.remove(key.as_str()).is_some())
                .count() as u64)
        })
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.run("exists", |entries, _| Ok(entries.contains_key(key)))
    }

    async fn expire(&self, key: &str, secs: u64) -> CacheResult<bool> {
        self.run("expire", |entries, now| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now + Duration::from_secs(secs));
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.run("ttl", |entries, now| {
            Ok(entries.get(key).map_or(-2, |entry| entry.ttl_secs(now)))
        })
    }

    async fn ttl_many(&self, keys: &[String]) -> CacheResult<Vec<i64>> {
        self.run("ttl_many", |entries, now| {
            Ok(keys
                .iter()
                .map(|key| entries.get(key).map_or(-2, |entry| entry.ttl_secs(now)))
                .collect())
        })
    }

    async fn increment_window(&self, key: &str, window_secs: u64) -> CacheResult<(i64, i64)> {
        self.run("increment_window", |entries, now| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Value::Str("0".to_string())));

            let Value::Str(raw) = &entry.value else {
                return Err(wrong_type("increment_window"));
            };
            let count = raw.parse::<i64>().map_err(|_| {
                CacheError::unavailable(
                    "increment_window",
                    "ERR value is not an integer or out of range",
                )
            })? + 1;
            entry.value = Value::Str(count.to_string());

            if entry.expires_at.is_none() {
                entry.expires_at = Some(now + Duration::from_secs(window_secs));
            }
            Ok((count, entry.ttl_secs(now)))
        })
    }

    async fn sadd(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        self.run("sadd", |entries, _| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
            let Value::Set(set) = &mut entry.value else {
                return Err(wrong_type("sadd"));
            };
            Ok(members.iter().filter(|m| set.insert((*m).clone())).count() as u64)
        })
    }

    async fn srem(&self, key: &str, members: &[String]) -> CacheResult<u64> {
        self.run("srem", |entries, _| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(0);
            };
            let Value::Set(set) = &mut entry.value else {
                return Err(wrong_type("srem"));
            };
            let removed = members.iter().filter(|m| set.remove(m.as_str())).count() as u64;
            if set.is_empty() {
                entries.remove(key);
            }
            Ok(removed)
        })
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        self.run("smembers", |entries, _| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type("smembers")),
        })
    }

    async fn sismember(&self, key: &str, member: &str) -> CacheResult<bool> {
        self.run("sismember", |entries, _| match entries.get(key) {
            None => Ok(false),
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type("sismember")),
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<bool> {
        self.run("hset", |entries, _| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
            let Value::Hash(hash) = &mut entry.value else {
                return Err(wrong_type("hset"));
            };
            Ok(hash.insert(field.to_string(), value.to_string()).is_none())
        })
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        self.run("hget", |entries, _| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.get(field).cloned()),
            Some(_) => Err(wrong_type("hget")),
        })
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> CacheResult<u64> {
        self.run("hdel", |entries, _| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(0);
            };
            let Value::Hash(hash) = &mut entry.value else {
                return Err(wrong_type("hdel"));
            };
            let removed = fields.iter().filter(|f| hash.remove(f.as_str()).is_some()).count() as u64;
            if hash.is_empty() {
                entries.remove(key);
            }
            Ok(removed)
        })
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.run("hgetall", |entries, _| match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(hash.clone()),
            Some(_) => Err(wrong_type("hgetall")),
        })
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> CacheResult<(u64, Vec<String>)> {
        self.run("scan", |entries, _| {
            let mut matching: Vec<&String> = entries
                .keys()
                .filter(|key| glob_match(pattern, key))
                .collect();
            matching.sort();

            let start = cursor as usize;
            let page: Vec<String> = matching
                .iter()
                .skip(start)
                .take(count.max(1))
                .map(|key| (*key).clone())
                .collect();

            let next = start + page.len();
            let next_cursor = if next >= matching.len() { 0 } else { next as u64 };
            Ok((next_cursor, page))
        })
    }

    async fn ping(&self) -> CacheResult<String> {
        self.run("ping", |_, _| Ok("PONG".to_string()))
    }

    async fn stats(&self) -> CacheResult<BackendStats> {
        self.run("stats", |entries, _| {
            let bytes: usize = entries
                .iter()
                .map(|(key, entry)| key.len() + entry.value.approx_size())
                .sum();
            Ok(BackendStats {
                key_count: Some(entries.len() as u64),
                memory_used_bytes: Some(bytes as u64),
                memory_human: Some(format!("{:.2}K", bytes as f64 / 1024.0)),
            })
        })
    }

    async fn flush_db(&self) -> CacheResult<()> {
        self.run("flushdb", |entries, _| {
            entries.clear();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_patterns() {
        assert!(glob_match("session:*", "session:abc"));
        assert!(glob_match("session:*", "session:"));
        assert!(!glob_match("session:*", "refresh:abc"));
        assert!(glob_match("user:u1:*", "user:u1:profile"));
        assert!(!glob_match("user:u1:*", "user:u10:profile"));
        assert!(glob_match("a?c", "abc"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("x\\*y", "x*y"));
        assert!(!glob_match("x\\*y", "xzy"));
        assert!(glob_match("*:profile", "user:u1:profile"));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_expire_on_the_tokio_clock() {
        let backend = MemoryBackend::new();
        assert!(backend.set("k", "v", Some(5), false).await.unwrap());
        assert_eq!(backend.ttl("k").await.unwrap(), 5);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert_eq!(backend.ttl("k").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn nx_does_not_overwrite() {
        let backend = MemoryBackend::new();
        assert!(backend.set("k", "first", None, true).await.unwrap());
        assert!(!backend.set("k", "second", None, true).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("first"));
        assert_eq!(backend.ttl("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn wrong_type_is_reported() {
        let backend = MemoryBackend::new();
        backend.sadd("s", &["a".to_string()]).await.unwrap();
        let err = backend.get("s").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn scan_pages_cover_all_matches() {
        let backend = MemoryBackend::new();
        for i in 0..25 {
            backend.set(&format!("session:{i:02}"), "{}", None, false).await.unwrap();
        }
        backend.set("refresh:x", "{}", None, false).await.unwrap();

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let (next, page) = backend.scan_page(cursor, "session:*", 10).await.unwrap();
            assert!(page.len() <= 10);
            seen.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn offline_backend_fails_every_command() {
        let backend = MemoryBackend::new();
        backend.set_available(false);
        assert!(backend.ping().await.unwrap_err().is_unavailable());
        assert!(!backend.is_connected());
        backend.set_available(true);
        assert_eq!(backend.ping().await.unwrap(), "PONG");
        assert!(backend.is_connected());
    }
}
