#![allow(dead_code)]

use std::sync::Arc;

use taskhub_cache::cache::{CacheService, CacheStore, MemoryBackend};
use taskhub_cache::config::Config;

/// 基于内存后端的缓存服务，返回后端句柄以便模拟故障
pub fn memory_service() -> (Arc<MemoryBackend>, CacheService) {
    memory_service_with(Config::default())
}

pub fn memory_service_with(config: Config) -> (Arc<MemoryBackend>, CacheService) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(CacheStore::new(backend.clone(), config));
    (backend, CacheService::new(store))
}
