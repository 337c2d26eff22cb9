// 缓存模块
// 包含缓存数据结构、后端适配和各类缓存操作

pub mod backend;
pub mod keys;
pub mod models;
pub mod operations;
pub mod redact;
pub mod service;
pub mod store;
pub mod validation;

// 重新导出常用类型和函数，方便其他模块使用
pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use service::CacheService;
pub use store::{CacheStore, SetOptions, SetOutcome};
