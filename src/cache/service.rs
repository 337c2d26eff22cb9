use std::sync::Arc;

use super::operations::{
    HealthCacheOperations, LoginAttemptOperations, MaintenanceOperations,
    RateLimitCacheOperations, SessionCacheOperations, TokenCacheOperations, UserCacheOperations,
};
use super::store::CacheStore;
use crate::config::Config;
use crate::error::CacheResult;

/// 缓存层对外的全部能力
///
/// 各子组件共享同一个 `CacheStore`，由调用方显式构造后注入（例如放进 axum 的状态里）。
#[derive(Clone)]
pub struct CacheService {
    pub store: Arc<CacheStore>,
    pub sessions: SessionCacheOperations,
    pub tokens: TokenCacheOperations,
    pub rate_limits: RateLimitCacheOperations,
    pub login_attempts: LoginAttemptOperations,
    pub profiles: UserCacheOperations,
    pub maintenance: MaintenanceOperations,
    pub health: HealthCacheOperations,
}

impl CacheService {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            sessions: SessionCacheOperations::new(store.clone()),
            tokens: TokenCacheOperations::new(store.clone()),
            rate_limits: RateLimitCacheOperations::new(store.clone()),
            login_attempts: LoginAttemptOperations::new(store.clone()),
            profiles: UserCacheOperations::new(store.clone()),
            maintenance: MaintenanceOperations::new(store.clone()),
            health: HealthCacheOperations::new(store.clone()),
            store,
        }
    }

    pub fn from_config(config: Config) -> CacheResult<Self> {
        Ok(Self::new(Arc::new(CacheStore::from_config(config)?)))
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }
}
