use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::keys::refresh_token_key;
use crate::cache::redact::fingerprint;
use crate::cache::store::{CacheStore, SetOptions};
use crate::cache::validation::{is_valid_token_id, validate_token_id, validate_ttl};
use crate::error::CacheResult;

/// 刷新令牌缓存操作
///
/// 吊销（登出、轮换）就是删除，没有单独的吊销标记。
#[derive(Clone)]
pub struct TokenCacheOperations {
    store: Arc<CacheStore>,
}

impl TokenCacheOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// 缓存刷新令牌，ttl 缺省时使用配置的刷新令牌有效期
    pub async fn store_refresh_token<T: Serialize + ?Sized>(
        &self,
        token_id: &str,
        data: &T,
        ttl: Option<u64>,
    ) -> CacheResult<()> {
        validate_token_id("refresh token", token_id)?;
        let ttl = validate_ttl(ttl.unwrap_or(self.store.config().refresh_token_ttl_secs))?;

        self.store
            .set(&refresh_token_key(token_id), data, SetOptions::ttl(ttl))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    op = "store_refresh_token",
                    token = %fingerprint(token_id),
                    error = %e,
                    "failed to store refresh token"
                );
            })?;
        Ok(())
    }

    /// 获取刷新令牌
    pub async fn get_refresh_token<T: DeserializeOwned>(&self, token_id: &str) -> Option<T> {
        if !is_valid_token_id(token_id) {
            return None;
        }

        match self.store.get(&refresh_token_key(token_id)).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    op = "get_refresh_token",
                    token = %fingerprint(token_id),
                    error = %e,
                    "refresh token lookup failed, treating as missing"
                );
                None
            }
        }
    }

    /// 删除（吊销）刷新令牌，不存在时返回 false
    pub async fn delete_refresh_token(&self, token_id: &str) -> CacheResult<bool> {
        if !is_valid_token_id(token_id) {
            return Ok(false);
        }

        let deleted = self
            .store
            .del(&refresh_token_key(token_id))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    op = "delete_refresh_token",
                    token = %fingerprint(token_id),
                    error = %e,
                    "failed to revoke refresh token"
                );
            })?;
        Ok(deleted > 0)
    }
}
