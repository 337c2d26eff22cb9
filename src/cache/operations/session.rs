use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::keys::{session_key, user_sessions_key};
use crate::cache::redact::fingerprint;
use crate::cache::store::{CacheStore, SetOptions};
use crate::cache::validation::{
    is_valid_token_id, is_valid_user_id, validate_token_id, validate_ttl, validate_user_id,
};
use crate::error::CacheResult;

/// 会话缓存操作
///
/// 写和删失败会直接返回错误（丢掉会话写入会让认证状态不一致），
/// 读路径从不报错，未命中、ID 不合法或后端故障都返回空。
#[derive(Clone)]
pub struct SessionCacheOperations {
    store: Arc<CacheStore>,
}

impl SessionCacheOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// 缓存会话
    pub async fn store_session<T: Serialize + ?Sized>(
        &self,
        session_id: &str,
        data: &T,
        ttl: u64,
    ) -> CacheResult<()> {
        validate_token_id("session", session_id)?;
        validate_ttl(ttl)?;

        self.store
            .set(&session_key(session_id), data, SetOptions::ttl(ttl))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    op = "store_session",
                    session = %fingerprint(session_id),
                    error = %e,
                    "failed to store session"
                );
            })?;

        tracing::debug!(session = %fingerprint(session_id), ttl, "session stored");
        Ok(())
    }

    /// 获取会话
    pub async fn get_session<T: DeserializeOwned>(&self, session_id: &str) -> Option<T> {
        if !is_valid_token_id(session_id) {
            return None;
        }

        match self.store.get(&session_key(session_id)).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    op = "get_session",
                    session = %fingerprint(session_id),
                    error = %e,
                    "session lookup failed, treating as missing"
                );
                None
            }
        }
    }

    /// 删除会话，不存在时返回 false
    pub async fn delete_session(&self, session_id: &str) -> CacheResult<bool> {
        if !is_valid_token_id(session_id) {
            return Ok(false);
        }

        let deleted = self
            .store
            .del(&session_key(session_id))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    op = "delete_session",
                    session = %fingerprint(session_id),
                    error = %e,
                    "failed to delete session"
                );
            })?;
        Ok(deleted > 0)
    }

    /// 刷新会话过期时间（活跃续期），会话不存在时返回 false
    pub async fn touch_session(&self, session_id: &str, ttl: u64) -> CacheResult<bool> {
        validate_ttl(ttl)?;
        if !is_valid_token_id(session_id) {
            return Ok(false);
        }

        self.store
            .expire(&session_key(session_id), ttl)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    op = "touch_session",
                    session = %fingerprint(session_id),
                    error = %e,
                    "failed to refresh session ttl"
                );
            })
    }

    /// 覆盖写入用户的活跃会话索引
    ///
    /// 单条 SET 完成，最后写入者生效；重复的ID会被去掉。
    pub async fn set_user_sessions(
        &self,
        user_id: &str,
        session_ids: &[String],
        ttl: Option<u64>,
    ) -> CacheResult<()> {
        validate_user_id(user_id)?;
        for session_id in session_ids {
            validate_token_id("session", session_id)?;
        }
        let ttl = validate_ttl(ttl.unwrap_or(self.store.config().session_ttl_secs))?;

        let mut ids: Vec<&String> = Vec::with_capacity(session_ids.len());
        for session_id in session_ids {
            if !ids.contains(&session_id) {
                ids.push(session_id);
            }
        }

        self.store
            .set(&user_sessions_key(user_id), &ids, SetOptions::ttl(ttl))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    op = "set_user_sessions",
                    user_id,
                    error = %e,
                    "failed to store user session index"
                );
            })?;
        Ok(())
    }

    /// 获取用户的活跃会话ID列表，未命中时返回空列表
    pub async fn get_user_sessions(&self, user_id: &str) -> Vec<String> {
        if !is_valid_user_id(user_id) {
            return Vec::new();
        }

        match self.store.get::<Vec<String>>(&user_sessions_key(user_id)).await {
            Ok(ids) => ids.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(
                    op = "get_user_sessions",
                    user_id,
                    error = %e,
                    "user session index lookup failed"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::MemoryBackend;
    use crate::cache::models::CachedSession;
    use crate::config::Config;

    fn ops() -> (Arc<MemoryBackend>, SessionCacheOperations) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CacheStore::new(backend.clone(), Config::default()));
        (backend, SessionCacheOperations::new(store))
    }

    #[tokio::test]
    async fn lifecycle() {
        let (_, sessions) = ops();
        let session = CachedSession::new("s1", "u1", 60);

        sessions.store_session("s1", &session, 60).await.unwrap();
        assert_eq!(sessions.get_session::<CachedSession>("s1").await, Some(session));

        assert!(sessions.delete_session("s1").await.unwrap());
        assert!(!sessions.delete_session("s1").await.unwrap());
        assert_eq!(sessions.get_session::<CachedSession>("s1").await, None);
    }

    #[tokio::test]
    async fn malformed_ids() {
        let (_, sessions) = ops();
        assert!(sessions.store_session("bad id", &1, 60).await.unwrap_err().is_validation());
        assert_eq!(sessions.get_session::<i32>("bad id").await, None);
        assert!(!sessions.delete_session("session:*").await.unwrap());
    }

    #[tokio::test]
    async fn user_index_defaults_to_empty_and_dedupes() {
        let (_, sessions) = ops();
        assert!(sessions.get_user_sessions("u1").await.is_empty());

        let ids = vec!["s1".to_string(), "s2".to_string(), "s1".to_string()];
        sessions.set_user_sessions("u1", &ids, None).await.unwrap();
        assert_eq!(sessions.get_user_sessions("u1").await, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn writes_fail_and_reads_degrade_when_backend_is_down() {
        let (backend, sessions) = ops();
        sessions.store_session("s1", &1, 60).await.unwrap();
        backend.set_available(false);

        assert!(sessions.store_session("s2", &1, 60).await.unwrap_err().is_unavailable());
        assert!(sessions.delete_session("s1").await.unwrap_err().is_unavailable());
        assert_eq!(sessions.get_session::<i32>("s1").await, None);
        assert!(sessions.get_user_sessions("u1").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_rearms_ttl() {
        let (_, sessions) = ops();
        sessions.store_session("s1", &1, 60).await.unwrap();
        tokio::time::advance(std::time::Duration::from_secs(50)).await;

        assert!(sessions.touch_session("s1", 60).await.unwrap());
        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        assert_eq!(sessions.get_session::<i32>("s1").await, Some(1));
        assert!(!sessions.touch_session("missing", 60).await.unwrap());
    }
}
