use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::keys::user_profile_key;
use crate::cache::store::{CacheStore, SetOptions};
use crate::cache::validation::{is_valid_user_id, validate_ttl, validate_user_id};
use crate::error::CacheResult;

/// 用户资料缓存操作
///
/// 资料缓存是可选的：后端故障时读返回 None、写只记日志。
/// 资料写入数据库后由调用方负责调用 `delete_user_profile` 失效。
#[derive(Clone)]
pub struct UserCacheOperations {
    store: Arc<CacheStore>,
}

impl UserCacheOperations {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// 缓存用户资料，ttl 缺省时使用配置的资料缓存时长
    pub async fn set_user_profile<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        profile: &T,
        ttl: Option<u64>,
    ) -> CacheResult<()> {
        validate_user_id(user_id)?;
        let ttl = validate_ttl(ttl.unwrap_or(self.store.config().profile_ttl_secs))?;

        match self
            .store
            .set(&user_profile_key(user_id), profile, SetOptions::ttl(ttl))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_unavailable() => {
                tracing::warn!(op = "set_user_profile", user_id, error = %e, "profile cache write skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// 从缓存获取用户资料
    pub async fn get_user_profile<T: DeserializeOwned>(&self, user_id: &str) -> Option<T> {
        if !is_valid_user_id(user_id) {
            return None;
        }

        match self.store.get(&user_profile_key(user_id)).await {
            Ok(profile) => {
                tracing::debug!(user_id, hit = profile.is_some(), "profile cache lookup");
                profile
            }
            Err(e) => {
                tracing::warn!(op = "get_user_profile", user_id, error = %e, "profile cache lookup failed");
                None
            }
        }
    }

    /// 从缓存中删除用户资料
    pub async fn delete_user_profile(&self, user_id: &str) -> bool {
        if !is_valid_user_id(user_id) {
            return false;
        }

        match self.store.del(&user_profile_key(user_id)).await {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                tracing::error!(op = "delete_user_profile", user_id, error = %e, "profile invalidation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::MemoryBackend;
    use crate::cache::models::CachedUserProfile;
    use crate::config::Config;

    fn ops() -> (Arc<MemoryBackend>, UserCacheOperations) {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(CacheStore::new(backend.clone(), Config::default()));
        (backend, UserCacheOperations::new(store))
    }

    #[tokio::test]
    async fn profile_round_trip_and_invalidation() {
        let (_, profiles) = ops();
        let profile = CachedUserProfile {
            user_id: "u1".into(),
            email: "a@b.com".into(),
            name: Some("A".into()),
            avatar: None,
            updated_at: 0,
        };

        profiles.set_user_profile("u1", &profile, None).await.unwrap();
        assert_eq!(profiles.get_user_profile::<CachedUserProfile>("u1").await, Some(profile));
        assert!(profiles.delete_user_profile("u1").await);
        assert!(!profiles.delete_user_profile("u1").await);
        assert_eq!(profiles.get_user_profile::<CachedUserProfile>("u1").await, None);
    }

    #[tokio::test]
    async fn outage_never_fails_the_caller() {
        let (backend, profiles) = ops();
        backend.set_available(false);
        assert!(profiles.set_user_profile("u1", &"x", None).await.is_ok());
        assert_eq!(profiles.get_user_profile::<String>("u1").await, None);
        assert!(!profiles.delete_user_profile("u1").await);
    }

    #[tokio::test]
    async fn validation_still_applies() {
        let (_, profiles) = ops();
        assert!(profiles.set_user_profile("u*", &"x", None).await.unwrap_err().is_validation());
        assert!(profiles
            .set_user_profile("u1", &"x", Some(8 * 24 * 3600))
            .await
            .unwrap_err()
            .is_validation());
    }
}
