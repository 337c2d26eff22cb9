mod common;

use std::time::Duration;

use serde_json::{Value, json};
use taskhub_cache::cache::models::CachedUserProfile;
use taskhub_cache::config::Config;

#[tokio::test]
async fn login_throttling() {
    let (_, cache) = common::memory_service();
    let attempts = &cache.login_attempts;

    for expected in 1..=5 {
        assert_eq!(attempts.record_login_attempt("a@b.com").await.unwrap(), expected);
    }
    assert!(attempts.is_login_locked("a@b.com").await);

    assert!(attempts.clear_login_attempts("a@b.com").await);
    assert_eq!(attempts.get_login_attempts("a@b.com").await, 0);
    assert!(!attempts.is_login_locked("a@b.com").await);
}

#[tokio::test]
async fn login_attempts_are_keyed_by_normalized_email() {
    let (_, cache) = common::memory_service();
    let attempts = &cache.login_attempts;

    attempts.record_login_attempt("User@Example.com").await.unwrap();
    attempts.record_login_attempt(" user@example.com ").await.unwrap();
    assert_eq!(attempts.get_login_attempts("USER@example.COM").await, 2);

    assert!(attempts.record_login_attempt("not-an-email").await.unwrap_err().is_validation());
    assert_eq!(attempts.get_login_attempts("not-an-email").await, 0);
}

#[tokio::test(start_paused = true)]
async fn login_attempts_reset_after_window() {
    let config = Config {
        login_attempt_window_secs: 60,
        ..Config::default()
    };
    let (_, cache) = common::memory_service_with(config);

    cache.login_attempts.record_login_attempt("a@b.com").await.unwrap();
    cache.login_attempts.record_login_attempt("a@b.com").await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(cache.login_attempts.get_login_attempts("a@b.com").await, 0);
    assert_eq!(cache.login_attempts.record_login_attempt("a@b.com").await.unwrap(), 1);
}

#[tokio::test]
async fn login_attempt_reads_degrade_to_zero() {
    let (backend, cache) = common::memory_service();
    cache.login_attempts.record_login_attempt("a@b.com").await.unwrap();
    backend.set_available(false);

    assert_eq!(cache.login_attempts.get_login_attempts("a@b.com").await, 0);
    assert!(!cache.login_attempts.is_login_locked("a@b.com").await);
    assert!(!cache.login_attempts.clear_login_attempts("a@b.com").await);
    assert!(cache.login_attempts.record_login_attempt("a@b.com").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn profile_round_trip_and_expiry() {
    let (_, cache) = common::memory_service();

    cache.profiles.set_user_profile("u1", &json!({ "name": "A" }), Some(30)).await.unwrap();
    let profile: Option<Value> = cache.profiles.get_user_profile("u1").await;
    assert_eq!(profile, Some(json!({ "name": "A" })));

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(cache.profiles.get_user_profile::<Value>("u1").await, None);
}

#[tokio::test]
async fn typed_profile_uses_configured_ttl() {
    let (_, cache) = common::memory_service();
    let profile = CachedUserProfile {
        user_id: "u1".to_string(),
        email: "a@b.com".to_string(),
        name: Some("A".to_string()),
        avatar: None,
        updated_at: 1_700_000_000,
    };

    cache.profiles.set_user_profile("u1", &profile, None).await.unwrap();
    assert_eq!(cache.profiles.get_user_profile("u1").await, Some(profile));

    let ttl = cache
        .store
        .ttl(&taskhub_cache::cache::keys::user_profile_key("u1"))
        .await
        .unwrap();
    assert!(ttl > 0 && ttl <= cache.config().profile_ttl_secs as i64);

    assert!(cache.profiles.delete_user_profile("u1").await);
    assert!(!cache.profiles.delete_user_profile("u1").await);
}

#[tokio::test]
async fn profile_writes_are_skipped_when_backend_is_down() {
    let (backend, cache) = common::memory_service();
    backend.set_available(false);

    cache.profiles.set_user_profile("u1", &json!({ "name": "A" }), None).await.unwrap();
    assert_eq!(cache.profiles.get_user_profile::<Value>("u1").await, None);

    let err = cache
        .profiles
        .set_user_profile("u1", &json!({}), Some(8 * 24 * 3600))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}
