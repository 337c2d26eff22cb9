mod common;

use std::time::Duration;

use serde_json::{Value, json};
use taskhub_cache::cache::SetOptions;
use taskhub_cache::cache::models::{CachedRefreshToken, CachedSession};

#[tokio::test]
async fn session_lifecycle() {
    let (_, cache) = common::memory_service();
    let sessions = &cache.sessions;

    sessions.store_session("s1", &json!({ "userId": "u1" }), 60).await.unwrap();
    let payload: Option<Value> = sessions.get_session("s1").await;
    assert_eq!(payload, Some(json!({ "userId": "u1" })));

    assert!(sessions.delete_session("s1").await.unwrap());
    assert_eq!(sessions.get_session::<Value>("s1").await, None);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (_, cache) = common::memory_service();
    let session = CachedSession::new("s2", "u1", 60);
    cache.sessions.store_session("s2", &session, 60).await.unwrap();

    assert!(cache.sessions.delete_session("s2").await.unwrap());
    assert!(!cache.sessions.delete_session("s2").await.unwrap());
    assert!(!cache.sessions.delete_session("never-existed").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn sessions_expire_and_can_be_touched() {
    let (_, cache) = common::memory_service();
    let session = CachedSession::new("s3", "u1", 60);
    cache.sessions.store_session("s3", &session, 60).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    assert!(cache.sessions.touch_session("s3", 60).await.unwrap());

    tokio::time::advance(Duration::from_secs(50)).await;
    let cached: Option<CachedSession> = cache.sessions.get_session("s3").await;
    assert_eq!(cached, Some(session));

    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(cache.sessions.get_session::<CachedSession>("s3").await, None);
    assert!(!cache.sessions.touch_session("s3", 60).await.unwrap());
}

#[tokio::test]
async fn user_session_index_is_deduplicated() {
    let (_, cache) = common::memory_service();
    let ids = vec!["s1".to_string(), "s2".to_string(), "s1".to_string()];

    cache.sessions.set_user_sessions("u1", &ids, None).await.unwrap();
    assert_eq!(cache.sessions.get_user_sessions("u1").await, vec!["s1", "s2"]);
    assert!(cache.sessions.get_user_sessions("u2").await.is_empty());
}

#[tokio::test]
async fn refresh_tokens_round_trip() {
    let (_, cache) = common::memory_service();
    let token = CachedRefreshToken::new("rt-1", "u1", 3600);

    cache.tokens.store_refresh_token("rt-1", &token, Some(3600)).await.unwrap();
    let cached: Option<CachedRefreshToken> = cache.tokens.get_refresh_token("rt-1").await;
    assert_eq!(cached, Some(token));

    assert!(cache.tokens.delete_refresh_token("rt-1").await.unwrap());
    assert!(!cache.tokens.delete_refresh_token("rt-1").await.unwrap());
    assert_eq!(cache.tokens.get_refresh_token::<CachedRefreshToken>("rt-1").await, None);
}

#[tokio::test]
async fn ttl_upper_bound_is_enforced() {
    let (_, cache) = common::memory_service();

    let err = cache
        .store
        .set("bounded", &1, SetOptions::ttl(8 * 24 * 3600))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let outcome = cache
        .store
        .set("bounded", &1, SetOptions::ttl(7 * 24 * 3600))
        .await
        .unwrap();
    assert!(outcome.is_written());

    let err = cache.sessions.store_session("s1", &json!({}), 8 * 24 * 3600).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn malformed_ids_are_rejected_on_write_and_missed_on_read() {
    let (_, cache) = common::memory_service();

    let err = cache.sessions.store_session("bad id", &json!({}), 60).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(cache.sessions.get_session::<Value>("session:*").await, None);
}

#[tokio::test]
async fn writes_fail_and_reads_degrade_when_backend_is_down() {
    let (backend, cache) = common::memory_service();
    cache.sessions.store_session("s1", &json!({ "userId": "u1" }), 60).await.unwrap();
    backend.set_available(false);

    let err = cache
        .sessions
        .store_session("s2", &json!({ "userId": "u1" }), 60)
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert!(cache.sessions.delete_session("s1").await.is_err());

    assert_eq!(cache.sessions.get_session::<Value>("s1").await, None);
    assert!(cache.sessions.get_user_sessions("u1").await.is_empty());
    assert_eq!(cache.tokens.get_refresh_token::<Value>("rt-1").await, None);

    backend.set_available(true);
    assert!(cache.sessions.get_session::<Value>("s1").await.is_some());
}
