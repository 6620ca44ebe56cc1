//! Integration tests for entry token lifecycle

mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use inkbase_common::Error;
use inkbase_cs::db::tokens;
use inkbase_cs::services::public;
use inkbase_cs::services::tokens as token_service;
use uuid::Uuid;

async fn load(pool: &sqlx::SqlitePool, id: Uuid) -> tokens::EntryToken {
    let mut conn = pool.acquire().await.unwrap();
    tokens::load_token(&mut conn, id).await.unwrap().expect("token exists")
}

// =============================================================================
// Issue / reuse
// =============================================================================

#[tokio::test]
async fn test_issue_then_reuse() {
    let db = setup_db().await;
    let owner = new_owner();
    register_artist(&db.pool, &owner, "Hana").await;

    let first = token_service::issue_or_reuse(&db.pool, &owner, Some("door")).await.unwrap();
    assert!(first.was_created());
    let first = first.into_inner();
    assert_eq!(first.expires_at, None);

    let second = token_service::issue_or_reuse(&db.pool, &owner, Some("counter")).await.unwrap();
    assert!(!second.was_created());
    let second = second.into_inner();
    assert_eq!(second.guid, first.guid);
    assert_eq!(second.label, "counter");

    let unlabeled = token_service::issue_or_reuse(&db.pool, &owner, None).await.unwrap().into_inner();
    assert_eq!(unlabeled.label, "counter");
}

#[tokio::test]
async fn test_issue_requires_artist_profile() {
    let db = setup_db().await;
    let owner = new_owner();

    let result = token_service::issue_or_reuse(&db.pool, &owner, None).await;
    assert!(matches!(result, Err(Error::InvalidRequest(_))));

    let rotate = token_service::rotate(&db.pool, &owner, None).await;
    assert!(matches!(rotate, Err(Error::InvalidRequest(_))));
}

#[tokio::test]
async fn test_label_too_long_rejected() {
    let db = setup_db().await;
    let owner = new_owner();
    register_artist(&db.pool, &owner, "Hana").await;

    let label = "x".repeat(101);
    let result = token_service::issue_or_reuse(&db.pool, &owner, Some(&label)).await;
    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

// =============================================================================
// Rotation
// =============================================================================

#[tokio::test]
async fn test_rotate_invalidates_previous_token() {
    let db = setup_db().await;
    let owner = new_owner();
    register_artist(&db.pool, &owner, "Hana").await;

    let old = issue_token(&db.pool, &owner).await;
    let new = token_service::rotate(&db.pool, &owner, Some("new qr")).await.unwrap();
    assert_ne!(old.guid, new.guid);

    let now = Utc::now();
    let old = load(&db.pool, old.guid).await;
    assert_eq!(old.expires_at, None);
    assert!(!old.is_valid_at(&now));
    assert!(load(&db.pool, new.guid).await.is_valid_at(&now));

    let reused = token_service::issue_or_reuse(&db.pool, &owner, None).await.unwrap();
    assert!(!reused.was_created());
    assert_eq!(reused.into_inner().guid, new.guid);
}

#[tokio::test]
async fn test_concurrent_rotations_leave_one_active_token() {
    let db = setup_db().await;
    let owner = new_owner();
    let artist = register_artist(&db.pool, &owner, "Hana").await;
    issue_token(&db.pool, &owner).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pool = db.pool.clone();
        handles.push(tokio::spawn(async move { token_service::rotate(&pool, &owner, None).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let active: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM consent_entry_tokens WHERE artist_id = ? AND is_active = 1")
            .bind(artist.guid.to_string())
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(active, 1);
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_expired_token_is_invalid() {
    let db = setup_db().await;
    let owner = new_owner();
    register_artist(&db.pool, &owner, "Hana").await;
    let token = issue_token(&db.pool, &owner).await;

    let past = Utc::now() - Duration::minutes(5);
    let updated = token_service::set_expiry(&db.pool, &owner, token.guid, Some(past)).await.unwrap();
    assert!(updated.is_active);
    assert!(!updated.is_valid_at(&Utc::now()));

    let status = public::token_status(&db.pool, token.guid).await.unwrap();
    assert!(!status.valid);
    assert_eq!(status.reason, Some("inactive_or_expired"));

    // An expired token is not reused
    let fresh = token_service::issue_or_reuse(&db.pool, &owner, None).await.unwrap();
    assert!(fresh.was_created());

    let cleared = token_service::set_expiry(&db.pool, &owner, token.guid, None).await.unwrap();
    assert!(cleared.is_valid_at(&Utc::now()));
}

#[tokio::test]
async fn test_expiry_boundary_is_inclusive() {
    let now = Utc::now();
    let mut token = tokens::EntryToken::new(Uuid::new_v4(), String::new());
    token.expires_at = Some(now);
    assert!(token.is_valid_at(&now));
    assert!(!token.is_valid_at(&(now + Duration::microseconds(1))));
}

#[tokio::test]
async fn test_set_expiry_on_foreign_token_not_found() {
    let db = setup_db().await;
    let owner = new_owner();
    let other = new_owner();
    register_artist(&db.pool, &owner, "Hana").await;
    register_artist(&db.pool, &other, "Ren").await;
    let token = issue_token(&db.pool, &owner).await;

    let result = token_service::set_expiry(&db.pool, &other, token.guid, None).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn test_token_status() {
    let db = setup_db().await;
    let owner = new_owner();
    let artist = register_artist(&db.pool, &owner, "Hana").await;
    let token = issue_token(&db.pool, &owner).await;

    let status = public::token_status(&db.pool, token.guid).await.unwrap();
    assert!(status.valid);
    assert_eq!(status.reason, None);
    let summary = status.artist.expect("artist summary");
    assert_eq!(summary.uuid, artist.guid);
    assert_eq!(summary.artist_name, "Hana");
    assert_eq!(summary.studio_name, "Studio Sumi");

    let unknown = public::token_status(&db.pool, Uuid::new_v4()).await.unwrap();
    assert!(!unknown.valid);
    assert_eq!(unknown.reason, Some("not_found"));
    assert!(unknown.artist.is_none());
}
