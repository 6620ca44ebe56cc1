//! Unit tests for database initialization and store-level invariants
//!
//! Covers automatic database creation, default settings, and the schema
//! constraints the consent engine relies on (write-once consents, append-only
//! logs, merge pointer checks, Entry uniqueness).

use inkbase_common::db::{ensure_setting, init_database, load_setting_i64};
use sqlx::SqlitePool;
use tempfile::TempDir;

const OWNER: &str = "00000000-0000-0000-0000-0000000000aa";
const NOW: &str = "2024-05-01T10:00:00.000000Z";

async fn fresh_db() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = init_database(&dir.path().join("inkbase.db"))
        .await
        .expect("Database initialization failed");
    (dir, pool)
}

async fn insert_customer(pool: &SqlitePool, guid: &str) {
    sqlx::query(
        "INSERT INTO customers (guid, owner_id, full_name, created_at, updated_at) VALUES (?, ?, 'Taro', ?, ?)",
    )
    .bind(guid)
    .bind(OWNER)
    .bind(NOW)
    .bind(NOW)
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_consent(
    pool: &SqlitePool,
    guid: &str,
    customer: &str,
    origin: &str,
    version: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO customer_consents (
            guid, customer_id, origin, consent_version, signed_at,
            customer_uuid_snapshot, customer_name_snapshot,
            customer_birth_date_snapshot, customer_phone_snapshot,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, 'Taro', '', '', ?, ?)
        "#,
    )
    .bind(guid)
    .bind(customer)
    .bind(origin)
    .bind(version)
    .bind(NOW)
    .bind(customer)
    .bind(NOW)
    .bind(NOW)
    .execute(pool)
    .await
    .map(|_| ())
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("inkbase.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("inkbase.db");

    let pool1 = init_database(&db_path).await;
    assert!(pool1.is_ok());

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let (_dir, pool) = fresh_db().await;

    let ua: Option<String> = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'access_log_user_agent_max_chars'",
    )
    .fetch_optional(&pool)
    .await
    .unwrap();
    assert_eq!(ua.as_deref(), Some("1000"));

    let body = load_setting_i64(&pool, "http_max_body_size_bytes", 0).await.unwrap();
    assert_eq!(body, 10_485_760);
}

#[tokio::test]
async fn test_null_setting_reset_to_default() {
    let (_dir, pool) = fresh_db().await;

    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'access_log_user_agent_max_chars'")
        .execute(&pool)
        .await
        .unwrap();

    ensure_setting(&pool, "access_log_user_agent_max_chars", "1000").await.unwrap();

    let value = load_setting_i64(&pool, "access_log_user_agent_max_chars", 0).await.unwrap();
    assert_eq!(value, 1000);
}

#[tokio::test]
async fn test_load_setting_falls_back_on_garbage() {
    let (_dir, pool) = fresh_db().await;

    sqlx::query("INSERT INTO settings (key, value) VALUES ('odd', 'many')")
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(load_setting_i64(&pool, "odd", 7).await.unwrap(), 7);
    assert_eq!(load_setting_i64(&pool, "missing", 9).await.unwrap(), 9);
}

#[tokio::test]
async fn test_active_customer_cannot_point_at_merge_target() {
    let (_dir, pool) = fresh_db().await;
    insert_customer(&pool, "c-1").await;
    insert_customer(&pool, "c-2").await;

    let active_with_pointer =
        sqlx::query("UPDATE customers SET merged_into = 'c-2' WHERE guid = 'c-1'")
            .execute(&pool)
            .await;
    assert!(active_with_pointer.is_err());

    let self_pointer =
        sqlx::query("UPDATE customers SET is_active = 0, merged_into = 'c-1' WHERE guid = 'c-1'")
            .execute(&pool)
            .await;
    assert!(self_pointer.is_err());

    let merged = sqlx::query("UPDATE customers SET is_active = 0, merged_into = 'c-2' WHERE guid = 'c-1'")
        .execute(&pool)
        .await;
    assert!(merged.is_ok());
}

#[tokio::test]
async fn test_customers_cannot_be_hard_deleted() {
    let (_dir, pool) = fresh_db().await;
    insert_customer(&pool, "c-1").await;

    let result = sqlx::query("DELETE FROM customers WHERE guid = 'c-1'").execute(&pool).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_consent_rows_are_write_once() {
    let (_dir, pool) = fresh_db().await;
    insert_customer(&pool, "c-1").await;
    insert_consent(&pool, "k-1", "c-1", "owner", "v1").await.unwrap();

    let snapshot_edit = sqlx::query(
        "UPDATE customer_consents SET customer_name_snapshot = 'Jiro' WHERE guid = 'k-1'",
    )
    .execute(&pool)
    .await;
    assert!(snapshot_edit.is_err(), "snapshot must not be editable");

    let invalidate = sqlx::query(
        "UPDATE customer_consents SET is_active = 0, updated_at = 'later' WHERE guid = 'k-1'",
    )
    .execute(&pool)
    .await;
    assert!(invalidate.is_ok(), "is_active true→false must be allowed");

    let reactivate = sqlx::query("UPDATE customer_consents SET is_active = 1 WHERE guid = 'k-1'")
        .execute(&pool)
        .await;
    assert!(reactivate.is_err(), "is_active false→true must be rejected");

    let delete = sqlx::query("DELETE FROM customer_consents WHERE guid = 'k-1'")
        .execute(&pool)
        .await;
    assert!(delete.is_err());
}

#[tokio::test]
async fn test_entry_consents_unique_per_version() {
    let (_dir, pool) = fresh_db().await;
    insert_customer(&pool, "c-1").await;

    insert_consent(&pool, "k-1", "c-1", "entry", "v1").await.unwrap();
    assert!(insert_consent(&pool, "k-2", "c-1", "entry", "v1").await.is_err());

    // Renewals and owner submissions may repeat a version
    insert_consent(&pool, "k-3", "c-1", "renew", "v1").await.unwrap();
    insert_consent(&pool, "k-4", "c-1", "renew", "v1").await.unwrap();
    insert_consent(&pool, "k-5", "c-1", "owner", "v1").await.unwrap();

    // A different version is a different Entry
    insert_consent(&pool, "k-6", "c-1", "entry", "v2").await.unwrap();
}

#[tokio::test]
async fn test_unknown_origin_rejected() {
    let (_dir, pool) = fresh_db().await;
    insert_customer(&pool, "c-1").await;

    assert!(insert_consent(&pool, "k-1", "c-1", "import", "v1").await.is_err());
}

#[tokio::test]
async fn test_audit_tables_are_append_only() {
    let (_dir, pool) = fresh_db().await;

    sqlx::query(
        "INSERT INTO customer_merge_logs (guid, keep_uuid, merged_uuid, performed_at) VALUES ('m-1', 'a', 'b', ?)",
    )
    .bind(NOW)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO customer_delete_logs (guid, customer_uuid, performed_at) VALUES ('d-1', 'a', ?)",
    )
    .bind(NOW)
    .execute(&pool)
    .await
    .unwrap();

    for sql in [
        "UPDATE customer_merge_logs SET details = 'x'",
        "DELETE FROM customer_merge_logs",
        "UPDATE customer_delete_logs SET reason = 'x'",
        "DELETE FROM customer_delete_logs",
    ] {
        assert!(sqlx::query(sql).execute(&pool).await.is_err(), "{} should fail", sql);
    }
}
