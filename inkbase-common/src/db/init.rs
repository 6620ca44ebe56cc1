//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas and
//! creates every table, index and trigger idempotently. The schema itself
//! carries the invariants the engine relies on:
//!
//! - an active customer never points at a merge target
//! - a public Entry signs a given consent version at most once per customer
//! - consent rows are write-once apart from the `is_active` true→false flip
//! - audit and access-log rows are append-only
//! - customers are never hard-deleted

use crate::db::settings::{ensure_setting, ACCESS_LOG_USER_AGENT_MAX_CHARS, HTTP_MAX_BODY_SIZE_BYTES};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// SQLite busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table, index and trigger (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_artists_table(pool).await?;
    create_customers_table(pool).await?;
    create_customer_consents_table(pool).await?;
    create_consent_entry_tokens_table(pool).await?;
    create_consent_access_logs_table(pool).await?;
    create_audit_tables(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores application configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, ACCESS_LOG_USER_AGENT_MAX_CHARS, "1000").await?;
    ensure_setting(pool, HTTP_MAX_BODY_SIZE_BYTES, "10485760").await?; // 10 MiB

    info!("Default settings initialized");
    Ok(())
}

async fn create_artists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artists (
            guid TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL UNIQUE,
            artist_name TEXT NOT NULL,
            studio_name TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the customers table
///
/// `merged_into` is a key reference to the surviving customer, never a chain:
/// the merge engine rewrites every pointer at the losing side in the same
/// transaction that deactivates it.
async fn create_customers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            guid TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            full_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name_kana TEXT NOT NULL DEFAULT '',
            first_name_kana TEXT NOT NULL DEFAULT '',
            gender TEXT NOT NULL DEFAULT '',
            birth_date TEXT,
            prefecture TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            phone_number TEXT NOT NULL DEFAULT '',
            instagram_id TEXT NOT NULL DEFAULT '',
            avatar_url TEXT,
            notes TEXT NOT NULL DEFAULT '',
            skin_type TEXT NOT NULL DEFAULT '',
            tattoo_experience INTEGER NOT NULL DEFAULT 0,
            occupation TEXT NOT NULL DEFAULT '',
            referrer TEXT NOT NULL DEFAULT '',
            mbti TEXT NOT NULL DEFAULT '',
            tattooist TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            merged_into TEXT REFERENCES customers(guid),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (is_active = 0 OR merged_into IS NULL),
            CHECK (merged_into IS NULL OR merged_into <> guid)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_customers_owner_phone ON customers(owner_id, phone_number)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_customers_merged_into ON customers(merged_into)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_customers_no_delete
        BEFORE DELETE ON customers
        BEGIN
            SELECT RAISE(ABORT, 'customers are soft-deleted only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the consent ledger
///
/// `origin` records which path signed the row. Only public Entry rows are
/// unique per (customer, version); renewals and owner submissions are
/// distinct signing events by definition.
async fn create_customer_consents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customer_consents (
            guid TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL REFERENCES customers(guid),
            origin TEXT NOT NULL CHECK (origin IN ('owner', 'entry', 'renew')),
            consent_version TEXT NOT NULL,
            privacy_agreement_version TEXT NOT NULL DEFAULT '',
            signature TEXT,
            signed_at TEXT NOT NULL,
            privacy_agreement_agreed_at TEXT,
            visit_date TEXT,
            customer_uuid_snapshot TEXT NOT NULL,
            customer_name_snapshot TEXT NOT NULL,
            customer_birth_date_snapshot TEXT NOT NULL,
            customer_phone_snapshot TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_consents_customer ON customer_consents(customer_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_consents_signed_at ON customer_consents(signed_at)")
        .execute(pool)
        .await?;
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_consents_entry_version
        ON customer_consents(customer_id, consent_version)
        WHERE origin = 'entry'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_consents_write_once
        BEFORE UPDATE ON customer_consents
        WHEN NEW.guid IS NOT OLD.guid
          OR NEW.customer_id IS NOT OLD.customer_id
          OR NEW.origin IS NOT OLD.origin
          OR NEW.consent_version IS NOT OLD.consent_version
          OR NEW.privacy_agreement_version IS NOT OLD.privacy_agreement_version
          OR NEW.signature IS NOT OLD.signature
          OR NEW.signed_at IS NOT OLD.signed_at
          OR NEW.privacy_agreement_agreed_at IS NOT OLD.privacy_agreement_agreed_at
          OR NEW.visit_date IS NOT OLD.visit_date
          OR NEW.customer_uuid_snapshot IS NOT OLD.customer_uuid_snapshot
          OR NEW.customer_name_snapshot IS NOT OLD.customer_name_snapshot
          OR NEW.customer_birth_date_snapshot IS NOT OLD.customer_birth_date_snapshot
          OR NEW.customer_phone_snapshot IS NOT OLD.customer_phone_snapshot
          OR NEW.created_at IS NOT OLD.created_at
          OR NEW.is_active > OLD.is_active
        BEGIN
            SELECT RAISE(ABORT, 'customer_consents rows are write-once');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_consents_no_delete
        BEFORE DELETE ON customer_consents
        BEGIN
            SELECT RAISE(ABORT, 'customer_consents rows cannot be deleted');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_consent_entry_tokens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consent_entry_tokens (
            guid TEXT PRIMARY KEY,
            artist_id TEXT NOT NULL REFERENCES artists(guid),
            label TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            expires_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_used_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tokens_artist ON consent_entry_tokens(artist_id, is_active)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_consent_access_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS consent_access_logs (
            guid TEXT PRIMARY KEY,
            token_id TEXT NOT NULL REFERENCES consent_entry_tokens(guid),
            ip_address TEXT NOT NULL,
            user_agent TEXT NOT NULL DEFAULT '',
            customer_phone TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_access_logs_token ON consent_access_logs(token_id, created_at)")
        .execute(pool)
        .await?;

    append_only(pool, "consent_access_logs").await
}

async fn create_audit_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customer_merge_logs (
            guid TEXT PRIMARY KEY,
            keep_uuid TEXT NOT NULL,
            merged_uuid TEXT NOT NULL,
            performed_by TEXT,
            performed_at TEXT NOT NULL,
            overwrite INTEGER NOT NULL DEFAULT 0,
            details TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customer_delete_logs (
            guid TEXT PRIMARY KEY,
            customer_uuid TEXT NOT NULL,
            performed_by TEXT,
            performed_at TEXT NOT NULL,
            reason TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    append_only(pool, "customer_merge_logs").await?;
    append_only(pool, "customer_delete_logs").await
}

/// Reject UPDATE and DELETE on a log table
async fn append_only(pool: &SqlitePool, table: &str) -> Result<()> {
    for op in ["UPDATE", "DELETE"] {
        let sql = format!(
            "CREATE TRIGGER IF NOT EXISTS trg_{table}_no_{lower} \
             BEFORE {op} ON {table} \
             BEGIN SELECT RAISE(ABORT, '{table} is append-only'); END",
            table = table,
            op = op,
            lower = op.to_lowercase(),
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    Ok(())
}
