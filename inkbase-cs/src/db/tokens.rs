//! Entry token persistence

use chrono::{DateTime, Utc};
use inkbase_common::{time, uuid_utils, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Capability token that lets a public client sign for one artist's owner
#[derive(Debug, Clone, Serialize)]
pub struct EntryToken {
    #[serde(rename = "token_uuid")]
    pub guid: Uuid,
    #[serde(rename = "artist_uuid")]
    pub artist_id: Uuid,
    pub label: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl EntryToken {
    /// New active token without expiry
    pub fn new(artist_id: Uuid, label: String) -> Self {
        let now = time::now();
        Self {
            guid: uuid_utils::generate(),
            artist_id,
            label,
            is_active: true,
            expires_at: None,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }

    /// Active and not past its expiry
    ///
    /// Expired is derived from `expires_at`, never persisted.
    pub fn is_valid_at(&self, now: &DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires >= *now)
    }
}

const TOKEN_COLUMNS: &str =
    "guid, artist_id, label, is_active, expires_at, created_at, updated_at, last_used_at";

fn token_from_row(row: &SqliteRow) -> Result<EntryToken> {
    let guid: String = row.try_get("guid")?;
    let artist_id: String = row.try_get("artist_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(EntryToken {
        guid: uuid_utils::from_db("consent_entry_tokens.guid", &guid)?,
        artist_id: uuid_utils::from_db("consent_entry_tokens.artist_id", &artist_id)?,
        label: row.try_get("label")?,
        is_active: row.try_get("is_active")?,
        expires_at: time::from_db_opt("consent_entry_tokens.expires_at", row.try_get("expires_at")?)?,
        created_at: time::from_db("consent_entry_tokens.created_at", &created_at)?,
        updated_at: time::from_db("consent_entry_tokens.updated_at", &updated_at)?,
        last_used_at: time::from_db_opt("consent_entry_tokens.last_used_at", row.try_get("last_used_at")?)?,
    })
}

pub async fn insert_token(conn: &mut SqliteConnection, token: &EntryToken) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO consent_entry_tokens ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        TOKEN_COLUMNS
    ))
    .bind(token.guid.to_string())
    .bind(token.artist_id.to_string())
    .bind(&token.label)
    .bind(token.is_active)
    .bind(token.expires_at.as_ref().map(time::to_db))
    .bind(time::to_db(&token.created_at))
    .bind(time::to_db(&token.updated_at))
    .bind(token.last_used_at.as_ref().map(time::to_db))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn load_token(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<EntryToken>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM consent_entry_tokens WHERE guid = ?",
        TOKEN_COLUMNS
    ))
    .bind(guid.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(token_from_row).transpose()
}

/// Earliest-created token of the artist that is valid at `now`
pub async fn earliest_valid_token(
    conn: &mut SqliteConnection,
    artist_id: Uuid,
    now: &DateTime<Utc>,
) -> Result<Option<EntryToken>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM consent_entry_tokens
        WHERE artist_id = ? AND is_active = 1 AND (expires_at IS NULL OR expires_at >= ?)
        ORDER BY created_at ASC
        LIMIT 1
        "#,
        TOKEN_COLUMNS
    ))
    .bind(artist_id.to_string())
    .bind(time::to_db(now))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(token_from_row).transpose()
}

pub async fn update_label(conn: &mut SqliteConnection, guid: Uuid, label: &str, now: &DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE consent_entry_tokens SET label = ?, updated_at = ? WHERE guid = ?")
        .bind(label)
        .bind(time::to_db(now))
        .bind(guid.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Deactivate every active token of the artist; returns how many
pub async fn deactivate_active_tokens(
    conn: &mut SqliteConnection,
    artist_id: Uuid,
    now: &DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE consent_entry_tokens SET is_active = 0, updated_at = ? WHERE artist_id = ? AND is_active = 1",
    )
    .bind(time::to_db(now))
    .bind(artist_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Set or clear a token's expiry; returns false if the artist has no such token
pub async fn set_expiry(
    conn: &mut SqliteConnection,
    artist_id: Uuid,
    guid: Uuid,
    expires_at: Option<&DateTime<Utc>>,
    now: &DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE consent_entry_tokens SET expires_at = ?, updated_at = ? WHERE guid = ? AND artist_id = ?",
    )
    .bind(expires_at.map(time::to_db))
    .bind(time::to_db(now))
    .bind(guid.to_string())
    .bind(artist_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a successful public use
pub async fn touch_token(conn: &mut SqliteConnection, guid: Uuid, now: &DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE consent_entry_tokens SET last_used_at = ? WHERE guid = ?")
        .bind(time::to_db(now))
        .bind(guid.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}
