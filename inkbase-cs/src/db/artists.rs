//! Artist profile persistence
//!
//! One artist per owner account. Entry tokens belong to an artist, which is
//! how a public caller's token resolves to an owner scope.

use chrono::{DateTime, Utc};
use inkbase_common::{time, uuid_utils, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Artist record
#[derive(Debug, Clone, Serialize)]
pub struct Artist {
    #[serde(rename = "uuid")]
    pub guid: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub artist_name: String,
    pub studio_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artist {
    pub fn new(owner_id: Uuid, artist_name: String, studio_name: String) -> Self {
        let now = time::now();
        Self {
            guid: uuid_utils::generate(),
            owner_id,
            artist_name,
            studio_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

fn artist_from_row(row: &SqliteRow) -> Result<Artist> {
    let guid: String = row.try_get("guid")?;
    let owner_id: String = row.try_get("owner_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Artist {
        guid: uuid_utils::from_db("artists.guid", &guid)?,
        owner_id: uuid_utils::from_db("artists.owner_id", &owner_id)?,
        artist_name: row.try_get("artist_name")?,
        studio_name: row.try_get("studio_name")?,
        is_active: row.try_get("is_active")?,
        created_at: time::from_db("artists.created_at", &created_at)?,
        updated_at: time::from_db("artists.updated_at", &updated_at)?,
    })
}

/// Insert an artist; returns false when the owner already has one
pub async fn insert_artist(conn: &mut SqliteConnection, artist: &Artist) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO artists (guid, owner_id, artist_name, studio_name, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(owner_id) DO NOTHING
        "#,
    )
    .bind(artist.guid.to_string())
    .bind(artist.owner_id.to_string())
    .bind(&artist.artist_name)
    .bind(&artist.studio_name)
    .bind(artist.is_active)
    .bind(time::to_db(&artist.created_at))
    .bind(time::to_db(&artist.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Load the artist profile of an owner
pub async fn load_artist_for_owner(conn: &mut SqliteConnection, owner_id: Uuid) -> Result<Option<Artist>> {
    let row = sqlx::query(
        r#"
        SELECT guid, owner_id, artist_name, studio_name, is_active, created_at, updated_at
        FROM artists
        WHERE owner_id = ?
        "#,
    )
    .bind(owner_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(artist_from_row).transpose()
}

/// Load an artist by identifier
pub async fn load_artist(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<Artist>> {
    let row = sqlx::query(
        r#"
        SELECT guid, owner_id, artist_name, studio_name, is_active, created_at, updated_at
        FROM artists
        WHERE guid = ?
        "#,
    )
    .bind(guid.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(artist_from_row).transpose()
}
