//! Artist profile operations

use inkbase_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::{check_length, require, MAX_NAME_CHARS};
use crate::db::artists::{self, Artist};
use crate::scope::OwnerScope;

/// Create the owner's artist profile
pub async fn register_artist(
    pool: &SqlitePool,
    scope: &OwnerScope,
    artist_name: &str,
    studio_name: &str,
) -> Result<Artist> {
    require("artist_name", artist_name, MAX_NAME_CHARS)?;
    check_length("studio_name", studio_name, MAX_NAME_CHARS)?;

    let artist = Artist::new(scope.owner_id, artist_name.trim().to_string(), studio_name.trim().to_string());

    let mut conn = pool.acquire().await?;
    if !artists::insert_artist(&mut conn, &artist).await? {
        return Err(Error::InvalidRequest(
            "This account already has an artist profile".to_string(),
        ));
    }

    info!(artist = %artist.guid, "Registered artist profile");
    Ok(artist)
}

/// The owner's artist profile
pub async fn artist_for_owner(pool: &SqlitePool, scope: &OwnerScope) -> Result<Artist> {
    let mut conn = pool.acquire().await?;
    artists::load_artist_for_owner(&mut conn, scope.owner_id)
        .await?
        .ok_or_else(|| Error::NotFound("No artist profile for this account".to_string()))
}

/// Artist profile required by token administration
pub(crate) async fn require_artist(conn: &mut SqliteConnection, scope: &OwnerScope) -> Result<Artist> {
    artists::load_artist_for_owner(conn, scope.owner_id)
        .await?
        .ok_or_else(|| Error::InvalidRequest("This account has no artist profile".to_string()))
}
