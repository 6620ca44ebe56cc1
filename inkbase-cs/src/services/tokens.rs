//! Token Lifecycle Manager
//!
//! Validity is a derived predicate (`EntryToken::is_valid_at`), not a
//! uniqueness constraint. Issue and rotate serialize on the artist row so a
//! concurrent issue never sees the gap inside a rotation.

use chrono::{DateTime, Utc};
use inkbase_common::{time, Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::artists::require_artist;
use super::{check_length, MAX_LABEL_CHARS};
use crate::db::artists::{self, Artist};
use crate::db::tokens::{self, EntryToken};
use crate::db::{lock_artist, InsertOutcome};
use crate::scope::OwnerScope;

/// Return the artist's earliest valid token, creating one if none is valid
///
/// A `Some` label replaces the reused token's label.
pub async fn issue_or_reuse(
    pool: &SqlitePool,
    scope: &OwnerScope,
    label: Option<&str>,
) -> Result<InsertOutcome<EntryToken>> {
    if let Some(label) = label {
        check_length("label", label, MAX_LABEL_CHARS)?;
    }

    let mut tx = pool.begin().await?;
    lock_artist(&mut tx, scope.owner_id).await?;
    let artist = require_artist(&mut tx, scope).await?;

    let now = time::now();
    let outcome = match tokens::earliest_valid_token(&mut tx, artist.guid, &now).await? {
        Some(mut token) => {
            if let Some(label) = label {
                tokens::update_label(&mut tx, token.guid, label, &now).await?;
                token.label = label.to_string();
                token.updated_at = now;
            }
            InsertOutcome::Existing(token)
        }
        None => {
            let token = EntryToken::new(artist.guid, label.unwrap_or_default().to_string());
            tokens::insert_token(&mut tx, &token).await?;
            InsertOutcome::Created(token)
        }
    };

    tx.commit().await?;

    match &outcome {
        InsertOutcome::Created(token) => info!(artist = %artist.guid, token = %token.guid, "Issued entry token"),
        InsertOutcome::Existing(token) => debug!(artist = %artist.guid, token = %token.guid, "Reused entry token"),
    }

    Ok(outcome)
}

/// Deactivate every active token of the artist and issue exactly one new one
pub async fn rotate(pool: &SqlitePool, scope: &OwnerScope, label: Option<&str>) -> Result<EntryToken> {
    if let Some(label) = label {
        check_length("label", label, MAX_LABEL_CHARS)?;
    }

    let mut tx = pool.begin().await?;
    lock_artist(&mut tx, scope.owner_id).await?;
    let artist = require_artist(&mut tx, scope).await?;

    let now = time::now();
    let deactivated = tokens::deactivate_active_tokens(&mut tx, artist.guid, &now).await?;
    let token = EntryToken::new(artist.guid, label.unwrap_or_default().to_string());
    tokens::insert_token(&mut tx, &token).await?;

    tx.commit().await?;

    info!(
        artist = %artist.guid,
        token = %token.guid,
        deactivated,
        "Rotated entry token"
    );
    Ok(token)
}

/// Set or clear the expiry of one of the owner's tokens
pub async fn set_expiry(
    pool: &SqlitePool,
    scope: &OwnerScope,
    token_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
) -> Result<EntryToken> {
    let mut tx = pool.begin().await?;
    lock_artist(&mut tx, scope.owner_id).await?;
    let artist = require_artist(&mut tx, scope).await?;

    let now = time::now();
    if !tokens::set_expiry(&mut tx, artist.guid, token_id, expires_at.as_ref(), &now).await? {
        return Err(Error::NotFound(format!("Entry token {}", token_id)));
    }
    let token = tokens::load_token(&mut tx, token_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Entry token {}", token_id)))?;

    tx.commit().await?;

    info!(token = %token_id, expires_at = ?expires_at, "Updated entry token expiry");
    Ok(token)
}

/// Record a successful public use after the workflow has committed
///
/// Best-effort: failure is logged, never surfaced.
pub async fn touch(pool: &SqlitePool, token_id: Uuid) {
    let result: Result<()> = async {
        let mut conn = pool.acquire().await?;
        tokens::touch_token(&mut conn, token_id, &time::now()).await
    }
    .await;

    if let Err(e) = result {
        warn!(token = %token_id, "Failed to record token use: {}", e);
    }
}

/// Why a token cannot be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    NotFound,
    InactiveOrExpired,
}

impl TokenRejection {
    pub fn reason(self) -> &'static str {
        match self {
            TokenRejection::NotFound => "not_found",
            TokenRejection::InactiveOrExpired => "inactive_or_expired",
        }
    }
}

/// Resolve a token and its artist, checking validity at `now`
///
/// A token whose artist is inactive counts as inactive.
pub(crate) async fn check_token(
    conn: &mut SqliteConnection,
    token_id: Uuid,
    now: &DateTime<Utc>,
) -> Result<std::result::Result<(EntryToken, Artist), TokenRejection>> {
    let Some(token) = tokens::load_token(conn, token_id).await? else {
        return Ok(Err(TokenRejection::NotFound));
    };

    let artist = artists::load_artist(conn, token.artist_id)
        .await?
        .ok_or_else(|| Error::corrupt("consent_entry_tokens.artist_id", &token.artist_id.to_string()))?;

    if !token.is_valid_at(now) || !artist.is_active {
        return Ok(Err(TokenRejection::InactiveOrExpired));
    }

    Ok(Ok((token, artist)))
}

/// Like [`check_token`], turning a rejection into `InvalidToken`
pub(crate) async fn require_valid_token(
    conn: &mut SqliteConnection,
    token_id: Uuid,
    now: &DateTime<Utc>,
) -> Result<(EntryToken, Artist)> {
    check_token(conn, token_id, now).await?.map_err(|rejection| match rejection {
        TokenRejection::NotFound => Error::InvalidToken("Entry token is not recognised".to_string()),
        TokenRejection::InactiveOrExpired => {
            Error::InvalidToken("This entry code can no longer be used".to_string())
        }
    })
}
