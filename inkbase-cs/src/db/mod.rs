//! Database access layer
//!
//! Free functions over `&mut SqliteConnection`, callable with a pooled
//! connection for reads or `&mut *tx` inside a write transaction.
//!
//! Write transactions open with one of the `lock_*` helpers below. They issue
//! a no-op UPDATE so the transaction holds SQLite's write lock from its first
//! statement and never has to upgrade a read snapshot mid-sequence.

pub mod access_log;
pub mod artists;
pub mod audit;
pub mod consents;
pub mod customers;
pub mod tokens;

use inkbase_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Take the write lock, touching the given customer rows
pub async fn lock_customers(conn: &mut SqliteConnection, owner_id: Uuid, guids: &[Uuid]) -> Result<()> {
    for guid in guids {
        sqlx::query("UPDATE customers SET updated_at = updated_at WHERE owner_id = ? AND guid = ?")
            .bind(owner_id.to_string())
            .bind(guid.to_string())
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Take the write lock, touching an entry token row (public-workflow writes)
pub async fn lock_token(conn: &mut SqliteConnection, token_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE consent_entry_tokens SET updated_at = updated_at WHERE guid = ?")
        .bind(token_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Take the write lock, touching the owner's artist row (token administration)
pub async fn lock_artist(conn: &mut SqliteConnection, owner_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE artists SET updated_at = updated_at WHERE owner_id = ?")
        .bind(owner_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Outcome of an insert that falls back to the row already holding the key
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    Created(T),
    Existing(T),
}

impl<T> InsertOutcome<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Created(v) | InsertOutcome::Existing(v) => v,
        }
    }
}
