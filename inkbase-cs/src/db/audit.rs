//! Merge and soft-delete audit logs
//!
//! Both tables are append-only and read only by audit review.

use chrono::{DateTime, Utc};
use inkbase_common::{time, uuid_utils, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Merge audit row
#[derive(Debug, Clone, Serialize)]
pub struct MergeLog {
    pub guid: Uuid,
    pub keep_uuid: Uuid,
    pub merged_uuid: Uuid,
    pub performed_by: Option<Uuid>,
    pub performed_at: DateTime<Utc>,
    pub overwrite: bool,
    pub details: String,
}

impl MergeLog {
    pub fn new(keep_uuid: Uuid, merged_uuid: Uuid, performed_by: Uuid, overwrite: bool) -> Self {
        Self {
            guid: uuid_utils::generate(),
            keep_uuid,
            merged_uuid,
            performed_by: Some(performed_by),
            performed_at: time::now(),
            overwrite,
            details: format!("customer merge: keep={} <- merged={}", keep_uuid, merged_uuid),
        }
    }
}

/// Soft-delete audit row
#[derive(Debug, Clone, Serialize)]
pub struct DeleteLog {
    pub guid: Uuid,
    pub customer_uuid: Uuid,
    pub performed_by: Option<Uuid>,
    pub performed_at: DateTime<Utc>,
    pub reason: String,
}

impl DeleteLog {
    pub fn new(customer_uuid: Uuid, performed_by: Uuid, reason: String) -> Self {
        Self {
            guid: uuid_utils::generate(),
            customer_uuid,
            performed_by: Some(performed_by),
            performed_at: time::now(),
            reason,
        }
    }
}

pub async fn append_merge_log(conn: &mut SqliteConnection, log: &MergeLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_merge_logs (guid, keep_uuid, merged_uuid, performed_by, performed_at, overwrite, details)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.guid.to_string())
    .bind(log.keep_uuid.to_string())
    .bind(log.merged_uuid.to_string())
    .bind(log.performed_by.map(|id| id.to_string()))
    .bind(time::to_db(&log.performed_at))
    .bind(log.overwrite)
    .bind(&log.details)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn append_delete_log(conn: &mut SqliteConnection, log: &DeleteLog) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_delete_logs (guid, customer_uuid, performed_by, performed_at, reason)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.guid.to_string())
    .bind(log.customer_uuid.to_string())
    .bind(log.performed_by.map(|id| id.to_string()))
    .bind(time::to_db(&log.performed_at))
    .bind(&log.reason)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Merge log rows involving a customer on either side, oldest first
pub async fn merge_logs_for(conn: &mut SqliteConnection, customer: Uuid) -> Result<Vec<MergeLog>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, keep_uuid, merged_uuid, performed_by, performed_at, overwrite, details
        FROM customer_merge_logs
        WHERE keep_uuid = ? OR merged_uuid = ?
        ORDER BY performed_at ASC
        "#,
    )
    .bind(customer.to_string())
    .bind(customer.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<MergeLog> {
            let guid: String = row.try_get("guid")?;
            let keep: String = row.try_get("keep_uuid")?;
            let merged: String = row.try_get("merged_uuid")?;
            let performed_at: String = row.try_get("performed_at")?;
            Ok(MergeLog {
                guid: uuid_utils::from_db("customer_merge_logs.guid", &guid)?,
                keep_uuid: uuid_utils::from_db("customer_merge_logs.keep_uuid", &keep)?,
                merged_uuid: uuid_utils::from_db("customer_merge_logs.merged_uuid", &merged)?,
                performed_by: uuid_utils::from_db_opt("customer_merge_logs.performed_by", row.try_get("performed_by")?)?,
                performed_at: time::from_db("customer_merge_logs.performed_at", &performed_at)?,
                overwrite: row.try_get("overwrite")?,
                details: row.try_get("details")?,
            })
        })
        .collect()
}

/// Delete log rows for a customer, oldest first
pub async fn delete_logs_for(conn: &mut SqliteConnection, customer: Uuid) -> Result<Vec<DeleteLog>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, customer_uuid, performed_by, performed_at, reason
        FROM customer_delete_logs
        WHERE customer_uuid = ?
        ORDER BY performed_at ASC
        "#,
    )
    .bind(customer.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<DeleteLog> {
            let guid: String = row.try_get("guid")?;
            let customer_uuid: String = row.try_get("customer_uuid")?;
            let performed_at: String = row.try_get("performed_at")?;
            Ok(DeleteLog {
                guid: uuid_utils::from_db("customer_delete_logs.guid", &guid)?,
                customer_uuid: uuid_utils::from_db("customer_delete_logs.customer_uuid", &customer_uuid)?,
                performed_by: uuid_utils::from_db_opt("customer_delete_logs.performed_by", row.try_get("performed_by")?)?,
                performed_at: time::from_db("customer_delete_logs.performed_at", &performed_at)?,
                reason: row.try_get("reason")?,
            })
        })
        .collect()
}
