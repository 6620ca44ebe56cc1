//! Access Audit Logger: one append-only row per public-workflow request

use chrono::{DateTime, Utc};
use inkbase_common::{time, uuid_utils, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Caller details recorded with each public request
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

/// Access log row
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub guid: Uuid,
    pub token_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub customer_phone: String,
    pub created_at: DateTime<Utc>,
}

impl AccessLogEntry {
    /// New entry with the user agent cut to `max_user_agent_chars` characters
    pub fn new(token_id: Uuid, client: &ClientInfo, customer_phone: &str, max_user_agent_chars: usize) -> Self {
        let ip_address = if client.ip_address.is_empty() {
            "0.0.0.0".to_string()
        } else {
            client.ip_address.clone()
        };

        Self {
            guid: uuid_utils::generate(),
            token_id,
            ip_address,
            user_agent: client.user_agent.chars().take(max_user_agent_chars).collect(),
            customer_phone: customer_phone.to_string(),
            created_at: time::now(),
        }
    }
}

pub async fn append(conn: &mut SqliteConnection, entry: &AccessLogEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO consent_access_logs (guid, token_id, ip_address, user_agent, customer_phone, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.guid.to_string())
    .bind(entry.token_id.to_string())
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(&entry.customer_phone)
    .bind(time::to_db(&entry.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Entries for one token, oldest first
pub async fn list_for_token(conn: &mut SqliteConnection, token_id: Uuid) -> Result<Vec<AccessLogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, token_id, ip_address, user_agent, customer_phone, created_at
        FROM consent_access_logs
        WHERE token_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(token_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<AccessLogEntry> {
            let guid: String = row.try_get("guid")?;
            let token_id: String = row.try_get("token_id")?;
            let created_at: String = row.try_get("created_at")?;
            Ok(AccessLogEntry {
                guid: uuid_utils::from_db("consent_access_logs.guid", &guid)?,
                token_id: uuid_utils::from_db("consent_access_logs.token_id", &token_id)?,
                ip_address: row.try_get("ip_address")?,
                user_agent: row.try_get("user_agent")?,
                customer_phone: row.try_get("customer_phone")?,
                created_at: time::from_db("consent_access_logs.created_at", &created_at)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_truncated_by_chars() {
        let client = ClientInfo {
            ip_address: "203.0.113.7".to_string(),
            user_agent: "あ".repeat(20),
        };
        let entry = AccessLogEntry::new(Uuid::new_v4(), &client, "", 5);
        assert_eq!(entry.user_agent, "あああああ");
    }

    #[test]
    fn test_missing_ip_recorded_as_unspecified() {
        let entry = AccessLogEntry::new(Uuid::new_v4(), &ClientInfo::default(), "0901234", 10);
        assert_eq!(entry.ip_address, "0.0.0.0");
        assert_eq!(entry.customer_phone, "0901234");
    }
}
