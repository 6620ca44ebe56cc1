//! Consent Ledger persistence
//!
//! Consent rows are write-once: the schema's triggers reject any change other
//! than flipping `is_active` to false. Each row carries a snapshot of the
//! signer's identity taken when it was created.

use chrono::{DateTime, Utc};
use inkbase_common::{time, uuid_utils, Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::customers::Customer;
use super::InsertOutcome;

/// Which path signed a consent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentOrigin {
    /// Submitted by the owner on the customer's behalf
    Owner,
    /// Public first-time entry, unique per (customer, version)
    Entry,
    /// Public re-signature
    Renew,
}

impl ConsentOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentOrigin::Owner => "owner",
            ConsentOrigin::Entry => "entry",
            ConsentOrigin::Renew => "renew",
        }
    }

    fn from_db(value: &str) -> Result<Self> {
        match value {
            "owner" => Ok(ConsentOrigin::Owner),
            "entry" => Ok(ConsentOrigin::Entry),
            "renew" => Ok(ConsentOrigin::Renew),
            other => Err(Error::corrupt("customer_consents.origin", other)),
        }
    }
}

/// Identity fields frozen at signing time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsentSnapshot {
    #[serde(rename = "customer_uuid_snapshot")]
    pub customer_uuid: Uuid,
    #[serde(rename = "customer_name_snapshot")]
    pub name: String,
    #[serde(rename = "customer_birth_date_snapshot")]
    pub birth_date: String,
    #[serde(rename = "customer_phone_snapshot")]
    pub phone: String,
}

impl ConsentSnapshot {
    pub fn capture(customer: &Customer) -> Self {
        Self {
            customer_uuid: customer.guid,
            name: customer.profile.display_name(),
            birth_date: customer.profile.birth_date.clone().unwrap_or_default(),
            phone: customer.profile.phone_number.clone(),
        }
    }
}

/// What the signer agreed to
#[derive(Debug, Clone, Default)]
pub struct ConsentTerms {
    pub consent_version: String,
    pub privacy_agreement_version: String,
    pub signature: Option<String>,
    pub privacy_agreement_agreed_at: Option<DateTime<Utc>>,
    pub visit_date: Option<String>,
}

/// Consent record
#[derive(Debug, Clone, Serialize)]
pub struct Consent {
    #[serde(rename = "uuid")]
    pub guid: Uuid,
    #[serde(rename = "customer_uuid")]
    pub customer_id: Uuid,
    pub origin: ConsentOrigin,
    pub consent_version: String,
    pub privacy_agreement_version: String,
    pub signature: Option<String>,
    pub signed_at: DateTime<Utc>,
    pub privacy_agreement_agreed_at: Option<DateTime<Utc>>,
    pub visit_date: Option<String>,
    #[serde(flatten)]
    pub snapshot: ConsentSnapshot,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consent {
    /// New consent signed by `customer`, snapshotting its current identity
    pub fn sign(customer: &Customer, origin: ConsentOrigin, terms: ConsentTerms, signed_at: DateTime<Utc>) -> Self {
        let now = time::now();
        Self {
            guid: uuid_utils::generate(),
            customer_id: customer.guid,
            origin,
            consent_version: terms.consent_version,
            privacy_agreement_version: terms.privacy_agreement_version,
            signature: terms.signature,
            signed_at: time::truncate(signed_at),
            privacy_agreement_agreed_at: terms.privacy_agreement_agreed_at.map(time::truncate),
            visit_date: terms.visit_date,
            snapshot: ConsentSnapshot::capture(customer),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Summary of the customer a consent was signed under
#[derive(Debug, Clone, Serialize)]
pub struct CustomerSummary {
    pub uuid: Uuid,
    pub full_name: String,
    pub last_name: String,
    pub first_name: String,
    pub is_active: bool,
    pub merged_into_uuid: Option<Uuid>,
}

/// Consent as listed to its owner
#[derive(Debug, Clone, Serialize)]
pub struct ConsentRecord {
    #[serde(flatten)]
    pub consent: Consent,
    pub customer: CustomerSummary,
    pub is_merged: bool,
}

/// Read-side filter for listing consents
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsentFilter {
    /// Only consents signed under this customer or a customer merged into it
    pub customer: Option<Uuid>,
    /// Only consents whose customer is active or merged into an active one
    pub active_only: bool,
}

const CONSENT_COLUMNS: &str = r#"
    k.guid AS guid, k.customer_id AS customer_id, k.origin AS origin,
    k.consent_version AS consent_version,
    k.privacy_agreement_version AS privacy_agreement_version,
    k.signature AS signature, k.signed_at AS signed_at,
    k.privacy_agreement_agreed_at AS privacy_agreement_agreed_at,
    k.visit_date AS visit_date,
    k.customer_uuid_snapshot AS customer_uuid_snapshot,
    k.customer_name_snapshot AS customer_name_snapshot,
    k.customer_birth_date_snapshot AS customer_birth_date_snapshot,
    k.customer_phone_snapshot AS customer_phone_snapshot,
    k.is_active AS is_active, k.created_at AS created_at, k.updated_at AS updated_at
"#;

const RECORD_SQL: &str = r#"
    c.guid AS c_guid, c.full_name AS c_full_name, c.last_name AS c_last_name,
    c.first_name AS c_first_name, c.is_active AS c_is_active, c.merged_into AS c_merged_into
    FROM customer_consents k
    JOIN customers c ON c.guid = k.customer_id
    LEFT JOIN customers m ON m.guid = c.merged_into
    WHERE c.owner_id = ?
"#;

fn consent_from_row(row: &SqliteRow) -> Result<Consent> {
    let guid: String = row.try_get("guid")?;
    let customer_id: String = row.try_get("customer_id")?;
    let origin: String = row.try_get("origin")?;
    let snapshot_uuid: String = row.try_get("customer_uuid_snapshot")?;
    let signed_at: String = row.try_get("signed_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Consent {
        guid: uuid_utils::from_db("customer_consents.guid", &guid)?,
        customer_id: uuid_utils::from_db("customer_consents.customer_id", &customer_id)?,
        origin: ConsentOrigin::from_db(&origin)?,
        consent_version: row.try_get("consent_version")?,
        privacy_agreement_version: row.try_get("privacy_agreement_version")?,
        signature: row.try_get("signature")?,
        signed_at: time::from_db("customer_consents.signed_at", &signed_at)?,
        privacy_agreement_agreed_at: time::from_db_opt(
            "customer_consents.privacy_agreement_agreed_at",
            row.try_get("privacy_agreement_agreed_at")?,
        )?,
        visit_date: row.try_get("visit_date")?,
        snapshot: ConsentSnapshot {
            customer_uuid: uuid_utils::from_db("customer_consents.customer_uuid_snapshot", &snapshot_uuid)?,
            name: row.try_get("customer_name_snapshot")?,
            birth_date: row.try_get("customer_birth_date_snapshot")?,
            phone: row.try_get("customer_phone_snapshot")?,
        },
        is_active: row.try_get("is_active")?,
        created_at: time::from_db("customer_consents.created_at", &created_at)?,
        updated_at: time::from_db("customer_consents.updated_at", &updated_at)?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<ConsentRecord> {
    let consent = consent_from_row(row)?;
    let customer_guid: String = row.try_get("c_guid")?;
    let merged_into = uuid_utils::from_db_opt("customers.merged_into", row.try_get("c_merged_into")?)?;

    Ok(ConsentRecord {
        consent,
        customer: CustomerSummary {
            uuid: uuid_utils::from_db("customers.guid", &customer_guid)?,
            full_name: row.try_get("c_full_name")?,
            last_name: row.try_get("c_last_name")?,
            first_name: row.try_get("c_first_name")?,
            is_active: row.try_get("c_is_active")?,
            merged_into_uuid: merged_into,
        },
        is_merged: merged_into.is_some(),
    })
}

const INSERT_SQL: &str = r#"
    INSERT INTO customer_consents (
        guid, customer_id, origin, consent_version, privacy_agreement_version,
        signature, signed_at, privacy_agreement_agreed_at, visit_date,
        customer_uuid_snapshot, customer_name_snapshot,
        customer_birth_date_snapshot, customer_phone_snapshot,
        is_active, created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

async fn execute_insert(conn: &mut SqliteConnection, sql: &str, consent: &Consent) -> Result<u64> {
    let result = sqlx::query(sql)
        .bind(consent.guid.to_string())
        .bind(consent.customer_id.to_string())
        .bind(consent.origin.as_str())
        .bind(&consent.consent_version)
        .bind(&consent.privacy_agreement_version)
        .bind(&consent.signature)
        .bind(time::to_db(&consent.signed_at))
        .bind(consent.privacy_agreement_agreed_at.as_ref().map(time::to_db))
        .bind(&consent.visit_date)
        .bind(consent.snapshot.customer_uuid.to_string())
        .bind(&consent.snapshot.name)
        .bind(&consent.snapshot.birth_date)
        .bind(&consent.snapshot.phone)
        .bind(consent.is_active)
        .bind(time::to_db(&consent.created_at))
        .bind(time::to_db(&consent.updated_at))
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Append a consent row
pub async fn insert_consent(conn: &mut SqliteConnection, consent: &Consent) -> Result<()> {
    execute_insert(conn, INSERT_SQL, consent).await?;
    Ok(())
}

/// Insert an Entry consent, or return the one already signed for this version
pub async fn insert_entry_consent(conn: &mut SqliteConnection, consent: &Consent) -> Result<InsertOutcome<Consent>> {
    let sql = format!(
        "{} ON CONFLICT(customer_id, consent_version) WHERE origin = 'entry' DO NOTHING",
        INSERT_SQL
    );

    if execute_insert(conn, &sql, consent).await? == 1 {
        return Ok(InsertOutcome::Created(consent.clone()));
    }

    let row = sqlx::query(&format!(
        "SELECT {} FROM customer_consents k \
         WHERE k.customer_id = ? AND k.consent_version = ? AND k.origin = 'entry'",
        CONSENT_COLUMNS
    ))
    .bind(consent.customer_id.to_string())
    .bind(&consent.consent_version)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(InsertOutcome::Existing(consent_from_row(&row)?)),
        None => Err(Error::Conflict(format!(
            "Entry consent for customer {} neither inserted nor found",
            consent.customer_id
        ))),
    }
}

/// Owner-scoped consent listing, newest signature first
pub async fn list_consent_records(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    filter: &ConsentFilter,
) -> Result<Vec<ConsentRecord>> {
    let sql = format!(
        r#"
        SELECT {}, {}
          AND (? IS NULL OR c.guid = ? OR c.merged_into = ?)
          AND (? = 0 OR c.is_active = 1 OR m.is_active = 1)
        ORDER BY k.signed_at DESC, k.created_at DESC
        "#,
        CONSENT_COLUMNS, RECORD_SQL
    );
    let customer = filter.customer.map(|id| id.to_string());

    let rows = sqlx::query(&sql)
        .bind(owner_id.to_string())
        .bind(customer.clone())
        .bind(customer.clone())
        .bind(customer)
        .bind(filter.active_only)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(record_from_row).collect()
}

/// Load one consent within an owner's scope
pub async fn load_consent_record(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    guid: Uuid,
) -> Result<Option<ConsentRecord>> {
    let sql = format!("SELECT {}, {} AND k.guid = ?", CONSENT_COLUMNS, RECORD_SQL);

    let row = sqlx::query(&sql)
        .bind(owner_id.to_string())
        .bind(guid.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Flip a consent to inactive; returns false when it already was
pub async fn invalidate_consent(conn: &mut SqliteConnection, guid: Uuid, now: &DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE customer_consents SET is_active = 0, updated_at = ? WHERE guid = ? AND is_active = 1",
    )
    .bind(time::to_db(now))
    .bind(guid.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
