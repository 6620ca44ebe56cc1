//! Identity Store: customer persistence
//!
//! The profile column list is driven by [`CustomerField`], the single
//! hand-maintained list of profile fields. The SQL statements below, merge
//! reconciliation and the owner PATCH parser all iterate it, so adding a
//! field means adding one variant.

use chrono::{DateTime, Utc};
use inkbase_common::{time, uuid_utils, Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection};
use uuid::Uuid;

/// Customer profile field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerField {
    FullName,
    LastName,
    FirstName,
    LastNameKana,
    FirstNameKana,
    Gender,
    BirthDate,
    Prefecture,
    City,
    PhoneNumber,
    InstagramId,
    AvatarUrl,
    Notes,
    SkinType,
    TattooExperience,
    Occupation,
    Referrer,
    Mbti,
    Tattooist,
}

/// Storage shape of a profile field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    OptionalText,
    Flag,
}

/// A profile field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    Flag(bool),
}

impl FieldValue {
    /// Empty means "", None, Some("") or false
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(v) => v.is_empty(),
            FieldValue::OptionalText(v) => v.as_deref().map_or(true, str::is_empty),
            FieldValue::Flag(v) => !v,
        }
    }
}

impl CustomerField {
    pub const ALL: [CustomerField; 19] = [
        CustomerField::FullName,
        CustomerField::LastName,
        CustomerField::FirstName,
        CustomerField::LastNameKana,
        CustomerField::FirstNameKana,
        CustomerField::Gender,
        CustomerField::BirthDate,
        CustomerField::Prefecture,
        CustomerField::City,
        CustomerField::PhoneNumber,
        CustomerField::InstagramId,
        CustomerField::AvatarUrl,
        CustomerField::Notes,
        CustomerField::SkinType,
        CustomerField::TattooExperience,
        CustomerField::Occupation,
        CustomerField::Referrer,
        CustomerField::Mbti,
        CustomerField::Tattooist,
    ];

    /// Column name, also used as the JSON key
    pub fn name(self) -> &'static str {
        match self {
            CustomerField::FullName => "full_name",
            CustomerField::LastName => "last_name",
            CustomerField::FirstName => "first_name",
            CustomerField::LastNameKana => "last_name_kana",
            CustomerField::FirstNameKana => "first_name_kana",
            CustomerField::Gender => "gender",
            CustomerField::BirthDate => "birth_date",
            CustomerField::Prefecture => "prefecture",
            CustomerField::City => "city",
            CustomerField::PhoneNumber => "phone_number",
            CustomerField::InstagramId => "instagram_id",
            CustomerField::AvatarUrl => "avatar_url",
            CustomerField::Notes => "notes",
            CustomerField::SkinType => "skin_type",
            CustomerField::TattooExperience => "tattoo_experience",
            CustomerField::Occupation => "occupation",
            CustomerField::Referrer => "referrer",
            CustomerField::Mbti => "mbti",
            CustomerField::Tattooist => "tattooist",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            CustomerField::BirthDate | CustomerField::AvatarUrl => FieldKind::OptionalText,
            CustomerField::TattooExperience => FieldKind::Flag,
            _ => FieldKind::Text,
        }
    }

    /// Whether a merge reconciles this field
    pub fn is_mergeable(self) -> bool {
        self != CustomerField::Gender
    }

    pub fn mergeable() -> impl Iterator<Item = CustomerField> {
        Self::ALL.into_iter().filter(|f| f.is_mergeable())
    }

    pub fn from_name(name: &str) -> Option<CustomerField> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Mutable personal data of a customer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomerProfile {
    pub full_name: String,
    pub last_name: String,
    pub first_name: String,
    pub last_name_kana: String,
    pub first_name_kana: String,
    pub gender: String,
    pub birth_date: Option<String>,
    pub prefecture: String,
    pub city: String,
    pub phone_number: String,
    pub instagram_id: String,
    pub avatar_url: Option<String>,
    pub notes: String,
    pub skin_type: String,
    pub tattoo_experience: bool,
    pub occupation: String,
    pub referrer: String,
    pub mbti: String,
    pub tattooist: String,
}

impl CustomerProfile {
    pub fn get(&self, field: CustomerField) -> FieldValue {
        match field {
            CustomerField::BirthDate => FieldValue::OptionalText(self.birth_date.clone()),
            CustomerField::AvatarUrl => FieldValue::OptionalText(self.avatar_url.clone()),
            CustomerField::TattooExperience => FieldValue::Flag(self.tattoo_experience),
            text => FieldValue::Text(self.text(text).cloned().unwrap_or_default()),
        }
    }

    /// Assign a field, rejecting a value of the wrong shape
    pub fn set(&mut self, field: CustomerField, value: FieldValue) -> Result<()> {
        match (field, value) {
            (CustomerField::BirthDate, FieldValue::OptionalText(v)) => self.birth_date = v,
            (CustomerField::AvatarUrl, FieldValue::OptionalText(v)) => self.avatar_url = v,
            (CustomerField::TattooExperience, FieldValue::Flag(v)) => self.tattoo_experience = v,
            (field, FieldValue::Text(v)) if field.kind() == FieldKind::Text => {
                if let Some(slot) = self.text_mut(field) {
                    *slot = v;
                }
            }
            (field, _) => {
                return Err(Error::InvalidRequest(format!(
                    "Wrong value type for field '{}'",
                    field.name()
                )))
            }
        }

        Ok(())
    }

    /// Name shown to people: full name, else family + given name
    pub fn display_name(&self) -> String {
        if !self.full_name.is_empty() {
            return self.full_name.clone();
        }
        format!("{}{}", self.last_name, self.first_name).trim().to_string()
    }

    fn text(&self, field: CustomerField) -> Option<&String> {
        Some(match field {
            CustomerField::FullName => &self.full_name,
            CustomerField::LastName => &self.last_name,
            CustomerField::FirstName => &self.first_name,
            CustomerField::LastNameKana => &self.last_name_kana,
            CustomerField::FirstNameKana => &self.first_name_kana,
            CustomerField::Gender => &self.gender,
            CustomerField::Prefecture => &self.prefecture,
            CustomerField::City => &self.city,
            CustomerField::PhoneNumber => &self.phone_number,
            CustomerField::InstagramId => &self.instagram_id,
            CustomerField::Notes => &self.notes,
            CustomerField::SkinType => &self.skin_type,
            CustomerField::Occupation => &self.occupation,
            CustomerField::Referrer => &self.referrer,
            CustomerField::Mbti => &self.mbti,
            CustomerField::Tattooist => &self.tattooist,
            CustomerField::BirthDate | CustomerField::AvatarUrl | CustomerField::TattooExperience => {
                return None
            }
        })
    }

    fn text_mut(&mut self, field: CustomerField) -> Option<&mut String> {
        Some(match field {
            CustomerField::FullName => &mut self.full_name,
            CustomerField::LastName => &mut self.last_name,
            CustomerField::FirstName => &mut self.first_name,
            CustomerField::LastNameKana => &mut self.last_name_kana,
            CustomerField::FirstNameKana => &mut self.first_name_kana,
            CustomerField::Gender => &mut self.gender,
            CustomerField::Prefecture => &mut self.prefecture,
            CustomerField::City => &mut self.city,
            CustomerField::PhoneNumber => &mut self.phone_number,
            CustomerField::InstagramId => &mut self.instagram_id,
            CustomerField::Notes => &mut self.notes,
            CustomerField::SkinType => &mut self.skin_type,
            CustomerField::Occupation => &mut self.occupation,
            CustomerField::Referrer => &mut self.referrer,
            CustomerField::Mbti => &mut self.mbti,
            CustomerField::Tattooist => &mut self.tattooist,
            CustomerField::BirthDate | CustomerField::AvatarUrl | CustomerField::TattooExperience => {
                return None
            }
        })
    }
}

/// Customer record
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    #[serde(rename = "uuid")]
    pub guid: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub profile: CustomerProfile,
    pub is_active: bool,
    pub merged_into: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// New active customer owned by `owner_id`
    pub fn new(owner_id: Uuid, profile: CustomerProfile) -> Self {
        let now = time::now();
        Self {
            guid: uuid_utils::generate(),
            owner_id,
            profile,
            is_active: true,
            merged_into: None,
            created_at: now,
            updated_at: now,
        }
    }
}

static SELECT_COLUMNS: Lazy<String> = Lazy::new(|| {
    let profile: Vec<&str> = CustomerField::ALL.iter().map(|f| f.name()).collect();
    format!(
        "guid, owner_id, {}, is_active, merged_into, created_at, updated_at",
        profile.join(", ")
    )
});

static INSERT_SQL: Lazy<String> = Lazy::new(|| {
    let placeholders = vec!["?"; CustomerField::ALL.len() + 6].join(", ");
    format!("INSERT INTO customers ({}) VALUES ({})", *SELECT_COLUMNS, placeholders)
});

static UPDATE_SQL: Lazy<String> = Lazy::new(|| {
    let assignments: Vec<String> = CustomerField::ALL
        .iter()
        .map(|f| format!("{} = ?", f.name()))
        .collect();
    format!(
        "UPDATE customers SET {}, is_active = ?, merged_into = ?, updated_at = ? \
         WHERE guid = ? AND owner_id = ?",
        assignments.join(", ")
    )
});

fn select_sql(filter: &str) -> String {
    format!("SELECT {} FROM customers {}", *SELECT_COLUMNS, filter)
}

fn bind_profile<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    profile: &CustomerProfile,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for field in CustomerField::ALL {
        query = match profile.get(field) {
            FieldValue::Text(v) => query.bind(v),
            FieldValue::OptionalText(v) => query.bind(v),
            FieldValue::Flag(v) => query.bind(v),
        };
    }
    query
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer> {
    let mut profile = CustomerProfile::default();
    for field in CustomerField::ALL {
        let value = match field.kind() {
            FieldKind::Text => FieldValue::Text(row.try_get(field.name())?),
            FieldKind::OptionalText => FieldValue::OptionalText(row.try_get(field.name())?),
            FieldKind::Flag => FieldValue::Flag(row.try_get(field.name())?),
        };
        profile.set(field, value)?;
    }

    let guid: String = row.try_get("guid")?;
    let owner_id: String = row.try_get("owner_id")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Customer {
        guid: uuid_utils::from_db("customers.guid", &guid)?,
        owner_id: uuid_utils::from_db("customers.owner_id", &owner_id)?,
        profile,
        is_active: row.try_get("is_active")?,
        merged_into: uuid_utils::from_db_opt("customers.merged_into", row.try_get("merged_into")?)?,
        created_at: time::from_db("customers.created_at", &created_at)?,
        updated_at: time::from_db("customers.updated_at", &updated_at)?,
    })
}

/// Insert a new customer row
pub async fn insert_customer(conn: &mut SqliteConnection, customer: &Customer) -> Result<()> {
    let query = sqlx::query(INSERT_SQL.as_str())
        .bind(customer.guid.to_string())
        .bind(customer.owner_id.to_string());

    bind_profile(query, &customer.profile)
        .bind(customer.is_active)
        .bind(customer.merged_into.map(|id| id.to_string()))
        .bind(time::to_db(&customer.created_at))
        .bind(time::to_db(&customer.updated_at))
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Persist profile, activity and merge pointer of an existing customer
pub async fn save_customer(conn: &mut SqliteConnection, customer: &Customer) -> Result<()> {
    let result = bind_profile(sqlx::query(UPDATE_SQL.as_str()), &customer.profile)
        .bind(customer.is_active)
        .bind(customer.merged_into.map(|id| id.to_string()))
        .bind(time::to_db(&customer.updated_at))
        .bind(customer.guid.to_string())
        .bind(customer.owner_id.to_string())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Customer {}", customer.guid)));
    }

    Ok(())
}

/// Load a customer regardless of owner
pub async fn load_customer(conn: &mut SqliteConnection, guid: Uuid) -> Result<Option<Customer>> {
    let row = sqlx::query(&select_sql("WHERE guid = ?"))
        .bind(guid.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(customer_from_row).transpose()
}

/// Load a customer within an owner's scope
pub async fn load_owned_customer(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    guid: Uuid,
) -> Result<Option<Customer>> {
    let row = sqlx::query(&select_sql("WHERE guid = ? AND owner_id = ?"))
        .bind(guid.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(customer_from_row).transpose()
}

/// Active customers, most recently updated first
pub async fn list_active_customers(conn: &mut SqliteConnection, owner_id: Uuid) -> Result<Vec<Customer>> {
    let rows = sqlx::query(&select_sql(
        "WHERE owner_id = ? AND is_active = 1 ORDER BY updated_at DESC, created_at DESC",
    ))
    .bind(owner_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(customer_from_row).collect()
}

/// Every customer holding exactly this normalized phone, active ones first
pub async fn find_by_phone(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    phone: &str,
) -> Result<Vec<Customer>> {
    let rows = sqlx::query(&select_sql(
        "WHERE owner_id = ? AND phone_number = ? ORDER BY is_active DESC, created_at ASC",
    ))
    .bind(owner_id.to_string())
    .bind(phone)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(customer_from_row).collect()
}

/// Exact phone and birth-date match, active or not
pub async fn find_by_phone_and_birth_date(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    phone: &str,
    birth_date: &str,
) -> Result<Vec<Customer>> {
    let rows = sqlx::query(&select_sql(
        "WHERE owner_id = ? AND phone_number = ? AND birth_date = ? ORDER BY created_at ASC",
    ))
    .bind(owner_id.to_string())
    .bind(phone)
    .bind(birth_date)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(customer_from_row).collect()
}

/// Active customers whose phone contains `fragment`, optionally pinned to a birth date
pub async fn search_active_by_phone(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    fragment: &str,
    birth_date: Option<&str>,
) -> Result<Vec<Customer>> {
    let rows = sqlx::query(&select_sql(
        r#"
        WHERE owner_id = ? AND is_active = 1
          AND instr(phone_number, ?) > 0
          AND (? IS NULL OR birth_date = ?)
        ORDER BY updated_at DESC
        "#,
    ))
    .bind(owner_id.to_string())
    .bind(fragment)
    .bind(birth_date)
    .bind(birth_date)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(customer_from_row).collect()
}

/// Repoint every customer merged into `from` at `to`
///
/// Returns the number of rows rewritten.
pub async fn relink_merged(
    conn: &mut SqliteConnection,
    owner_id: Uuid,
    from: Uuid,
    to: Uuid,
    updated_at: &DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE customers SET merged_into = ?, updated_at = ? WHERE merged_into = ? AND owner_id = ?",
    )
    .bind(to.to_string())
    .bind(time::to_db(updated_at))
    .bind(from.to_string())
    .bind(owner_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
