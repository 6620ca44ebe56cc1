//! Owner-side customer operations

use inkbase_common::{phone, time, Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{check_length, MAX_BIRTH_DATE_CHARS, MAX_NAME_CHARS};
use crate::db::audit::{self, DeleteLog};
use crate::db::consents::{self, ConsentFilter, ConsentRecord};
use crate::db::customers::{self, Customer, CustomerField, CustomerProfile, FieldKind, FieldValue};
use crate::db::lock_customers;
use crate::scope::OwnerScope;

/// Customer with its consent history
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    /// Consents signed under this customer or any customer merged into it, newest first
    pub consents: Vec<ConsentRecord>,
    /// Newest consent that has not been invalidated
    pub latest_consent: Option<ConsentRecord>,
}

/// Partial profile update, already checked against the field list
pub type CustomerPatch = Vec<(CustomerField, FieldValue)>;

/// Parse a JSON object into a profile patch
///
/// Keys must name a profile field; values must match its shape. `null`
/// clears an optional text field.
pub fn parse_patch(body: &Map<String, Value>) -> Result<CustomerPatch> {
    body.iter()
        .map(|(key, value)| -> Result<(CustomerField, FieldValue)> {
            let field = CustomerField::from_name(key)
                .ok_or_else(|| Error::InvalidRequest(format!("Unknown customer field '{}'", key)))?;

            let parsed = match (field.kind(), value) {
                (FieldKind::Text, Value::String(s)) => FieldValue::Text(s.clone()),
                (FieldKind::OptionalText, Value::String(s)) => FieldValue::OptionalText(Some(s.clone())),
                (FieldKind::OptionalText, Value::Null) => FieldValue::OptionalText(None),
                (FieldKind::Flag, Value::Bool(b)) => FieldValue::Flag(*b),
                _ => {
                    return Err(Error::InvalidRequest(format!(
                        "Wrong value type for field '{}'",
                        key
                    )))
                }
            };

            Ok((field, parsed))
        })
        .collect()
}

fn validate_profile(profile: &CustomerProfile) -> Result<()> {
    check_length("full_name", &profile.full_name, MAX_NAME_CHARS)?;
    if let Some(birth_date) = &profile.birth_date {
        check_length("birth_date", birth_date, MAX_BIRTH_DATE_CHARS)?;
    }
    Ok(())
}

/// Register a customer for the owner
pub async fn create_customer(pool: &SqlitePool, scope: &OwnerScope, mut profile: CustomerProfile) -> Result<Customer> {
    profile.phone_number = phone::normalize(&profile.phone_number);
    validate_profile(&profile)?;

    let customer = Customer::new(scope.owner_id, profile);

    let mut conn = pool.acquire().await?;
    customers::insert_customer(&mut conn, &customer).await?;

    info!(customer = %customer.guid, "Created customer");
    Ok(customer)
}

/// Active customers, most recently updated first
pub async fn list_customers(pool: &SqlitePool, scope: &OwnerScope) -> Result<Vec<Customer>> {
    let mut conn = pool.acquire().await?;
    customers::list_active_customers(&mut conn, scope.owner_id).await
}

/// An active customer with its consent history
pub async fn get_customer(pool: &SqlitePool, scope: &OwnerScope, customer_id: Uuid) -> Result<CustomerDetail> {
    let mut conn = pool.acquire().await?;

    let customer = customers::load_owned_customer(&mut conn, scope.owner_id, customer_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| Error::NotFound(format!("Customer {}", customer_id)))?;

    let filter = ConsentFilter {
        customer: Some(customer.guid),
        active_only: false,
    };
    let history = consents::list_consent_records(&mut conn, scope.owner_id, &filter).await?;
    let latest_consent = history.iter().find(|r| r.consent.is_active).cloned();

    Ok(CustomerDetail {
        customer,
        consents: history,
        latest_consent,
    })
}

/// Apply a partial update to an active customer
pub async fn update_customer(
    pool: &SqlitePool,
    scope: &OwnerScope,
    customer_id: Uuid,
    patch: CustomerPatch,
) -> Result<Customer> {
    let mut tx = pool.begin().await?;
    lock_customers(&mut tx, scope.owner_id, &[customer_id]).await?;

    let mut customer = customers::load_owned_customer(&mut tx, scope.owner_id, customer_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| Error::NotFound(format!("Customer {}", customer_id)))?;

    for (field, value) in patch {
        let value = match (field, value) {
            (CustomerField::PhoneNumber, FieldValue::Text(raw)) => FieldValue::Text(phone::normalize(&raw)),
            (_, value) => value,
        };
        customer.profile.set(field, value)?;
    }
    validate_profile(&customer.profile)?;

    customer.updated_at = time::now();
    customers::save_customer(&mut tx, &customer).await?;
    tx.commit().await?;

    info!(customer = %customer.guid, "Updated customer");
    Ok(customer)
}

/// Deactivate an active customer and record who did it
pub async fn soft_delete_customer(
    pool: &SqlitePool,
    scope: &OwnerScope,
    customer_id: Uuid,
    reason: &str,
) -> Result<DeleteLog> {
    let mut tx = pool.begin().await?;
    lock_customers(&mut tx, scope.owner_id, &[customer_id]).await?;

    let mut customer = customers::load_owned_customer(&mut tx, scope.owner_id, customer_id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| Error::NotFound(format!("Customer {}", customer_id)))?;

    customer.is_active = false;
    customer.updated_at = time::now();
    customers::save_customer(&mut tx, &customer).await?;

    let log = DeleteLog::new(customer.guid, scope.owner_id, reason.to_string());
    audit::append_delete_log(&mut tx, &log).await?;

    tx.commit().await?;

    info!(customer = %customer.guid, "Soft-deleted customer");
    Ok(log)
}

/// Active customers whose phone contains the normalized query
pub async fn lookup_customers(
    pool: &SqlitePool,
    scope: &OwnerScope,
    raw_phone: &str,
    birth_date: Option<&str>,
) -> Result<Vec<Customer>> {
    let normalized = phone::normalize(raw_phone);
    if normalized.is_empty() {
        return Err(Error::InvalidRequest("'phone' is required".to_string()));
    }
    let birth_date = birth_date.filter(|b| !b.is_empty());

    let mut conn = pool.acquire().await?;
    customers::search_active_by_phone(&mut conn, scope.owner_id, &normalized, birth_date).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_parse_patch_accepts_known_fields() {
        let patch = parse_patch(&object(json!({
            "full_name": "Yamada Taro",
            "birth_date": null,
            "tattoo_experience": true,
        })))
        .unwrap();

        assert_eq!(patch.len(), 3);
        assert!(patch.contains(&(CustomerField::BirthDate, FieldValue::OptionalText(None))));
        assert!(patch.contains(&(CustomerField::TattooExperience, FieldValue::Flag(true))));
    }

    #[test]
    fn test_parse_patch_rejects_unknown_field() {
        let err = parse_patch(&object(json!({ "is_active": false }))).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        assert!(parse_patch(&object(json!({ "merged_into": null }))).is_err());
    }

    #[test]
    fn test_parse_patch_rejects_wrong_shape() {
        assert!(parse_patch(&object(json!({ "tattoo_experience": "yes" }))).is_err());
        assert!(parse_patch(&object(json!({ "full_name": null }))).is_err());
        assert!(parse_patch(&object(json!({ "notes": 3 }))).is_err());
    }
}
