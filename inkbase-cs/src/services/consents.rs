//! Consent Ledger operations for the owner

use chrono::{DateTime, Utc};
use inkbase_common::{time, Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{check_length, require, MAX_BIRTH_DATE_CHARS, MAX_VERSION_CHARS};
use crate::db::consents::{self, Consent, ConsentFilter, ConsentOrigin, ConsentRecord, ConsentTerms};
use crate::db::customers;
use crate::db::lock_customers;
use crate::scope::OwnerScope;

/// Check the signer-supplied fields of a consent
pub(crate) fn validate_terms(terms: &ConsentTerms) -> Result<()> {
    require("consent_version", &terms.consent_version, MAX_VERSION_CHARS)?;
    check_length(
        "privacy_agreement_version",
        &terms.privacy_agreement_version,
        MAX_VERSION_CHARS,
    )?;
    if let Some(visit_date) = &terms.visit_date {
        check_length("visit_date", visit_date, MAX_BIRTH_DATE_CHARS)?;
    }
    Ok(())
}

/// Record a consent signed in front of the owner
///
/// `signed_at` defaults to now.
pub async fn submit_consent(
    pool: &SqlitePool,
    scope: &OwnerScope,
    customer_id: Uuid,
    terms: ConsentTerms,
    signed_at: Option<DateTime<Utc>>,
) -> Result<Consent> {
    validate_terms(&terms)?;

    let mut tx = pool.begin().await?;
    lock_customers(&mut tx, scope.owner_id, &[customer_id]).await?;

    let customer = customers::load_customer(&mut tx, customer_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Customer {}", customer_id)))?;

    if customer.owner_id != scope.owner_id {
        return Err(Error::Forbidden(
            "Consents can only be recorded for your own customers".to_string(),
        ));
    }
    if !customer.is_active {
        return Err(Error::InvalidRequest(format!("Customer {} is not active", customer_id)));
    }

    let consent = Consent::sign(&customer, ConsentOrigin::Owner, terms, signed_at.unwrap_or_else(time::now));
    consents::insert_consent(&mut tx, &consent).await?;
    tx.commit().await?;

    info!(customer = %customer.guid, consent = %consent.guid, "Recorded owner-submitted consent");
    Ok(consent)
}

/// Owner's consents, newest signature first
pub async fn list_consents(pool: &SqlitePool, scope: &OwnerScope, filter: &ConsentFilter) -> Result<Vec<ConsentRecord>> {
    let mut conn = pool.acquire().await?;
    consents::list_consent_records(&mut conn, scope.owner_id, filter).await
}

/// One of the owner's consents
pub async fn get_consent(pool: &SqlitePool, scope: &OwnerScope, consent_id: Uuid) -> Result<ConsentRecord> {
    let mut conn = pool.acquire().await?;
    consents::load_consent_record(&mut conn, scope.owner_id, consent_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Consent {}", consent_id)))
}

/// Soft-invalidate a consent; invalidating twice is a no-op
pub async fn invalidate_consent(pool: &SqlitePool, scope: &OwnerScope, consent_id: Uuid) -> Result<ConsentRecord> {
    let mut conn = pool.acquire().await?;

    // Ownership is checked before the write
    consents::load_consent_record(&mut conn, scope.owner_id, consent_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Consent {}", consent_id)))?;

    if consents::invalidate_consent(&mut conn, consent_id, &time::now()).await? {
        info!(consent = %consent_id, "Invalidated consent");
    }

    consents::load_consent_record(&mut conn, scope.owner_id, consent_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Consent {}", consent_id)))
}
