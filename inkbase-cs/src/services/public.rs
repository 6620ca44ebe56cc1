//! Public Consent Workflow
//!
//! Driven by an unauthenticated caller holding an entry token. Every write
//! path opens its transaction on the token row, re-checks validity under the
//! lock, writes, appends an access-log row, commits, and only then touches
//! the token's `last_used_at`.

use inkbase_common::{phone, time, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::consents::validate_terms;
use super::tokens::{self, check_token, require_valid_token};
use super::{
    require, MAX_BIRTH_DATE_CHARS, MAX_GENDER_CHARS, MAX_NAME_CHARS, MAX_PHONE_CHARS, MAX_REGION_CHARS,
    MAX_VERSION_CHARS,
};
use crate::config::RuntimeSettings;
use crate::db::access_log::{self, AccessLogEntry, ClientInfo};
use crate::db::artists::Artist;
use crate::db::consents::{self, Consent, ConsentOrigin, ConsentTerms};
use crate::db::customers::{self, Customer, CustomerProfile};
use crate::db::tokens::EntryToken;
use crate::db::lock_token;

/// First-time signature form
#[derive(Debug, Clone, Deserialize)]
pub struct EntryRequest {
    pub entry_token: Uuid,
    pub full_name: String,
    pub gender: String,
    pub birth_date: String,
    pub prefecture: String,
    pub city: String,
    pub phone_number: String,
    pub consent_version: String,
    pub privacy_agreement_version: String,
    pub signature: String,
}

/// Re-signature form for a customer picked via lookup
#[derive(Debug, Clone, Deserialize)]
pub struct RenewRequest {
    pub entry_token: Uuid,
    pub customer_uuid: Uuid,
    pub consent_version: String,
    pub privacy_agreement_version: String,
    pub signature: String,
}

/// Returning-customer lookup
#[derive(Debug, Clone, Deserialize)]
pub struct LookupRequest {
    pub entry_token: Uuid,
    pub phone: String,
    pub birth_date: String,
}

/// Identifiers handed back to the public client
#[derive(Debug, Clone, Serialize)]
pub struct PublicReceipt {
    pub customer_uuid: Uuid,
    pub consent_uuid: Uuid,
    /// False when an earlier Entry for the same version was returned
    pub created: bool,
}

/// Customer offered to a returning signer
#[derive(Debug, Clone, Serialize)]
pub struct PublicCustomerMatch {
    pub uuid: Uuid,
    pub full_name: String,
}

/// Public-facing artist identity
#[derive(Debug, Clone, Serialize)]
pub struct ArtistSummary {
    pub uuid: Uuid,
    pub artist_name: String,
    pub studio_name: String,
}

/// Whether a token can be used, and for whom
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub valid: bool,
    pub reason: Option<&'static str>,
    pub artist: Option<ArtistSummary>,
}

fn signature_terms(consent_version: &str, privacy_agreement_version: &str, signature: &str) -> Result<ConsentTerms> {
    require("signature", signature, usize::MAX)?;
    require("privacy_agreement_version", privacy_agreement_version, MAX_VERSION_CHARS)?;

    let terms = ConsentTerms {
        consent_version: consent_version.to_string(),
        privacy_agreement_version: privacy_agreement_version.to_string(),
        signature: Some(signature.to_string()),
        privacy_agreement_agreed_at: None,
        visit_date: None,
    };
    validate_terms(&terms)?;
    Ok(terms)
}

fn normalized_phone(raw: &str) -> Result<String> {
    require("phone_number", raw, MAX_PHONE_CHARS)?;
    let normalized = phone::normalize(raw);
    if normalized.is_empty() {
        return Err(Error::InvalidRequest("'phone_number' has no digits".to_string()));
    }
    Ok(normalized)
}

async fn log_access(
    conn: &mut SqliteConnection,
    token: &EntryToken,
    client: &ClientInfo,
    customer_phone: &str,
    settings: &RuntimeSettings,
) -> Result<()> {
    let entry = AccessLogEntry::new(
        token.guid,
        client,
        customer_phone,
        settings.access_log_user_agent_max_chars,
    );
    access_log::append(conn, &entry).await
}

/// Pick the customer an Entry signs under
///
/// Prefers an active match; a merged-away match resolves to its survivor. A
/// soft-deleted match is ignored so the signer gets a fresh record.
async fn resolve_entry_customer(conn: &mut SqliteConnection, artist: &Artist, phone: &str) -> Result<Option<Customer>> {
    let matches = customers::find_by_phone(conn, artist.owner_id, phone).await?;

    if let Some(active) = matches.iter().find(|c| c.is_active) {
        return Ok(Some(active.clone()));
    }

    for candidate in &matches {
        if let Some(root) = candidate.merged_into {
            let survivor = customers::load_owned_customer(conn, artist.owner_id, root).await?;
            if let Some(survivor) = survivor.filter(|c| c.is_active) {
                return Ok(Some(survivor));
            }
        }
    }

    Ok(None)
}

/// New-signature path
///
/// Finds the owner's customer by phone (creating one if absent), overwrites
/// its identity fields with the submitted ones, and signs. Idempotent per
/// (customer, consent version): a repeat returns the first consent.
pub async fn entry(
    pool: &SqlitePool,
    settings: &RuntimeSettings,
    client: &ClientInfo,
    request: EntryRequest,
) -> Result<PublicReceipt> {
    require("full_name", &request.full_name, MAX_NAME_CHARS)?;
    require("gender", &request.gender, MAX_GENDER_CHARS)?;
    require("birth_date", &request.birth_date, MAX_BIRTH_DATE_CHARS)?;
    require("prefecture", &request.prefecture, MAX_REGION_CHARS)?;
    require("city", &request.city, MAX_REGION_CHARS)?;
    let phone = normalized_phone(&request.phone_number)?;
    let mut terms = signature_terms(
        &request.consent_version,
        &request.privacy_agreement_version,
        &request.signature,
    )?;

    let mut tx = pool.begin().await?;
    lock_token(&mut tx, request.entry_token).await?;

    let now = time::now();
    let (token, artist) = require_valid_token(&mut tx, request.entry_token, &now).await?;

    let customer = match resolve_entry_customer(&mut tx, &artist, &phone).await? {
        Some(mut customer) => {
            let profile = &mut customer.profile;
            profile.full_name = request.full_name.clone();
            profile.gender = request.gender.clone();
            profile.birth_date = Some(request.birth_date.clone());
            profile.prefecture = request.prefecture.clone();
            profile.city = request.city.clone();
            profile.phone_number = phone.clone();
            profile.tattooist = artist.artist_name.clone();
            customer.updated_at = now;
            customers::save_customer(&mut tx, &customer).await?;
            customer
        }
        None => {
            let profile = CustomerProfile {
                full_name: request.full_name.clone(),
                gender: request.gender.clone(),
                birth_date: Some(request.birth_date.clone()),
                prefecture: request.prefecture.clone(),
                city: request.city.clone(),
                phone_number: phone.clone(),
                tattooist: artist.artist_name.clone(),
                ..Default::default()
            };
            let customer = Customer::new(artist.owner_id, profile);
            customers::insert_customer(&mut tx, &customer).await?;
            customer
        }
    };

    terms.privacy_agreement_agreed_at = Some(now);
    let consent = Consent::sign(&customer, ConsentOrigin::Entry, terms, now);
    let outcome = consents::insert_entry_consent(&mut tx, &consent).await?;

    log_access(&mut tx, &token, client, &phone, settings).await?;
    tx.commit().await?;

    tokens::touch(pool, token.guid).await;

    let created = outcome.was_created();
    let consent = outcome.into_inner();
    if created {
        info!(customer = %customer.guid, consent = %consent.guid, "Public entry recorded");
    } else {
        info!(customer = %customer.guid, consent = %consent.guid, "Public entry repeated, returning existing consent");
    }

    Ok(PublicReceipt {
        customer_uuid: customer.guid,
        consent_uuid: consent.guid,
        created,
    })
}

/// Re-signature path
///
/// Always appends a new consent. A merged-away customer signs under its
/// survivor.
pub async fn renew(
    pool: &SqlitePool,
    settings: &RuntimeSettings,
    client: &ClientInfo,
    request: RenewRequest,
) -> Result<PublicReceipt> {
    let mut terms = signature_terms(
        &request.consent_version,
        &request.privacy_agreement_version,
        &request.signature,
    )?;

    let mut tx = pool.begin().await?;
    lock_token(&mut tx, request.entry_token).await?;

    let now = time::now();
    let (token, artist) = require_valid_token(&mut tx, request.entry_token, &now).await?;

    let customer = customers::load_customer(&mut tx, request.customer_uuid)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Customer {}", request.customer_uuid)))?;

    if customer.owner_id != artist.owner_id {
        return Err(Error::Forbidden(
            "This entry code cannot renew this customer's consent".to_string(),
        ));
    }

    let customer = if customer.is_active {
        customer
    } else {
        let survivor = match customer.merged_into {
            Some(root) => customers::load_owned_customer(&mut tx, artist.owner_id, root).await?,
            None => None,
        };
        survivor
            .filter(|c| c.is_active)
            .ok_or_else(|| Error::InvalidRequest(format!("Customer {} is not active", customer.guid)))?
    };

    terms.privacy_agreement_agreed_at = Some(now);
    let consent = Consent::sign(&customer, ConsentOrigin::Renew, terms, now);
    consents::insert_consent(&mut tx, &consent).await?;

    log_access(&mut tx, &token, client, &customer.profile.phone_number, settings).await?;
    tx.commit().await?;

    tokens::touch(pool, token.guid).await;

    info!(customer = %customer.guid, consent = %consent.guid, "Public renewal recorded");

    Ok(PublicReceipt {
        customer_uuid: customer.guid,
        consent_uuid: consent.guid,
        created: true,
    })
}

/// Every customer of the token's owner with this phone and birth date
pub async fn lookup(
    pool: &SqlitePool,
    settings: &RuntimeSettings,
    client: &ClientInfo,
    request: LookupRequest,
) -> Result<Vec<PublicCustomerMatch>> {
    let phone = normalized_phone(&request.phone)?;
    require("birth_date", &request.birth_date, MAX_BIRTH_DATE_CHARS)?;

    let mut tx = pool.begin().await?;
    lock_token(&mut tx, request.entry_token).await?;

    let (token, artist) = require_valid_token(&mut tx, request.entry_token, &time::now()).await?;

    let found =
        customers::find_by_phone_and_birth_date(&mut tx, artist.owner_id, &phone, &request.birth_date).await?;

    log_access(&mut tx, &token, client, &phone, settings).await?;
    tx.commit().await?;

    debug!(token = %token.guid, matches = found.len(), "Public lookup");

    Ok(found
        .into_iter()
        .map(|c| PublicCustomerMatch {
            uuid: c.guid,
            full_name: c.profile.full_name,
        })
        .collect())
}

/// Validity of a token and, when valid, the artist it belongs to
pub async fn token_status(pool: &SqlitePool, token_id: Uuid) -> Result<TokenStatus> {
    let mut conn = pool.acquire().await?;

    let status = match check_token(&mut conn, token_id, &time::now()).await? {
        Ok((_, artist)) => TokenStatus {
            valid: true,
            reason: None,
            artist: Some(ArtistSummary {
                uuid: artist.guid,
                artist_name: artist.artist_name,
                studio_name: artist.studio_name,
            }),
        },
        Err(rejection) => TokenStatus {
            valid: false,
            reason: Some(rejection.reason()),
            artist: None,
        },
    };

    Ok(status)
}
