//! Owner-side customer endpoints

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::db::audit::DeleteLog;
use crate::db::consents::{Consent, ConsentTerms};
use crate::db::customers::{Customer, CustomerProfile};
use crate::error::ApiResult;
use crate::scope::OwnerScope;
use crate::services::customers::{self, CustomerDetail};
use crate::services::merge::{self, MergeOutcome};
use crate::services::consents;
use crate::AppState;

/// GET /api/customers
pub async fn list_customers(State(state): State<AppState>, scope: OwnerScope) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(customers::list_customers(&state.db, &scope).await?))
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    scope: OwnerScope,
    payload: Result<Json<CustomerProfile>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let Json(profile) = payload?;
    let customer = customers::create_customer(&state.db, &scope, profile).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /api/customers/:uuid
pub async fn get_customer(
    State(state): State<AppState>,
    scope: OwnerScope,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<CustomerDetail>> {
    let Path(customer_id) = path?;
    Ok(Json(customers::get_customer(&state.db, &scope, customer_id).await?))
}

/// PATCH /api/customers/:uuid
pub async fn update_customer(
    State(state): State<AppState>,
    scope: OwnerScope,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> ApiResult<Json<Customer>> {
    let Path(customer_id) = path?;
    let Json(body) = payload?;
    let patch = customers::parse_patch(&body)?;
    Ok(Json(customers::update_customer(&state.db, &scope, customer_id, patch).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    pub reason: Option<String>,
}

/// DELETE /api/customers/:uuid
pub async fn delete_customer(
    State(state): State<AppState>,
    scope: OwnerScope,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> ApiResult<Json<DeleteLog>> {
    let Path(customer_id) = path?;
    let Query(query) = query?;
    let reason = query
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "deleted by owner".to_string());

    Ok(Json(
        customers::soft_delete_customer(&state.db, &scope, customer_id, &reason).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub phone: String,
    pub birth_date: Option<String>,
}

/// GET /api/customers/lookup-by-phone
pub async fn lookup_by_phone(
    State(state): State<AppState>,
    scope: OwnerScope,
    query: Result<Query<LookupQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Customer>>> {
    let Query(query) = query?;
    let found = customers::lookup_customers(&state.db, &scope, &query.phone, query.birth_date.as_deref()).await?;
    Ok(Json(found))
}

#[derive(Debug, Deserialize)]
pub struct SubmitConsentRequest {
    pub customer_uuid: Uuid,
    pub consent_version: String,
    pub privacy_agreement_version: String,
    pub signature: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub privacy_agreement_agreed_at: Option<DateTime<Utc>>,
    pub visit_date: Option<String>,
}

/// POST /api/customers/submit-consent
pub async fn submit_consent(
    State(state): State<AppState>,
    scope: OwnerScope,
    payload: Result<Json<SubmitConsentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Consent>)> {
    let Json(request) = payload?;
    let terms = ConsentTerms {
        consent_version: request.consent_version,
        privacy_agreement_version: request.privacy_agreement_version,
        signature: request.signature,
        privacy_agreement_agreed_at: request.privacy_agreement_agreed_at,
        visit_date: request.visit_date,
    };

    let consent = consents::submit_consent(&state.db, &scope, request.customer_uuid, terms, request.signed_at).await?;
    Ok((StatusCode::CREATED, Json(consent)))
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub keep_uuid: Uuid,
    pub merged_uuid: Uuid,
    #[serde(default)]
    pub overwrite: bool,
}

/// POST /api/customers/merge
pub async fn merge_customers(
    State(state): State<AppState>,
    scope: OwnerScope,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> ApiResult<Json<MergeOutcome>> {
    let Json(request) = payload?;
    let outcome = merge::merge_customers(
        &state.db,
        &scope,
        request.keep_uuid,
        request.merged_uuid,
        request.overwrite,
    )
    .await?;
    Ok(Json(outcome))
}
