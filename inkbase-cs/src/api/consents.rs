//! Consent history endpoints

use axum::{
    extract::rejection::{PathRejection, QueryRejection},
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::consents::{ConsentFilter, ConsentRecord};
use crate::error::{ApiError, ApiResult};
use crate::scope::OwnerScope;
use crate::services::consents;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub customer: Option<Uuid>,
    pub active_only: Option<String>,
}

/// Query flag parsing: `1`, `true` and `True` enable, absent disables
fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool, ApiError> {
    match raw {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("True") => Ok(true),
        Some("0") | Some("false") | Some("False") => Ok(false),
        Some(other) => Err(ApiError::BadRequest(format!("'{}' must be a boolean, got '{}'", name, other))),
    }
}

/// GET /api/consent/history
pub async fn list_history(
    State(state): State<AppState>,
    scope: OwnerScope,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ConsentRecord>>> {
    let Query(query) = query?;
    let filter = ConsentFilter {
        customer: query.customer,
        active_only: parse_flag("active_only", query.active_only.as_deref())?,
    };
    Ok(Json(consents::list_consents(&state.db, &scope, &filter).await?))
}

/// GET /api/consent/history/:uuid
pub async fn get_history(
    State(state): State<AppState>,
    scope: OwnerScope,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ConsentRecord>> {
    let Path(consent_id) = path?;
    Ok(Json(consents::get_consent(&state.db, &scope, consent_id).await?))
}

/// POST /api/consent/history/:uuid/invalidate
pub async fn invalidate(
    State(state): State<AppState>,
    scope: OwnerScope,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ConsentRecord>> {
    let Path(consent_id) = path?;
    Ok(Json(consents::invalidate_consent(&state.db, &scope, consent_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag("f", None).unwrap());
        assert!(parse_flag("f", Some("1")).unwrap());
        assert!(parse_flag("f", Some("true")).unwrap());
        assert!(parse_flag("f", Some("True")).unwrap());
        assert!(!parse_flag("f", Some("0")).unwrap());
        assert!(parse_flag("f", Some("yes")).is_err());
    }
}
