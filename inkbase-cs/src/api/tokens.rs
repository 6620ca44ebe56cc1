//! Entry token administration endpoints

use axum::{
    body::Bytes,
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::tokens::EntryToken;
use crate::error::{ApiError, ApiResult};
use crate::scope::OwnerScope;
use crate::services::tokens;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTokenRequest {
    pub label: Option<String>,
    #[serde(default)]
    pub rotate: bool,
}

impl CreateTokenRequest {
    /// Parse a request body; an empty body means issue-or-reuse without a label
    pub fn from_body(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid token request: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(flatten)]
    pub token: EntryToken,
    /// False when an existing valid token was handed back
    pub created: bool,
}

/// POST /api/consent/public/token/create
///
/// An empty body issues or reuses; `rotate: true` replaces every active token.
pub async fn create_token(
    State(state): State<AppState>,
    scope: OwnerScope,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let request = CreateTokenRequest::from_body(&body)?;
    let label = request.label.as_deref();

    let response = if request.rotate {
        TokenResponse {
            token: tokens::rotate(&state.db, &scope, label).await?,
            created: true,
        }
    } else {
        let outcome = tokens::issue_or_reuse(&state.db, &scope, label).await?;
        TokenResponse {
            created: outcome.was_created(),
            token: outcome.into_inner(),
        }
    };

    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

#[derive(Debug, Deserialize)]
pub struct ExpiryRequest {
    pub expires_at: Option<DateTime<Utc>>,
}

/// PUT /api/consent/public/token/:uuid/expiry
pub async fn set_expiry(
    State(state): State<AppState>,
    scope: OwnerScope,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ExpiryRequest>, JsonRejection>,
) -> ApiResult<Json<EntryToken>> {
    let Path(token_id) = path?;
    let Json(request) = payload?;
    Ok(Json(tokens::set_expiry(&state.db, &scope, token_id, request.expires_at).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_is_default_request() {
        let request = CreateTokenRequest::from_body(b"").unwrap();
        assert!(!request.rotate);
        assert!(request.label.is_none());

        assert!(!CreateTokenRequest::from_body(b"  \n").unwrap().rotate);
    }

    #[test]
    fn test_rotate_flag_parsed() {
        let request = CreateTokenRequest::from_body(br#"{"rotate": true, "label": "new QR"}"#).unwrap();
        assert!(request.rotate);
        assert_eq!(request.label.as_deref(), Some("new QR"));
    }

    #[test]
    fn test_malformed_body_rejected() {
        assert!(CreateTokenRequest::from_body(br#"{"rotate": "true"}"#).is_err());
        assert!(CreateTokenRequest::from_body(br#"{"rotat": true}"#).is_err());
        assert!(CreateTokenRequest::from_body(b"{").is_err());
    }
}
