//! Owner context extraction
//!
//! Credential checks happen upstream. The authenticator forwards the
//! verified owner id in the `x-inkbase-owner` header; a request without a
//! well-formed id never reaches an owner route.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;
use crate::scope::OwnerScope;

/// Header carrying the authenticated owner id
pub const OWNER_HEADER: &str = "x-inkbase-owner";

#[axum::async_trait]
impl<S> FromRequestParts<S> for OwnerScope
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Owner context missing".to_string()))?;

        let owner_id = value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| ApiError::Unauthorized("Owner context malformed".to_string()))?;

        Ok(OwnerScope::new(owner_id))
    }
}
