//! Public consent endpoints
//!
//! No owner context; the entry token in the request is the only credential.

use std::net::SocketAddr;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{ConnectInfo, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use std::convert::Infallible;
use uuid::Uuid;

use crate::db::access_log::ClientInfo;
use crate::error::ApiResult;
use crate::services::public::{
    self, EntryRequest, LookupRequest, PublicCustomerMatch, PublicReceipt, RenewRequest, TokenStatus,
};
use crate::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// First non-empty `X-Forwarded-For` entry
fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = forwarded_ip(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(ClientInfo { ip_address, user_agent })
    }
}

/// POST /api/consent/public/entry
pub async fn entry(
    State(state): State<AppState>,
    client: ClientInfo,
    payload: Result<Json<EntryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PublicReceipt>)> {
    let Json(request) = payload?;
    let receipt = public::entry(&state.db, &state.settings, &client, request).await?;
    let status = if receipt.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(receipt)))
}

/// POST /api/consent/public/renew
pub async fn renew(
    State(state): State<AppState>,
    client: ClientInfo,
    payload: Result<Json<RenewRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PublicReceipt>)> {
    let Json(request) = payload?;
    let receipt = public::renew(&state.db, &state.settings, &client, request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/consent/public/lookup-by-phone
pub async fn lookup_by_phone(
    State(state): State<AppState>,
    client: ClientInfo,
    query: Result<Query<LookupRequest>, QueryRejection>,
) -> ApiResult<Json<Vec<PublicCustomerMatch>>> {
    let Query(request) = query?;
    Ok(Json(public::lookup(&state.db, &state.settings, &client, request).await?))
}

/// GET /api/consent/public/token/:uuid
pub async fn token_status(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<TokenStatus>> {
    let Path(token_id) = path?;
    Ok(Json(public::token_status(&state.db, token_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_ip_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_forwarded_ip_absent_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_ip(&headers), None);

        headers.insert(FORWARDED_FOR, HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(forwarded_ip(&headers), None);
    }
}
