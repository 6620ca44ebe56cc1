//! Artist profile endpoints

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::db::artists::Artist;
use crate::error::ApiResult;
use crate::scope::OwnerScope;
use crate::services::artists;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterArtistRequest {
    pub artist_name: String,
    #[serde(default)]
    pub studio_name: String,
}

/// POST /api/artists/me
pub async fn register_artist(
    State(state): State<AppState>,
    scope: OwnerScope,
    payload: Result<Json<RegisterArtistRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Artist>)> {
    let Json(request) = payload?;
    let artist = artists::register_artist(&state.db, &scope, &request.artist_name, &request.studio_name).await?;
    Ok((StatusCode::CREATED, Json(artist)))
}

/// GET /api/artists/me
pub async fn get_artist(State(state): State<AppState>, scope: OwnerScope) -> ApiResult<Json<Artist>> {
    Ok(Json(artists::artist_for_owner(&state.db, &scope).await?))
}
