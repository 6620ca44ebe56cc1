//! inkbase-cs library - Consent Service
//!
//! Customer identity, the signed-consent ledger, customer merging, entry
//! token lifecycle and the public signing workflow for tattoo studios.
//! Every owner-side operation takes an [`scope::OwnerScope`]; public
//! operations are authorized by an entry token alone.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod scope;
pub mod services;

pub use config::RuntimeSettings;
pub use scope::OwnerScope;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Settings loaded at startup
    pub settings: RuntimeSettings,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, settings: RuntimeSettings) -> Self {
        Self { db, settings }
    }
}

/// Build application router
///
/// Owner routes reject requests without an owner context through the
/// `OwnerScope` extractor; public routes need nothing but an entry token.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let owner = Router::new()
        .route(
            "/api/artists/me",
            get(api::artists::get_artist).post(api::artists::register_artist),
        )
        .route(
            "/api/customers",
            get(api::customers::list_customers).post(api::customers::create_customer),
        )
        .route("/api/customers/lookup-by-phone", get(api::customers::lookup_by_phone))
        .route("/api/customers/submit-consent", post(api::customers::submit_consent))
        .route("/api/customers/merge", post(api::customers::merge_customers))
        .route(
            "/api/customers/:uuid",
            get(api::customers::get_customer)
                .patch(api::customers::update_customer)
                .delete(api::customers::delete_customer),
        )
        .route("/api/consent/history", get(api::consents::list_history))
        .route("/api/consent/history/:uuid", get(api::consents::get_history))
        .route("/api/consent/history/:uuid/invalidate", post(api::consents::invalidate))
        .route("/api/consent/public/token/create", post(api::tokens::create_token))
        .route("/api/consent/public/token/:uuid/expiry", put(api::tokens::set_expiry));

    let public = Router::new()
        .route("/api/consent/public/entry", post(api::public::entry))
        .route("/api/consent/public/renew", post(api::public::renew))
        .route("/api/consent/public/lookup-by-phone", get(api::public::lookup_by_phone))
        .route("/api/consent/public/token/:uuid", get(api::public::token_status))
        .merge(api::health_routes());

    let body_limit = state.settings.http_max_body_size_bytes;

    Router::new()
        .merge(owner)
        .merge(public)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
