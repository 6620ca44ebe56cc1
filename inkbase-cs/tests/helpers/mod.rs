//! Shared fixtures for inkbase-cs integration tests
//!
//! Each test gets its own file-backed database in a temporary directory.

#![allow(dead_code)]

use inkbase_common::db::init_database;
use inkbase_cs::db::access_log::ClientInfo;
use inkbase_cs::db::artists::Artist;
use inkbase_cs::db::consents::ConsentTerms;
use inkbase_cs::db::customers::{Customer, CustomerProfile};
use inkbase_cs::db::tokens::EntryToken;
use inkbase_cs::services::public::{EntryRequest, RenewRequest};
use inkbase_cs::services::{artists, customers, tokens};
use inkbase_cs::{OwnerScope, RuntimeSettings};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Test database; keep the `TempDir` alive for the pool's lifetime
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn setup_db() -> TestDb {
    let dir = TempDir::new().expect("Should create temp dir");
    let pool = init_database(&dir.path().join("inkbase.db"))
        .await
        .expect("Should initialize database");
    TestDb { pool, _dir: dir }
}

pub fn new_owner() -> OwnerScope {
    OwnerScope::new(Uuid::new_v4())
}

pub async fn register_artist(pool: &SqlitePool, scope: &OwnerScope, name: &str) -> Artist {
    artists::register_artist(pool, scope, name, "Studio Sumi")
        .await
        .expect("Should register artist")
}

pub fn profile(full_name: &str, phone: &str) -> CustomerProfile {
    CustomerProfile {
        full_name: full_name.to_string(),
        phone_number: phone.to_string(),
        birth_date: Some("1990-04-01".to_string()),
        ..Default::default()
    }
}

pub async fn create_customer(pool: &SqlitePool, scope: &OwnerScope, full_name: &str, phone: &str) -> Customer {
    customers::create_customer(pool, scope, profile(full_name, phone))
        .await
        .expect("Should create customer")
}

pub async fn issue_token(pool: &SqlitePool, scope: &OwnerScope) -> EntryToken {
    tokens::issue_or_reuse(pool, scope, Some("front desk"))
        .await
        .expect("Should issue token")
        .into_inner()
}

pub fn terms(version: &str) -> ConsentTerms {
    ConsentTerms {
        consent_version: version.to_string(),
        privacy_agreement_version: "p1".to_string(),
        signature: Some("data:image/png;base64,AAAA".to_string()),
        ..Default::default()
    }
}

pub fn client() -> ClientInfo {
    ClientInfo {
        ip_address: "198.51.100.4".to_string(),
        user_agent: "test-agent/1.0".to_string(),
    }
}

pub fn settings() -> RuntimeSettings {
    RuntimeSettings::default()
}

pub fn entry_request(token: Uuid, full_name: &str, phone: &str, version: &str) -> EntryRequest {
    EntryRequest {
        entry_token: token,
        full_name: full_name.to_string(),
        gender: "female".to_string(),
        birth_date: "1990-04-01".to_string(),
        prefecture: "Tokyo".to_string(),
        city: "Shibuya".to_string(),
        phone_number: phone.to_string(),
        consent_version: version.to_string(),
        privacy_agreement_version: "p1".to_string(),
        signature: "data:image/png;base64,AAAA".to_string(),
    }
}

pub fn renew_request(token: Uuid, customer: Uuid, version: &str) -> RenewRequest {
    RenewRequest {
        entry_token: token,
        customer_uuid: customer,
        consent_version: version.to_string(),
        privacy_agreement_version: "p1".to_string(),
        signature: "data:image/png;base64,BBBB".to_string(),
    }
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("Should count rows")
}
