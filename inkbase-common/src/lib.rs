//! # InkBase Common Library
//!
//! Shared code for the InkBase services including:
//! - Database bootstrap (schema, store-level invariants, default settings)
//! - Error type shared by every engine operation
//! - Configuration loading and root folder resolution
//! - Timestamp, UUID and phone-number helpers

pub mod config;
pub mod db;
pub mod error;
pub mod phone;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
