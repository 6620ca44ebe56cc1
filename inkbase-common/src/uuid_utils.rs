//! UUID utilities

use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID read back from a TEXT column
pub fn from_db(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| Error::corrupt(column, value))
}

/// Parse an optional UUID read back from a nullable TEXT column
pub fn from_db_opt(column: &str, value: Option<String>) -> Result<Option<Uuid>> {
    value.map(|v| from_db(column, &v)).transpose()
}
