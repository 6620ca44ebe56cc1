//! Engine operations
//!
//! Each operation is one short unit of work against the store. Validation
//! runs before any write; write sequences run inside a single transaction
//! that opens by taking the write lock (see [`crate::db`]).

pub mod artists;
pub mod consents;
pub mod customers;
pub mod merge;
pub mod public;
pub mod tokens;

use inkbase_common::{Error, Result};

/// Length limits on caller-supplied strings, in characters
pub const MAX_NAME_CHARS: usize = 255;
pub const MAX_VERSION_CHARS: usize = 64;
pub const MAX_BIRTH_DATE_CHARS: usize = 10;
pub const MAX_LABEL_CHARS: usize = 100;
pub const MAX_GENDER_CHARS: usize = 16;
pub const MAX_REGION_CHARS: usize = 64;
pub const MAX_PHONE_CHARS: usize = 32;

/// Reject a value longer than `max` characters
pub(crate) fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::InvalidRequest(format!(
            "'{}' must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Reject an empty (after trimming) or over-long value
pub(crate) fn require(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidRequest(format!("'{}' is required", field)));
    }
    check_length(field, value, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_blank() {
        assert!(require("full_name", "   ", 10).is_err());
        assert!(require("full_name", "Taro", 10).is_ok());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Ten kana are thirty bytes
        assert!(check_length("birth_date", "あいうえおかきくけこ", 10).is_ok());
        assert!(check_length("birth_date", "あいうえおかきくけこさ", 10).is_err());
    }
}
