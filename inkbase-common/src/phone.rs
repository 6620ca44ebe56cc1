//! Phone number normalization
//!
//! Every phone number is normalized before it is stored or used for a lookup,
//! so that `０９０-1234-5678`, `+81 90 1234 5678` and `TEL:09012345678` all
//! resolve to the same customer.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// Constant patterns, all exercised by the tests below
static LEADING_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s:]+").expect("label regex is valid"));
static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[()\[\]\s\-–ー−―‐]").expect("separator regex is valid"));
static COUNTRY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?81").expect("country code regex is valid"));
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("non-digit regex is valid"));

/// Normalize a phone number to a digits-only domestic form
///
/// Steps, in order:
/// 1. Unicode NFKC (full-width digits and symbols become ASCII)
/// 2. Drop a leading alphabetic label such as `TEL:` or `Phone:`
/// 3. Remove brackets, whitespace and hyphen variants
/// 4. Rewrite a leading `+81` / `81` country code to `0`
/// 5. Keep digits only
pub fn normalize(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let folded: String = raw.nfkc().collect();
    let unlabeled = LEADING_LABEL.replace(&folded, "");
    let compact = SEPARATORS.replace_all(&unlabeled, "");
    let domestic = COUNTRY_CODE.replace(&compact, "0");
    NON_DIGIT.replace_all(&domestic, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stays_empty() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_plain_digits_unchanged() {
        assert_eq!(normalize("09012345678"), "09012345678");
    }

    #[test]
    fn test_hyphenated() {
        assert_eq!(normalize("090-1234-5678"), "09012345678");
    }

    #[test]
    fn test_full_width_digits_and_hyphens() {
        assert_eq!(normalize("０９０－１２３４－５６７８"), "09012345678");
    }

    #[test]
    fn test_katakana_long_vowel_as_separator() {
        assert_eq!(normalize("090ー1234ー5678"), "09012345678");
    }

    #[test]
    fn test_international_prefix() {
        assert_eq!(normalize("+81 90 1234 5678"), "09012345678");
        assert_eq!(normalize("81-90-1234-5678"), "09012345678");
    }

    #[test]
    fn test_label_and_brackets() {
        assert_eq!(normalize("TEL: 03(1234)5678"), "0312345678");
        assert_eq!(normalize("Phone:[03] 1234 5678"), "0312345678");
    }

    #[test]
    fn test_stray_symbols_removed() {
        assert_eq!(normalize("090.1234.5678#"), "09012345678");
    }
}
