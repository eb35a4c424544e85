//! Internal helpers for model validation and conversion.
//!
//! Apart from [`normalize_username`], re-exported for front ends that look
//! members up by name, these are **not** part of the public API. They
//! centralize the mapping from stored rows to typed values so a malformed
//! row surfaces as [`EngineError::InconsistentLedger`] instead of leaking
//! into the math.

use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{Currency, EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| EngineError::InconsistentLedger(format!("invalid {label} id: {value}")))
}

/// Parse a currency code stored in the DB into a strongly typed `Currency`.
pub(crate) fn model_currency(value: &str) -> ResultEngine<Currency> {
    Currency::try_from(value)
        .map_err(|_| EngineError::InconsistentLedger(format!("invalid stored currency: {value}")))
}

/// Canonical form of a username: NFKC, lowercase, no whitespace.
pub fn normalize_username(raw: &str) -> ResultEngine<String> {
    let normalized: String = raw.trim().nfkc().flat_map(char::to_lowercase).collect();
    if normalized.is_empty() {
        return Err(EngineError::InvalidName(
            "username must not be empty".to_string(),
        ));
    }
    if normalized.chars().any(char::is_whitespace) {
        return Err(EngineError::InvalidName(format!(
            "username must not contain spaces: {normalized}"
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_case_and_width_folded() {
        assert_eq!(normalize_username("  Alice ").unwrap(), "alice");
        assert_eq!(normalize_username("ＢＯＢ").unwrap(), "bob");
    }

    #[test]
    fn usernames_reject_blank_and_spaces() {
        assert!(matches!(
            normalize_username("   "),
            Err(EngineError::InvalidName(_))
        ));
        assert!(normalize_username("al ice").is_err());
    }
}
