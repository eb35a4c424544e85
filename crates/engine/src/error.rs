//! The module contains the errors the engine can throw.
//!
//! Three of them signal problems with the money math itself and are the
//! ones a caller must be able to tell apart:
//!
//! - [`InvalidSplit`] thrown when an amount is split among zero participants.
//! - [`InconsistentLedger`] thrown when items or assignments do not partition
//!   their parent amount. Raised before any balance is computed.
//! - [`UnbalancedLedger`] thrown when computed balances do not sum to zero.
//!
//! The remaining variants cover input validation and the store.
//!
//!  [`InvalidSplit`]: EngineError::InvalidSplit
//!  [`InconsistentLedger`]: EngineError::InconsistentLedger
//!  [`UnbalancedLedger`]: EngineError::UnbalancedLedger
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Inconsistent ledger: {0}")]
    InconsistentLedger(String),
    #[error("Unbalanced ledger: {0}")]
    UnbalancedLedger(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Invalid trip code: {0}")]
    InvalidTripCode(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("\"{0}\" already settled!")]
    AlreadySettled(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for data-integrity faults.
    ///
    /// These are never transient: retrying the same request against the same
    /// data fails the same way, so callers should alert instead of retrying.
    #[must_use]
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            Self::InconsistentLedger(_) | Self::UnbalancedLedger(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::InconsistentLedger(a), Self::InconsistentLedger(b)) => a == b,
            (Self::UnbalancedLedger(a), Self::UnbalancedLedger(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InvalidTripCode(a), Self::InvalidTripCode(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::AlreadySettled(a), Self::AlreadySettled(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
