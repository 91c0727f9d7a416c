//! The module contains the errors the ledger can return.
//!
//! Transaction plumbing gets its own variants so callers can tell apart a
//! store that never started a transaction ([`TransactionStart`]) from one that
//! failed mid-flight ([`Database`]) or failed while cleaning up
//! ([`RollbackFailed`], which keeps both causes).
//!
//! [`TransactionStart`]: LedgerError::TransactionStart
//! [`Database`]: LedgerError::Database
//! [`RollbackFailed`]: LedgerError::RollbackFailed
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds on account {0}")]
    InsufficientFunds(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("Failed to begin transaction: {0}")]
    TransactionStart(#[source] DbErr),
    #[error("Transaction error: {source}, rollback error: {rollback}")]
    RollbackFailed {
        source: Box<LedgerError>,
        rollback: DbErr,
    },
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::TransactionStart(a), Self::TransactionStart(b)) => {
                a.to_string() == b.to_string()
            }
            (
                Self::RollbackFailed {
                    source: a,
                    rollback: a_rb,
                },
                Self::RollbackFailed {
                    source: b,
                    rollback: b_rb,
                },
            ) => a == b && a_rb.to_string() == b_rb.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
