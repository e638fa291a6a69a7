//! Error types for the yield engine

use thiserror::Error;

/// Result type for yield operations
pub type Result<T> = std::result::Result<T, Error>;

/// Yield engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Accrual bookkeeping error
    #[error("accrual error: {0}")]
    Accrual(String),

    /// Entry or parcel not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Wallet gateway error
    #[error("ledger error: {0}")]
    Ledger(#[from] ledger_gateway::Error),

    /// Shared kernel error
    #[error(transparent)]
    Core(#[from] parcel_core::Error),
}
