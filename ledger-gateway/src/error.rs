//! Error types for ledger gateway operations

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Balance too low for the requested lock or debit
    #[error("insufficient funds: {0}")]
    Insufficient(String),

    /// Negative or otherwise malformed amount
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The call exceeded its deadline
    #[error("ledger call timed out: {0}")]
    Timeout(String),

    /// The wallet store is unreachable
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}
