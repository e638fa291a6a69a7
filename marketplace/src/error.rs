//! Error types for marketplace operations
//!
//! The variants mirror the workspace error taxonomy; gateway failures are
//! folded in so callers see one surface: insufficient funds and ledger
//! timeouts become escrow failures, an unreachable wallet store becomes a
//! dependency failure and the operation fails closed.

use thiserror::Error;

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Marketplace errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input
    #[error("validation error: {0}")]
    Validation(String),

    /// Legal-but-disallowed action
    #[error("policy violation: {0}")]
    Policy(String),

    /// Lost a settlement/cancel race; safe to retry once
    #[error("resource conflict: {0}")]
    Conflict(String),

    /// Escrow lock, conversion or release failed
    #[error("escrow failure: {0}")]
    Escrow(String),

    /// Collaborator unreachable
    #[error("dependency unavailable: {0}")]
    Dependency(String),

    /// Entity does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Whether the caller may safely retry the operation once
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl From<parcel_core::Error> for Error {
    fn from(err: parcel_core::Error) -> Self {
        match err {
            parcel_core::Error::Validation(s) => Error::Validation(s),
            parcel_core::Error::Policy(s) => Error::Policy(s),
            parcel_core::Error::Conflict(s) => Error::Conflict(s),
            parcel_core::Error::Escrow(s) => Error::Escrow(s),
            parcel_core::Error::Dependency(s) => Error::Dependency(s),
            parcel_core::Error::NotFound(s) => Error::NotFound(s),
        }
    }
}

impl From<ledger_gateway::Error> for Error {
    fn from(err: ledger_gateway::Error) -> Self {
        match err {
            ledger_gateway::Error::Insufficient(s) => Error::Escrow(s),
            ledger_gateway::Error::InvalidAmount(s) => Error::Validation(s),
            ledger_gateway::Error::Timeout(s) => Error::Escrow(s),
            ledger_gateway::Error::Unavailable(s) => Error::Dependency(s),
        }
    }
}

impl From<yield_engine::Error> for Error {
    fn from(err: yield_engine::Error) -> Self {
        match err {
            yield_engine::Error::Accrual(s) => Error::Dependency(s),
            yield_engine::Error::NotFound(s) => Error::NotFound(s),
            yield_engine::Error::Ledger(e) => e.into(),
            yield_engine::Error::Core(e) => e.into(),
        }
    }
}
