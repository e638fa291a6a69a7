//! Error taxonomy shared across the marketplace workspace

use thiserror::Error;

/// Result type for parcel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Marketplace error taxonomy
///
/// Every failure in the core falls into one of these classes:
///
/// - `Validation`: malformed input, caller's fault, surfaced verbatim
/// - `Policy`: legal-but-disallowed action (wrong status, below floor,
///   duplicate pending offer, campaign cap reached); not retried
/// - `Conflict`: a concurrent settlement/cancel race was lost; safe to
///   retry once
/// - `Escrow`: insufficient funds or a ledger timeout; no partial state
///   is retained
/// - `Dependency`: a collaborator (identity, dynasty, ledger) is
///   unreachable; operations fail closed
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input
    #[error("validation error: {0}")]
    Validation(String),

    /// Disallowed by marketplace rules
    #[error("policy violation: {0}")]
    Policy(String),

    /// Lost a concurrency race (version mismatch)
    #[error("resource conflict: {0}")]
    Conflict(String),

    /// Escrow lock/convert/release failed
    #[error("escrow failure: {0}")]
    Escrow(String),

    /// External collaborator unreachable
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
