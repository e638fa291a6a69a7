//! Ledger Gateway
//!
//! Abstraction over the external wallet store. The marketplace never
//! touches balances directly; it locks, unlocks, credits and debits named
//! asset balances per user through the [`LedgerGateway`] trait.
//!
//! Two implementations ship here:
//!
//! - [`InMemoryLedger`]: reference implementation for tests and local runs
//! - [`BoundedGateway`]: decorator adding a hard deadline to every call so
//!   settlement and escrow operations never block indefinitely

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod gateway;
pub mod memory;
pub mod timeout;

// Re-exports
pub use error::{Error, Result};
pub use gateway::LedgerGateway;
pub use memory::InMemoryLedger;
pub use timeout::BoundedGateway;
