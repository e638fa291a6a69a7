//! Yield Accrual Engine
//!
//! Owned parcels produce passive yield: every cycle (3 hours by default)
//! each active owner is credited `stability × rate` of the parcel class's
//! yield asset through the ledger gateway.
//!
//! # Guarantees
//!
//! - **Idempotency**: every accrual entry remembers the last credited
//!   cycle; re-running a cycle is a no-op for already-credited entries
//! - **Ownership intervals**: a sale deactivates the outgoing owner's
//!   entry immediately (no pro-rating) and starts the incoming owner at
//!   the next cycle boundary
//! - **Fault isolation**: an unreachable wallet store skips the parcel for
//!   this run; the cycle is not marked credited, so the next sweep retries

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accrual;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod types;

// Re-exports
pub use accrual::{AccrualLedger, CycleReport};
pub use config::YieldConfig;
pub use error::{Error, Result};
pub use scheduler::AccrualScheduler;
pub use types::{CycleId, YieldAccrual};
