//! LandGrid Parcel Core
//!
//! Shared kernel for the parcel marketplace: identifiers, the parcel and
//! properties model, the class-specific status machine, the error taxonomy
//! used across the workspace, collaborator traits (identity/KYC, dynasty,
//! notifications), and the in-memory parcel registry.
//!
//! # Invariants
//!
//! - A parcel has exactly one properties record, created with it
//! - Status transitions follow the legal-transition table; everything else
//!   is a policy error
//! - Every mutation bumps the parcel's version counter, enabling optimistic
//!   arbitration without a shared lock map

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod directory;
pub mod error;
pub mod registry;
pub mod status;
pub mod types;

// Re-exports
pub use directory::{
    DynastyDirectory, IdentityDirectory, LogNotifier, NotificationSink, NotifyEvent,
    StaticDirectory,
};
pub use error::{Error, Result};
pub use registry::{ParcelRegistry, ParcelSnapshot};
pub use status::{ParcelStatus, StatusKind};
pub use types::{AgeBracket, Asset, Parcel, ParcelClass, ParcelId, ParcelProperties, UserId};
