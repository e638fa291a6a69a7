//! Campaign Eligibility Gate
//!
//! Time-boxed campaigns restrict who may buy designated parcel-id ranges:
//! KYC status, age bracket, dynasty ownership and a per-user purchase cap.
//! Offer creation consults the gate before any escrow is taken; purchase
//! recording happens inside the settlement saga so concurrent buyers cannot
//! exceed the cap.
//!
//! Eligibility answers fail closed: if the identity or dynasty collaborator
//! is unreachable the evaluation returns a dependency error and the offer
//! is refused.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod gate;
pub mod types;

// Re-exports
pub use gate::CampaignGate;
pub use parcel_core::{Error, Result};
pub use types::{CampaignPurchase, CampaignWindow, Decision, DenialReason};
