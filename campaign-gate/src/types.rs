//! Campaign types

use chrono::{DateTime, Utc};
use parcel_core::{ParcelId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A time-boxed, id-range-restricted purchase rule set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignWindow {
    /// Campaign ID
    pub id: Uuid,

    /// Display title
    pub title: String,

    /// Window opens
    pub starts_at: DateTime<Utc>,

    /// Window closes
    pub ends_at: DateTime<Utc>,

    /// First parcel id covered (inclusive)
    pub first_parcel: ParcelId,

    /// Last parcel id covered (inclusive)
    pub last_parcel: ParcelId,

    /// Buyers must have completed KYC
    pub require_verified_kyc: bool,

    /// Only adult buyers are eligible
    pub require_adult: bool,

    /// Only minor buyers are eligible (youth campaigns)
    pub require_minor: bool,

    /// Buyers must own a dynasty group
    pub require_dynasty_owner: bool,

    /// Maximum purchases per user within this campaign
    pub per_user_cap: Option<u32>,

    /// Price-floor percentage override for covered parcels
    pub floor_override_pct: Option<Decimal>,

    /// Manually expired by ops
    pub expired: bool,
}

impl CampaignWindow {
    /// Whether the window covers a parcel id
    pub fn covers(&self, parcel: ParcelId) -> bool {
        self.first_parcel <= parcel && parcel <= self.last_parcel
    }

    /// Whether the window is live at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.expired && self.starts_at <= now && now <= self.ends_at
    }
}

/// A purchase counted against a campaign's per-user cap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignPurchase {
    /// Buyer
    pub user: UserId,

    /// Campaign the purchase counts against
    pub campaign: Uuid,

    /// Parcel bought
    pub parcel: ParcelId,

    /// Settlement time
    pub purchased_at: DateTime<Utc>,
}

/// Outcome of an eligibility evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The buyer may proceed
    Allowed,
    /// The buyer is refused, with the rule that failed
    Denied(DenialReason),
}

impl Decision {
    /// Whether the buyer may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// The campaign rule that refused a buyer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// KYC verification required
    KycRequired,
    /// Campaign restricted to adults
    AdultsOnly,
    /// Campaign restricted to minors
    MinorsOnly,
    /// Campaign restricted to dynasty owners
    DynastyOwnershipRequired,
    /// Per-user purchase cap reached
    PurchaseCapReached {
        /// The cap that was hit
        cap: u32,
    },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::KycRequired => write!(f, "KYC verification is required"),
            DenialReason::AdultsOnly => write!(f, "campaign is restricted to adults"),
            DenialReason::MinorsOnly => write!(f, "campaign is restricted to minors"),
            DenialReason::DynastyOwnershipRequired => {
                write!(f, "campaign is restricted to dynasty owners")
            }
            DenialReason::PurchaseCapReached { cap } => {
                write!(f, "campaign purchase cap of {} reached", cap)
            }
        }
    }
}
