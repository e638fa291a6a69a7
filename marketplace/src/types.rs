//! Core types for listings, offers, escrow and trades

use chrono::{DateTime, Utc};
use parcel_core::{ParcelId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An amount in both trading currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePair {
    /// PSC component
    pub psc: Decimal,

    /// IRR component
    pub irr: Decimal,
}

impl PricePair {
    /// Create a pair
    pub fn new(psc: Decimal, irr: Decimal) -> Self {
        Self { psc, irr }
    }

    /// Zero in both currencies
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    /// Whether both components are zero
    pub fn is_zero(&self) -> bool {
        self.psc.is_zero() && self.irr.is_zero()
    }

    /// Apply a per-currency function to both components
    pub fn map(&self, f: impl Fn(Decimal) -> Decimal) -> Self {
        Self::new(f(self.psc), f(self.irr))
    }
}

/// Sell listing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    /// Accepting offers
    Open,
    /// Closed by a settled trade
    Accepted,
    /// Withdrawn by the seller
    Cancelled,
}

/// A seller's ask on a parcel
///
/// The version counter arbitrates concurrent settlement and cancellation:
/// every state change bumps it, and closers must present the version they
/// read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellListing {
    /// Listing ID
    pub id: Uuid,

    /// Seller (must own the parcel)
    pub seller: UserId,

    /// Parcel listed
    pub parcel: ParcelId,

    /// Ask prices
    pub ask: PricePair,

    /// Minimum offer percentage accepted on this listing
    pub floor_pct: Decimal,

    /// Lifecycle status
    pub status: ListingStatus,

    /// Optimistic-concurrency version
    pub version: u64,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Buy offer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Waiting for the seller
    Pending,
    /// Won the listing; a trade settled from it
    Accepted,
    /// Declined by the seller or outraced by another offer
    Rejected,
    /// Withdrawn by the buyer
    Cancelled,
    /// Passed its grace deadline
    Expired,
}

/// A buyer's offer on a listed parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyOffer {
    /// Offer ID
    pub id: Uuid,

    /// Buyer
    pub buyer: UserId,

    /// Seller at offer time
    pub seller: UserId,

    /// Parcel offered on
    pub parcel: ParcelId,

    /// Offered prices
    pub bid: PricePair,

    /// Lifecycle status
    pub status: OfferStatus,

    /// Free-text note from the buyer
    pub note: Option<String>,

    /// Grace deadline granted by the seller, if any
    pub expires_at: Option<DateTime<Utc>>,

    /// Soft-delete flag; resolved offers are kept for audit
    pub deleted: bool,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Funds held against a pending offer
///
/// Created atomically with the offer, released exactly once: either
/// converted into the settlement transfer or returned to the buyer.
/// Amounts are buyer charges (price plus fee) per currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowLock {
    /// Offer the funds are held against
    pub offer: Uuid,

    /// Buyer whose balance is locked
    pub buyer: UserId,

    /// Parcel under offer
    pub parcel: ParcelId,

    /// Locked amounts per currency
    pub amount: PricePair,

    /// Lock time
    pub created_at: DateTime<Utc>,
}

/// Immutable record of a completed sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Trade ID
    pub id: Uuid,

    /// Parcel traded
    pub parcel: ParcelId,

    /// Buyer
    pub buyer: UserId,

    /// Seller
    pub seller: UserId,

    /// Settled prices (before fees)
    pub price: PricePair,

    /// Whether the sale settled below 100% of the price floor
    pub below_floor: bool,

    /// Settlement time
    pub settled_at: DateTime<Utc>,
}

/// Immutable record of the platform fee taken from a trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commission {
    /// Trade the fee was taken from
    pub trade: Uuid,

    /// Fee amounts per currency
    pub amount: PricePair,

    /// Record time
    pub created_at: DateTime<Utc>,
}

/// Cooldown lock applied after an underpriced sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderpricedLock {
    /// Locked parcel
    pub parcel: ParcelId,

    /// Lock start
    pub locked_at: DateTime<Utc>,

    /// Lock end (start + cooldown)
    pub lock_end: DateTime<Utc>,

    /// Whether the lock is still in force
    pub active: bool,
}
