//! Parcel status machine
//!
//! Each parcel carries a class-specific status code. The codes themselves
//! are legacy single letters kept for compatibility with downstream map
//! rendering; all logic here works on the `(class, kind)` pair so the
//! compiler checks the tables are total.
//!
//! Legal transitions:
//!
//! ```text
//! NotPriced        ──(list)───►  Priced
//! Priced           ──(cancel)─►  NotPriced
//! Priced           ──(settle)─►  SoldAndNotPriced
//! SoldAndNotPriced ──(relist)─►  SoldAndPriced
//! SoldAndPriced    ──(settle│cancel)─► SoldAndNotPriced
//! Priced│SoldAndPriced│SoldAndNotPriced ──(cooldown,campaign)─► TradingLimited
//! TradingLimited   ──(expiry)─►  SoldAndNotPriced
//! ```
//!
//! `NotAllowedToSell`, `InConstruction`, `HasBuilding` and `HasDynasty` are
//! set by external collaborators and act purely as not-tradable gates here.

use crate::error::{Error, Result};
use crate::types::ParcelClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class-independent status kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Never sold, not listed
    NotPriced,
    /// Never sold, listed by the platform or first owner
    Priced,
    /// Owned and currently listed
    SoldAndPriced,
    /// Owned, not listed
    SoldAndNotPriced,
    /// Reserved, payment pending
    PreBought,
    /// Administratively frozen
    NotAllowedToSell,
    /// Under an active cooldown or campaign restriction
    TradingLimited,
    /// Construction in progress (construction service)
    InConstruction,
    /// Carries a finished building (construction service)
    HasBuilding,
    /// Bound to a dynasty group (dynasty service)
    HasDynasty,
}

impl StatusKind {
    /// Kinds only external collaborators may set
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            StatusKind::PreBought
                | StatusKind::NotAllowedToSell
                | StatusKind::InConstruction
                | StatusKind::HasBuilding
                | StatusKind::HasDynasty
        )
    }
}

/// Parcel status: a class paired with a status kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParcelStatus {
    class: ParcelClass,
    kind: StatusKind,
}

impl ParcelStatus {
    /// Create a status from its parts
    pub fn new(class: ParcelClass, kind: StatusKind) -> Self {
        Self { class, kind }
    }

    /// Initial status for a newly created parcel
    pub fn initial(class: ParcelClass) -> Self {
        Self::new(class, StatusKind::NotPriced)
    }

    /// Parcel class
    pub fn class(&self) -> ParcelClass {
        self.class
    }

    /// Status kind
    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    /// Legacy status code used by map layers and the mobile client
    pub fn code(&self) -> &'static str {
        match (self.class, self.kind) {
            (ParcelClass::Residential, StatusKind::SoldAndPriced) => "a",
            (ParcelClass::Residential, StatusKind::SoldAndNotPriced) => "b",
            (ParcelClass::Residential, StatusKind::NotPriced) => "c",
            (ParcelClass::Residential, StatusKind::Priced) => "d",
            (ParcelClass::Residential, StatusKind::PreBought) => "e",
            (ParcelClass::Residential, StatusKind::NotAllowedToSell) => "f",
            (ParcelClass::Residential, StatusKind::TradingLimited) => "g",
            (ParcelClass::Residential, StatusKind::InConstruction) => "aa",
            (ParcelClass::Residential, StatusKind::HasBuilding) => "bb",
            (ParcelClass::Residential, StatusKind::HasDynasty) => "cc",

            (ParcelClass::Commercial, StatusKind::SoldAndPriced) => "h",
            (ParcelClass::Commercial, StatusKind::SoldAndNotPriced) => "i",
            (ParcelClass::Commercial, StatusKind::NotPriced) => "j",
            (ParcelClass::Commercial, StatusKind::Priced) => "k",
            (ParcelClass::Commercial, StatusKind::PreBought) => "l",
            (ParcelClass::Commercial, StatusKind::NotAllowedToSell) => "m",
            (ParcelClass::Commercial, StatusKind::TradingLimited) => "n",
            (ParcelClass::Commercial, StatusKind::InConstruction) => "hh",
            (ParcelClass::Commercial, StatusKind::HasBuilding) => "ii",
            (ParcelClass::Commercial, StatusKind::HasDynasty) => "jj",

            (ParcelClass::Educational, StatusKind::SoldAndPriced) => "o",
            (ParcelClass::Educational, StatusKind::SoldAndNotPriced) => "p",
            (ParcelClass::Educational, StatusKind::NotPriced) => "q",
            (ParcelClass::Educational, StatusKind::Priced) => "r",
            (ParcelClass::Educational, StatusKind::PreBought) => "ss",
            (ParcelClass::Educational, StatusKind::NotAllowedToSell) => "tt",
            (ParcelClass::Educational, StatusKind::TradingLimited) => "uu",
            (ParcelClass::Educational, StatusKind::InConstruction) => "oo",
            (ParcelClass::Educational, StatusKind::HasBuilding) => "pp",
            (ParcelClass::Educational, StatusKind::HasDynasty) => "qq",
        }
    }

    /// Whether the owner may create a sell listing in this status
    pub fn is_listable(&self) -> bool {
        matches!(
            self.kind,
            StatusKind::NotPriced | StatusKind::SoldAndNotPriced
        )
    }

    /// Whether buyers may make offers in this status
    pub fn accepts_offers(&self) -> bool {
        matches!(self.kind, StatusKind::Priced | StatusKind::SoldAndPriced)
    }

    /// Whether an external collaborator has frozen trading
    pub fn is_frozen(&self) -> bool {
        matches!(
            self.kind,
            StatusKind::NotAllowedToSell
                | StatusKind::PreBought
                | StatusKind::InConstruction
                | StatusKind::HasBuilding
                | StatusKind::HasDynasty
        )
    }

    /// Status kind after a settlement closes the current listing
    pub fn settled_kind(&self) -> StatusKind {
        StatusKind::SoldAndNotPriced
    }

    /// Status kind after the owner lists the parcel
    pub fn listed_kind(&self) -> StatusKind {
        match self.kind {
            StatusKind::NotPriced => StatusKind::Priced,
            _ => StatusKind::SoldAndPriced,
        }
    }

    /// Status kind after the owner cancels an open listing
    pub fn delisted_kind(&self) -> StatusKind {
        match self.kind {
            StatusKind::Priced => StatusKind::NotPriced,
            _ => StatusKind::SoldAndNotPriced,
        }
    }

    /// Attempt a transition, returning the new status or a policy error
    pub fn transition(self, to: StatusKind) -> Result<Self> {
        if transition_allowed(self.kind, to) {
            Ok(Self::new(self.class, to))
        } else {
            Err(Error::Policy(format!(
                "illegal status transition {:?} -> {:?} for {}",
                self.kind, to, self.class
            )))
        }
    }
}

impl fmt::Display for ParcelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Legal-transition table for marketplace-driven changes
fn transition_allowed(from: StatusKind, to: StatusKind) -> bool {
    use StatusKind::*;
    match (from, to) {
        (NotPriced, Priced) => true,
        (SoldAndNotPriced, SoldAndPriced) => true,
        (Priced, NotPriced) => true,
        (Priced, SoldAndNotPriced) => true,
        (SoldAndPriced, SoldAndNotPriced) => true,
        (Priced, TradingLimited) => true,
        (SoldAndPriced, TradingLimited) => true,
        (SoldAndNotPriced, TradingLimited) => true,
        (TradingLimited, SoldAndNotPriced) => true,
        _ => false,
    }
}
