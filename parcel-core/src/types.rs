//! Core types for the parcel marketplace
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money and stability)
//! - Cheap copying of identifiers (newtyped integers)
//! - Serde round-tripping for config and gateway payloads

use crate::status::ParcelStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UserId(u64);

impl UserId {
    /// Create new user ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

/// Parcel identifier
///
/// Parcel ids are ordered; campaign windows restrict eligibility to
/// inclusive id ranges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ParcelId(u64);

impl ParcelId {
    /// Create new parcel ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParcelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parcel-{}", self.0)
    }
}

/// Wallet asset held at the external ledger
///
/// `Psc` and `Irr` are the two trading currencies; the color assets are
/// class-specific yield assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Platform stable coin
    Psc,
    /// Rial-denominated balance
    Irr,
    /// Residential yield asset
    Yellow,
    /// Commercial yield asset
    Red,
    /// Educational yield asset
    Blue,
}

impl Asset {
    /// Wire code for the asset
    pub fn code(&self) -> &'static str {
        match self {
            Asset::Psc => "psc",
            Asset::Irr => "irr",
            Asset::Yellow => "yellow",
            Asset::Red => "red",
            Asset::Blue => "blue",
        }
    }

    /// Parse from wire code
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "psc" => Some(Asset::Psc),
            "irr" => Some(Asset::Irr),
            "yellow" => Some(Asset::Yellow),
            "red" => Some(Asset::Red),
            "blue" => Some(Asset::Blue),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Parcel use-class (karbari)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParcelClass {
    /// Residential parcels, yellow yield asset
    Residential,
    /// Commercial parcels, red yield asset
    Commercial,
    /// Educational parcels, blue yield asset
    Educational,
}

impl ParcelClass {
    /// Legacy single-letter class code
    pub fn code(&self) -> &'static str {
        match self {
            ParcelClass::Residential => "m",
            ParcelClass::Commercial => "t",
            ParcelClass::Educational => "a",
        }
    }

    /// Parse from legacy code
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "m" => Some(ParcelClass::Residential),
            "t" => Some(ParcelClass::Commercial),
            "a" => Some(ParcelClass::Educational),
            _ => None,
        }
    }

    /// Yield asset credited to owners of this class
    pub fn yield_asset(&self) -> Asset {
        match self {
            ParcelClass::Residential => Asset::Yellow,
            ParcelClass::Commercial => Asset::Red,
            ParcelClass::Educational => Asset::Blue,
        }
    }

    /// All classes, for sweeps and strategies
    pub fn all() -> [ParcelClass; 3] {
        [
            ParcelClass::Residential,
            ParcelClass::Commercial,
            ParcelClass::Educational,
        ]
    }
}

impl fmt::Display for ParcelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Age bracket reported by the identity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBracket {
    /// 18 or older (also the default when the birthdate is unknown)
    Adult,
    /// Under 18, subject to the stricter price floor
    Minor,
}

/// A tradable virtual land unit
///
/// Owner is mutated only by trade settlement; geometry and dynasty
/// references are owned by external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    /// Parcel ID
    pub id: ParcelId,

    /// Current owner
    pub owner: UserId,

    /// Geometry reference (geometry service)
    pub geometry: Option<Uuid>,

    /// Dynasty group reference (dynasty service)
    pub dynasty: Option<u64>,
}

/// Per-parcel trading properties, one-to-one with [`Parcel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelProperties {
    /// Owning parcel
    pub parcel_id: ParcelId,

    /// Use-class
    pub class: ParcelClass,

    /// Status code (class-specific)
    pub status: ParcelStatus,

    /// Surface area
    pub area: Decimal,

    /// Build density
    pub density: Decimal,

    /// Stability scalar driving yield and the price floor
    pub stability: Decimal,

    /// Current ask price in PSC (zero when not listed)
    pub price_psc: Decimal,

    /// Current ask price in IRR (zero when not listed)
    pub price_irr: Decimal,

    /// Minimum acceptable price as a percentage of parcel value
    pub minimum_price_pct: Decimal,
}
