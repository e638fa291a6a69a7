//! Collaborator interfaces consumed by the marketplace core
//!
//! Identity/KYC, dynasty membership and notification delivery live in other
//! services. The core consumes them through these narrow traits; operations
//! that need an answer fail closed when a collaborator is unreachable,
//! notification delivery is fire-and-forget.

use crate::error::Result;
use crate::types::{AgeBracket, Asset, ParcelId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Identity/KYC collaborator
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Whether the user has completed KYC verification
    async fn is_verified(&self, user: UserId) -> Result<bool>;

    /// Age bracket of the user (Adult when the birthdate is unknown)
    async fn age_bracket(&self, user: UserId) -> Result<AgeBracket>;
}

/// Dynasty/group collaborator
#[async_trait]
pub trait DynastyDirectory: Send + Sync {
    /// Whether the user owns a dynasty group
    async fn owns_dynasty(&self, user: UserId) -> Result<bool>;
}

/// Events emitted to the notification collaborator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyEvent {
    /// A buyer made an offer on the user's listing
    OfferReceived {
        /// Offer ID
        offer_id: Uuid,
        /// Parcel offered on
        parcel: ParcelId,
    },
    /// The user's offer was rejected by the seller
    OfferRejected {
        /// Offer ID
        offer_id: Uuid,
        /// Parcel offered on
        parcel: ParcelId,
    },
    /// The user's offer passed its grace deadline
    OfferExpired {
        /// Offer ID
        offer_id: Uuid,
        /// Parcel offered on
        parcel: ParcelId,
    },
    /// A trade involving the user settled
    TradeSettled {
        /// Trade ID
        trade_id: Uuid,
        /// Parcel traded
        parcel: ParcelId,
    },
    /// The parcel entered a trading cooldown
    TradingLocked {
        /// Parcel locked
        parcel: ParcelId,
        /// Lock end
        until: DateTime<Utc>,
    },
    /// Yield was credited to the user's wallet
    YieldDeposited {
        /// Parcel that produced the yield
        parcel: ParcelId,
        /// Asset credited
        asset: Asset,
        /// Amount credited
        amount: Decimal,
    },
}

/// Notification collaborator (fire-and-forget)
///
/// Implementations must never block the caller on delivery; failures are
/// the sink's problem and never roll back marketplace state.
pub trait NotificationSink: Send + Sync {
    /// Deliver an event to a user
    fn notify(&self, user: UserId, event: NotifyEvent);
}

/// Sink that logs events through `tracing`
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, user: UserId, event: NotifyEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(%user, %payload, "notification"),
            Err(e) => tracing::warn!(%user, error = %e, "unserializable notification"),
        }
    }
}

/// In-memory directory for tests and simulations
///
/// Unknown users resolve to unverified adults without dynasty, matching the
/// legacy behavior for accounts with no KYC record.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    verified: DashMap<UserId, bool>,
    brackets: DashMap<UserId, AgeBracket>,
    dynasty_owners: DashMap<UserId, bool>,
}

impl StaticDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user profile
    pub fn put_user(&self, user: UserId, verified: bool, bracket: AgeBracket, dynasty: bool) {
        self.verified.insert(user, verified);
        self.brackets.insert(user, bracket);
        self.dynasty_owners.insert(user, dynasty);
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn is_verified(&self, user: UserId) -> Result<bool> {
        Ok(self.verified.get(&user).map(|v| *v).unwrap_or(false))
    }

    async fn age_bracket(&self, user: UserId) -> Result<AgeBracket> {
        Ok(self
            .brackets
            .get(&user)
            .map(|b| *b)
            .unwrap_or(AgeBracket::Adult))
    }
}

#[async_trait]
impl DynastyDirectory for StaticDirectory {
    async fn owns_dynasty(&self, user: UserId) -> Result<bool> {
        Ok(self.dynasty_owners.get(&user).map(|v| *v).unwrap_or(false))
    }
}
