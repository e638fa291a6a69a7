//! Marketplace engine facade
//!
//! Wires the listing manager, settlement executor, cooldown enforcer,
//! campaign gate and yield accrual ledger over shared state, and exposes
//! the produced interface consumed by transport layers.

use crate::book::MarketBook;
use crate::config::MarketConfig;
use crate::cooldown::CooldownEnforcer;
use crate::error::{Error, Result};
use crate::listings::ListingManager;
use crate::metrics::Metrics;
use crate::settlement::TradeSettlement;
use crate::types::{BuyOffer, Commission, PricePair, SellListing, Trade};
use campaign_gate::{CampaignGate, Decision};
use chrono::{DateTime, Utc};
use ledger_gateway::{BoundedGateway, LedgerGateway};
use parcel_core::{
    DynastyDirectory, IdentityDirectory, NotificationSink, ParcelId, ParcelRegistry,
    ParcelStatus, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use yield_engine::{AccrualLedger, YieldAccrual, YieldConfig};

/// The marketplace core's public surface
pub struct MarketplaceEngine {
    registry: Arc<ParcelRegistry>,
    book: Arc<MarketBook>,
    gate: Arc<CampaignGate>,
    accruals: Arc<AccrualLedger>,
    listings: ListingManager,
    settlement: TradeSettlement,
    cooldown: CooldownEnforcer,
    metrics: Metrics,
}

impl std::fmt::Debug for MarketplaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceEngine").finish()
    }
}

impl MarketplaceEngine {
    /// Assemble the engine over its collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MarketConfig,
        yield_config: YieldConfig,
        registry: Arc<ParcelRegistry>,
        wallet: Arc<dyn LedgerGateway>,
        identity: Arc<dyn IdentityDirectory>,
        dynasty: Arc<dyn DynastyDirectory>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Dependency(format!("metrics registration failed: {}", e)))?;

        // Every wallet call carries a hard deadline; a stuck ledger fails
        // the operation instead of hanging it
        let wallet: Arc<dyn LedgerGateway> = Arc::new(BoundedGateway::new(
            wallet,
            std::time::Duration::from_millis(config.ledger_deadline_ms),
        ));

        let book = Arc::new(MarketBook::new());
        let gate = Arc::new(CampaignGate::new(identity.clone(), dynasty));
        let accruals = Arc::new(AccrualLedger::new(
            registry.clone(),
            wallet.clone(),
            notifier.clone(),
            yield_config,
        ));
        let cooldown = CooldownEnforcer::new(book.clone(), registry.clone(), config.cooldown_hours);

        let listings = ListingManager::new(
            registry.clone(),
            book.clone(),
            wallet.clone(),
            gate.clone(),
            identity.clone(),
            notifier.clone(),
            cooldown.clone(),
            config.clone(),
            metrics.clone(),
        );
        let settlement = TradeSettlement::new(
            registry.clone(),
            book.clone(),
            wallet,
            gate.clone(),
            identity,
            notifier,
            accruals.clone(),
            cooldown.clone(),
            config,
            metrics.clone(),
        );

        Ok(Self {
            registry,
            book,
            gate,
            accruals,
            listings,
            settlement,
            cooldown,
            metrics,
        })
    }

    // ---- listings and offers ----

    /// List a parcel for sale
    pub async fn create_listing(
        &self,
        seller: UserId,
        parcel: ParcelId,
        ask: PricePair,
        floor_pct: Option<Decimal>,
    ) -> Result<SellListing> {
        self.listings
            .create_listing(seller, parcel, ask, floor_pct, Utc::now())
            .await
    }

    /// Withdraw an open listing, rejecting its pending offers
    pub async fn cancel_listing(&self, seller: UserId, listing_id: Uuid) -> Result<()> {
        self.listings.cancel_listing(seller, listing_id).await
    }

    /// Make an offer on a listed parcel, locking the buyer charge
    pub async fn create_offer(
        &self,
        buyer: UserId,
        parcel: ParcelId,
        bid: PricePair,
        note: Option<String>,
    ) -> Result<BuyOffer> {
        self.listings
            .create_offer(buyer, parcel, bid, note, Utc::now())
            .await
    }

    /// Withdraw a pending offer (buyer side)
    pub async fn cancel_offer(&self, buyer: UserId, offer_id: Uuid) -> Result<()> {
        self.listings.cancel_offer(buyer, offer_id).await
    }

    /// Decline a pending offer (seller side)
    pub async fn reject_offer(&self, seller: UserId, offer_id: Uuid) -> Result<()> {
        self.listings.reject_offer(seller, offer_id).await
    }

    /// Accept a pending offer and settle the trade
    pub async fn accept_offer(&self, seller: UserId, offer_id: Uuid) -> Result<Trade> {
        self.settlement.accept_offer(seller, offer_id, Utc::now()).await
    }

    /// Grant a pending offer a grace period before it expires
    pub fn grant_grace_period(&self, seller: UserId, offer_id: Uuid, days: i64) -> Result<()> {
        self.listings
            .grant_grace_period(seller, offer_id, days, Utc::now())
    }

    // ---- sweeps ----

    /// Expire pending offers past their grace deadline
    pub async fn expire_offers(&self, now: DateTime<Utc>) -> usize {
        self.listings.expire_offers(now).await
    }

    /// Release underpriced cooldowns whose end has passed
    pub fn release_expired_cooldowns(&self, now: DateTime<Utc>) -> usize {
        self.cooldown.sweep(now)
    }

    // ---- queries ----

    /// Current status of a parcel
    pub fn parcel_status(&self, parcel: ParcelId) -> Result<ParcelStatus> {
        Ok(self.registry.snapshot(parcel)?.properties.status)
    }

    /// Whether the parcel can currently trade at all
    ///
    /// False while an external collaborator freeze or an active cooldown
    /// is in force.
    pub fn is_tradable(&self, parcel: ParcelId, now: DateTime<Utc>) -> Result<bool> {
        let status = self.parcel_status(parcel)?;
        if status.is_frozen() {
            return Ok(false);
        }
        if let Some(lock) = self.book.cooldown(parcel) {
            if lock.active && now < lock.lock_end {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The open listing on a parcel, if any
    pub fn open_listing_for(&self, parcel: ParcelId) -> Option<SellListing> {
        self.book.open_listing_for(parcel)
    }

    /// An offer by id
    pub fn offer(&self, offer_id: Uuid) -> Result<BuyOffer> {
        self.book.offer(offer_id)
    }

    /// Offers made by a buyer
    pub fn offers_by(&self, buyer: UserId) -> Vec<BuyOffer> {
        self.book.offers_by(buyer)
    }

    /// Offers received by a seller
    pub fn offers_received_by(&self, seller: UserId) -> Vec<BuyOffer> {
        self.book.offers_received_by(seller)
    }

    /// A settled trade by id
    pub fn trade(&self, trade_id: Uuid) -> Result<Trade> {
        self.book.trade(trade_id)
    }

    /// Trades on a parcel, newest first
    pub fn trades_for(&self, parcel: ParcelId) -> Vec<Trade> {
        self.book.trades_for(parcel)
    }

    /// The commission taken from a trade
    pub fn commission_for(&self, trade_id: Uuid) -> Option<Commission> {
        self.book.commission_for(trade_id)
    }

    /// Campaign eligibility for a (user, parcel) pair
    pub async fn campaign_eligibility(&self, user: UserId, parcel: ParcelId) -> Result<Decision> {
        Ok(self.gate.evaluate(user, parcel, Utc::now()).await?)
    }

    /// Active yield accruals for a user
    pub fn active_accruals(&self, user: UserId) -> Vec<YieldAccrual> {
        self.accruals.active_accruals(user)
    }

    // ---- wiring ----

    /// Campaign gate, for registering windows
    pub fn gate(&self) -> &Arc<CampaignGate> {
        &self.gate
    }

    /// Yield accrual ledger, for scheduler wiring and entry bootstrap
    pub fn accruals(&self) -> &Arc<AccrualLedger> {
        &self.accruals
    }

    /// Parcel registry backing this engine
    pub fn registry(&self) -> &Arc<ParcelRegistry> {
        &self.registry
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}
