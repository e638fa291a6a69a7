//! Listing & offer manager
//!
//! Creates and cancels sell listings and buy offers. Every path validates
//! against the parcel status machine and the pricing calculator before it
//! touches the wallet, and the campaign gate is consulted before any
//! escrow is taken.

use crate::book::MarketBook;
use crate::config::MarketConfig;
use crate::cooldown::CooldownEnforcer;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::pricing;
use crate::types::{BuyOffer, EscrowLock, ListingStatus, OfferStatus, PricePair, SellListing};
use campaign_gate::{CampaignGate, Decision};
use chrono::{DateTime, Duration, Utc};
use ledger_gateway::LedgerGateway;
use parcel_core::{
    Asset, IdentityDirectory, NotificationSink, NotifyEvent, ParcelId, ParcelRegistry, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Manages sell listings and buy offers
pub struct ListingManager {
    registry: Arc<ParcelRegistry>,
    book: Arc<MarketBook>,
    wallet: Arc<dyn LedgerGateway>,
    gate: Arc<CampaignGate>,
    identity: Arc<dyn IdentityDirectory>,
    notifier: Arc<dyn NotificationSink>,
    cooldown: CooldownEnforcer,
    config: MarketConfig,
    metrics: Metrics,
}

impl std::fmt::Debug for ListingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingManager").finish()
    }
}

impl ListingManager {
    /// Create a manager over the shared market state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ParcelRegistry>,
        book: Arc<MarketBook>,
        wallet: Arc<dyn LedgerGateway>,
        gate: Arc<CampaignGate>,
        identity: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn NotificationSink>,
        cooldown: CooldownEnforcer,
        config: MarketConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            registry,
            book,
            wallet,
            gate,
            identity,
            notifier,
            cooldown,
            config,
            metrics,
        }
    }

    /// List a parcel for sale
    ///
    /// Fails if the seller does not own the parcel, the status forbids
    /// listing, or the ask falls below the computed floor. On success the
    /// parcel status moves to its listed form and the ask is published.
    pub async fn create_listing(
        &self,
        seller: UserId,
        parcel: ParcelId,
        ask: PricePair,
        floor_pct: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<SellListing> {
        self.cooldown.ensure_clear(parcel, now)?;

        let snap = self.registry.snapshot(parcel)?;
        if snap.parcel.owner != seller {
            return Err(Error::Policy(format!(
                "{} does not own {}",
                seller, parcel
            )));
        }
        if ask.is_zero() {
            return Err(Error::Validation(
                "ask prices cannot both be zero".to_string(),
            ));
        }

        let status = snap.properties.status;
        if status.is_frozen() {
            return Err(Error::Policy(format!(
                "{} is not sellable in status {}",
                parcel, status
            )));
        }
        if !status.is_listable() {
            return Err(Error::Policy(format!(
                "{} cannot be listed in status {}",
                parcel, status
            )));
        }

        // Floor: bracket default, campaign override, then the seller's
        // own (stricter) percentage if given
        let bracket = self.identity.age_bracket(seller).await?;
        let min_floor = self
            .gate
            .floor_override_for(parcel, now)
            .unwrap_or_else(|| self.config.floors.default_for(bracket));
        let floor_pct = floor_pct.unwrap_or(min_floor);
        if floor_pct < min_floor {
            return Err(Error::Policy(format!(
                "floor of {:.0}% is below the {:.0}% minimum for this seller",
                floor_pct, min_floor
            )));
        }

        let value = pricing::parcel_value(
            snap.properties.stability,
            snap.properties.class,
            &self.config.rates,
        );
        let offered = pricing::effective_price(ask.psc, ask.irr, &self.config.rates);
        pricing::check_floor(pricing::price_pct(offered, value), floor_pct)?;

        let listing = SellListing {
            id: Uuid::new_v4(),
            seller,
            parcel,
            ask,
            floor_pct,
            status: ListingStatus::Open,
            version: 0,
            created_at: now,
        };
        self.book.insert_listing(listing.clone())?;

        if let Err(e) = self.registry.transition_status(parcel, status.listed_kind()) {
            self.book.discard_listing(listing.id);
            return Err(e.into());
        }
        if let Err(e) = self
            .registry
            .set_pricing(parcel, ask.psc, ask.irr, floor_pct)
        {
            tracing::warn!(%parcel, error = %e, "failed to publish ask prices");
        }

        self.metrics.listings_created.inc();
        tracing::info!(
            listing = %listing.id,
            %seller,
            %parcel,
            floor_pct = %floor_pct,
            "listing created"
        );
        Ok(listing)
    }

    /// Withdraw an open listing
    ///
    /// Reverts the parcel status and rejects every pending offer on the
    /// listing, returning escrow to the buyers.
    pub async fn cancel_listing(&self, seller: UserId, listing_id: Uuid) -> Result<()> {
        let listing = self.book.listing(listing_id)?;
        if listing.seller != seller {
            return Err(Error::Policy(format!(
                "{} is not the seller of listing {}",
                seller, listing_id
            )));
        }

        let closed = self
            .book
            .close_listing(listing_id, listing.version, ListingStatus::Cancelled)?;

        let snap = self.registry.snapshot(closed.parcel)?;
        if let Err(e) = self
            .registry
            .transition_status(closed.parcel, snap.properties.status.delisted_kind())
        {
            tracing::warn!(parcel = %closed.parcel, error = %e, "delist transition failed");
        }
        if let Err(e) = self.registry.set_pricing(
            closed.parcel,
            Decimal::ZERO,
            Decimal::ZERO,
            snap.properties.minimum_price_pct,
        ) {
            tracing::warn!(parcel = %closed.parcel, error = %e, "failed to clear ask prices");
        }

        // An offer cannot outlive the only listing it could settle against
        for offer in self.book.pending_offers_for(closed.parcel) {
            if let Ok(resolved) = self.book.resolve_offer(offer.id, OfferStatus::Rejected) {
                if let Err(e) = self.try_release_escrow(&resolved).await {
                    tracing::error!(
                        offer = %resolved.id,
                        error = %e,
                        "escrow release failed during listing cancellation"
                    );
                }
                self.notifier.notify(
                    resolved.buyer,
                    NotifyEvent::OfferRejected {
                        offer_id: resolved.id,
                        parcel: resolved.parcel,
                    },
                );
            }
        }

        tracing::info!(listing = %listing_id, %seller, "listing cancelled");
        Ok(())
    }

    /// Make an offer on a listed parcel
    ///
    /// Validates the open listing, the listing floor and the campaign
    /// gate, then locks the buyer charge in both currencies before the
    /// offer becomes visible. No pending offer is ever created without
    /// its escrow.
    pub async fn create_offer(
        &self,
        buyer: UserId,
        parcel: ParcelId,
        bid: PricePair,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BuyOffer> {
        self.cooldown.ensure_clear(parcel, now)?;

        let snap = self.registry.snapshot(parcel)?;
        let listing = self
            .book
            .open_listing_for(parcel)
            .ok_or_else(|| Error::Policy(format!("{} has no open listing", parcel)))?;
        if listing.seller == buyer {
            return Err(Error::Policy(
                "cannot make an offer on your own listing".to_string(),
            ));
        }
        if bid.is_zero() {
            return Err(Error::Validation(
                "offer prices cannot both be zero".to_string(),
            ));
        }

        let value = pricing::parcel_value(
            snap.properties.stability,
            snap.properties.class,
            &self.config.rates,
        );
        let offered = pricing::effective_price(bid.psc, bid.irr, &self.config.rates);
        pricing::check_floor(pricing::price_pct(offered, value), listing.floor_pct)?;

        match self.gate.evaluate(buyer, parcel, now).await? {
            Decision::Allowed => {}
            Decision::Denied(reason) => return Err(Error::Policy(reason.to_string())),
        }

        let charge = bid.map(pricing::buyer_charge);
        let offer_id = Uuid::new_v4();
        self.book.reserve_pending(buyer, parcel, offer_id)?;

        if let Err(e) = self
            .wallet
            .lock_balance(buyer, Asset::Psc, charge.psc, "buy offer")
            .await
        {
            self.book.release_pending(buyer, parcel, offer_id);
            return Err(e.into());
        }
        if let Err(e) = self
            .wallet
            .lock_balance(buyer, Asset::Irr, charge.irr, "buy offer")
            .await
        {
            if let Err(undo) = self.wallet.unlock_balance(buyer, Asset::Psc, charge.psc).await {
                tracing::error!(%buyer, error = %undo, "failed to roll back PSC lock");
            }
            self.book.release_pending(buyer, parcel, offer_id);
            return Err(e.into());
        }

        let offer = BuyOffer {
            id: offer_id,
            buyer,
            seller: listing.seller,
            parcel,
            bid,
            status: OfferStatus::Pending,
            note,
            expires_at: None,
            deleted: false,
            created_at: now,
        };
        let escrow = EscrowLock {
            offer: offer_id,
            buyer,
            parcel,
            amount: charge,
            created_at: now,
        };
        if let Err(e) = self.book.insert_offer(offer.clone(), escrow) {
            for (asset, amount) in [(Asset::Psc, charge.psc), (Asset::Irr, charge.irr)] {
                if let Err(undo) = self.wallet.unlock_balance(buyer, asset, amount).await {
                    tracing::error!(%buyer, %asset, error = %undo, "failed to roll back lock");
                }
            }
            self.book.release_pending(buyer, parcel, offer_id);
            return Err(e);
        }

        self.metrics.offers_created.inc();
        self.notifier.notify(
            listing.seller,
            NotifyEvent::OfferReceived {
                offer_id,
                parcel,
            },
        );
        tracing::info!(
            offer = %offer_id,
            %buyer,
            %parcel,
            psc_locked = %charge.psc,
            irr_locked = %charge.irr,
            "offer created with escrow"
        );
        Ok(offer)
    }

    /// Withdraw a pending offer (buyer side)
    ///
    /// Cancellation is cooperative: if an acceptance is already settling
    /// this offer, the cancel loses the race and returns a conflict.
    pub async fn cancel_offer(&self, buyer: UserId, offer_id: Uuid) -> Result<()> {
        let offer = self.book.offer(offer_id)?;
        if offer.buyer != buyer {
            return Err(Error::Policy(format!(
                "{} is not the buyer of offer {}",
                buyer, offer_id
            )));
        }

        let resolved = self.book.resolve_offer(offer_id, OfferStatus::Cancelled)?;
        if let Err(e) = self.try_release_escrow(&resolved).await {
            // The wallet would not release the funds; the offer stays
            // pending rather than stranding the escrow
            self.book.restore_offer_pending(offer_id)?;
            return Err(e);
        }

        tracing::info!(offer = %offer_id, %buyer, "offer cancelled");
        Ok(())
    }

    /// Decline a pending offer (seller side)
    pub async fn reject_offer(&self, seller: UserId, offer_id: Uuid) -> Result<()> {
        let offer = self.book.offer(offer_id)?;
        if offer.seller != seller {
            return Err(Error::Policy(format!(
                "{} is not the seller of offer {}",
                seller, offer_id
            )));
        }

        let resolved = self.book.resolve_offer(offer_id, OfferStatus::Rejected)?;
        if let Err(e) = self.try_release_escrow(&resolved).await {
            self.book.restore_offer_pending(offer_id)?;
            return Err(e);
        }

        self.notifier.notify(
            resolved.buyer,
            NotifyEvent::OfferRejected {
                offer_id,
                parcel: resolved.parcel,
            },
        );
        tracing::info!(offer = %offer_id, %seller, "offer rejected");
        Ok(())
    }

    /// Grant a pending offer a grace period before it expires
    pub fn grant_grace_period(
        &self,
        seller: UserId,
        offer_id: Uuid,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if days < self.config.grace_days_min || days > self.config.grace_days_max {
            return Err(Error::Validation(format!(
                "grace period must be between {} and {} days",
                self.config.grace_days_min, self.config.grace_days_max
            )));
        }

        let offer = self.book.offer(offer_id)?;
        if offer.seller != seller {
            return Err(Error::Policy(format!(
                "{} is not the seller of offer {}",
                seller, offer_id
            )));
        }

        self.book
            .set_grace_deadline(offer_id, now + Duration::days(days))?;
        tracing::info!(offer = %offer_id, days, "grace period granted");
        Ok(())
    }

    /// Expire pending offers past their grace deadline
    ///
    /// Returns the number of offers expired with escrow released.
    pub async fn expire_offers(&self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for offer in self.book.pending_offers_expired_by(now) {
            let resolved = match self.book.resolve_offer(offer.id, OfferStatus::Expired) {
                Ok(resolved) => resolved,
                Err(_) => continue, // raced with accept or cancel
            };
            match self.try_release_escrow(&resolved).await {
                Ok(()) => expired += 1,
                Err(e) => {
                    tracing::error!(offer = %resolved.id, error = %e, "escrow release failed on expiry");
                }
            }
            self.notifier.notify(
                resolved.buyer,
                NotifyEvent::OfferExpired {
                    offer_id: resolved.id,
                    parcel: resolved.parcel,
                },
            );
        }
        if expired > 0 {
            tracing::info!(count = expired, "expired pending offers");
        }
        expired
    }

    /// Return an offer's escrow to the buyer, exactly once
    ///
    /// Unlocks both currencies before consuming the escrow record; if the
    /// second unlock fails the first is re-locked so no partial release
    /// survives.
    pub(crate) async fn try_release_escrow(&self, offer: &BuyOffer) -> Result<()> {
        let escrow = self
            .book
            .escrow_for(offer.id)
            .ok_or_else(|| Error::Escrow(format!("no escrow held for offer {}", offer.id)))?;

        self.wallet
            .unlock_balance(offer.buyer, Asset::Psc, escrow.amount.psc)
            .await?;
        if let Err(e) = self
            .wallet
            .unlock_balance(offer.buyer, Asset::Irr, escrow.amount.irr)
            .await
        {
            if let Err(undo) = self
                .wallet
                .lock_balance(offer.buyer, Asset::Psc, escrow.amount.psc, "escrow restore")
                .await
            {
                tracing::error!(offer = %offer.id, error = %undo, "failed to restore PSC escrow");
            }
            return Err(e.into());
        }

        let _ = self.book.take_escrow(offer.id);
        self.metrics.escrow_released.inc();
        Ok(())
    }
}
