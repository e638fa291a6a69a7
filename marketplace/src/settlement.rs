//! Trade settlement
//!
//! Accepting an offer is the only place several resources change
//! together: escrow converts into a transfer, the seller and platform are
//! credited, ownership and status move, the trade and commission are
//! recorded, every rival offer is rejected with its escrow returned.
//!
//! The wallet store is an independent trust boundary, so the money
//! movement is a saga with explicit compensating actions rather than a
//! wrapped transaction: each completed step pushes its inverse, and any
//! failure unwinds the stack in reverse order. Nothing after the commit
//! point (trade recording) can undo the trade; post-commit work is
//! best-effort and logged.
//!
//! Concurrency: the listing's version counter is the arbitration point.
//! Exactly one acceptance closes the listing; racing accepts and cancels
//! lose with a retryable conflict.

use crate::book::MarketBook;
use crate::config::MarketConfig;
use crate::cooldown::CooldownEnforcer;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::pricing;
use crate::types::{
    BuyOffer, Commission, EscrowLock, ListingStatus, OfferStatus, PricePair, Trade,
};
use campaign_gate::{CampaignGate, CampaignWindow};
use chrono::{DateTime, Utc};
use ledger_gateway::LedgerGateway;
use parcel_core::{
    Asset, IdentityDirectory, NotificationSink, NotifyEvent, ParcelId, ParcelRegistry,
    StatusKind, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use yield_engine::AccrualLedger;

/// Inverse of a completed settlement step
enum Compensation {
    /// Re-lock escrow funds that were unlocked
    Relock {
        user: UserId,
        asset: Asset,
        amount: Decimal,
    },
    /// Return a debited amount to the buyer
    Refund {
        user: UserId,
        asset: Asset,
        amount: Decimal,
    },
    /// Claw back a credit to the seller or platform
    TakeBack {
        user: UserId,
        asset: Asset,
        amount: Decimal,
    },
    /// Remove the campaign purchase record
    RevokePurchase {
        user: UserId,
        campaign: Uuid,
        parcel: ParcelId,
    },
    /// Return the parcel to its previous owner
    RestoreOwner { parcel: ParcelId, owner: UserId },
    /// Force the parcel status back to its pre-settlement kind
    RestoreStatus { parcel: ParcelId, kind: StatusKind },
    /// Restore the published ask prices
    RestorePricing {
        parcel: ParcelId,
        ask: PricePair,
        floor_pct: Decimal,
    },
}

/// Executes offer acceptance as an all-or-nothing unit
pub struct TradeSettlement {
    registry: Arc<ParcelRegistry>,
    book: Arc<MarketBook>,
    wallet: Arc<dyn LedgerGateway>,
    gate: Arc<CampaignGate>,
    identity: Arc<dyn IdentityDirectory>,
    notifier: Arc<dyn NotificationSink>,
    accruals: Arc<AccrualLedger>,
    cooldown: CooldownEnforcer,
    config: MarketConfig,
    metrics: Metrics,
}

impl std::fmt::Debug for TradeSettlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeSettlement").finish()
    }
}

impl TradeSettlement {
    /// Create a settlement executor over the shared market state
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ParcelRegistry>,
        book: Arc<MarketBook>,
        wallet: Arc<dyn LedgerGateway>,
        gate: Arc<CampaignGate>,
        identity: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn NotificationSink>,
        accruals: Arc<AccrualLedger>,
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
            accruals,
            cooldown,
            config,
            metrics,
        }
    }

    /// Accept a pending offer and settle the trade
    ///
    /// Exactly one acceptance wins a listing; the losers of the race get
    /// a retryable conflict. On success every other pending offer on the
    /// parcel is rejected with its escrow released.
    pub async fn accept_offer(
        &self,
        seller: UserId,
        offer_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Trade> {
        let started = std::time::Instant::now();

        let offer = self.book.offer(offer_id)?;
        if offer.seller != seller {
            return Err(Error::Policy(format!(
                "{} is not the seller of offer {}",
                seller, offer_id
            )));
        }
        if offer.deleted || offer.status != OfferStatus::Pending {
            return Err(Error::Conflict(format!(
                "offer {} is no longer pending",
                offer_id
            )));
        }
        let parcel = offer.parcel;

        self.cooldown.ensure_clear(parcel, now)?;

        let listing = self
            .book
            .open_listing_for(parcel)
            .ok_or_else(|| Error::Policy(format!("{} has no open listing", parcel)))?;

        // Collaborators are consulted before anything mutates; settlement
        // fails closed if they are unreachable
        let bracket = self.identity.age_bracket(offer.buyer).await?;
        let buyer_floor = self.config.floors.default_for(bracket);
        let window = self.gate.active_window_for(parcel, now);

        let snap = self.registry.snapshot(parcel)?;
        let prior_kind = snap.properties.status.kind();
        let prior_ask = PricePair::new(snap.properties.price_psc, snap.properties.price_irr);
        let prior_floor = snap.properties.minimum_price_pct;

        let value = pricing::parcel_value(
            snap.properties.stability,
            snap.properties.class,
            &self.config.rates,
        );
        let offered = pricing::effective_price(offer.bid.psc, offer.bid.irr, &self.config.rates);
        let below_floor = pricing::price_pct(offered, value) < Decimal::ONE_HUNDRED;

        let payment = offer.bid.map(pricing::seller_payment);
        let commission = offer.bid.map(pricing::platform_fee);

        // Arbitration point: exactly one closer wins the listing
        self.book
            .close_listing(listing.id, listing.version, ListingStatus::Accepted)?;
        if let Err(e) = self.book.resolve_offer(offer_id, OfferStatus::Accepted) {
            let _ = self.book.reopen_listing(listing.id);
            return Err(e);
        }
        let escrow = match self.book.take_escrow(offer_id) {
            Ok(escrow) => escrow,
            Err(e) => {
                let _ = self.book.restore_offer_pending(offer_id);
                let _ = self.book.reopen_listing(listing.id);
                return Err(e);
            }
        };

        if let Err(e) = self
            .transfer(
                &offer,
                &escrow,
                payment,
                commission,
                window.as_ref(),
                buyer_floor,
                prior_kind,
                prior_ask,
                prior_floor,
                now,
            )
            .await
        {
            self.book.put_escrow(escrow);
            let _ = self.book.restore_offer_pending(offer_id);
            let _ = self.book.reopen_listing(listing.id);
            return Err(e);
        }

        // Commit point: from here the trade exists and is never undone
        let trade = Trade {
            id: Uuid::new_v4(),
            parcel,
            buyer: offer.buyer,
            seller,
            price: offer.bid,
            below_floor,
            settled_at: now,
        };
        self.book.record_trade(
            trade.clone(),
            Commission {
                trade: trade.id,
                amount: commission,
                created_at: now,
            },
        );
        self.book.mark_deleted(offer_id);

        if below_floor {
            match self.cooldown.engage(parcel, now) {
                Ok(lock) => {
                    self.metrics.underpriced_locks.inc();
                    self.notifier.notify(
                        offer.buyer,
                        NotifyEvent::TradingLocked {
                            parcel,
                            until: lock.lock_end,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(%parcel, error = %e, "failed to engage underpriced cooldown")
                }
            }
        }

        self.reject_rival_offers(parcel, offer_id).await;

        // Yield ownership interval rotates; the incoming owner starts at
        // the next cycle boundary
        if let Err(e) = self
            .accruals
            .transfer_on_sale(parcel, seller, offer.buyer, now)
        {
            tracing::warn!(%parcel, error = %e, "accrual rotation failed");
        }

        self.notifier.notify(
            offer.buyer,
            NotifyEvent::TradeSettled {
                trade_id: trade.id,
                parcel,
            },
        );
        self.notifier.notify(
            seller,
            NotifyEvent::TradeSettled {
                trade_id: trade.id,
                parcel,
            },
        );

        self.metrics.trades_settled.inc();
        self.metrics
            .settlement_duration
            .observe(started.elapsed().as_secs_f64());
        tracing::info!(
            trade = %trade.id,
            %parcel,
            buyer = %offer.buyer,
            %seller,
            below_floor,
            "trade settled"
        );
        Ok(trade)
    }

    /// The compensable middle of the settlement
    ///
    /// Converts escrow, pays the seller and platform, records the
    /// campaign purchase and moves ownership/status/pricing. A failure at
    /// any step unwinds everything already done, in reverse.
    #[allow(clippy::too_many_arguments)]
    async fn transfer(
        &self,
        offer: &BuyOffer,
        escrow: &EscrowLock,
        payment: PricePair,
        commission: PricePair,
        window: Option<&CampaignWindow>,
        buyer_floor: Decimal,
        prior_kind: StatusKind,
        prior_ask: PricePair,
        prior_floor: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut undo: Vec<Compensation> = Vec::new();
        match self
            .transfer_steps(
                offer,
                escrow,
                payment,
                commission,
                window,
                buyer_floor,
                prior_kind,
                prior_ask,
                prior_floor,
                now,
                &mut undo,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(
                    offer = %offer.id,
                    error = %e,
                    steps_to_unwind = undo.len(),
                    "settlement failed, compensating"
                );
                self.unwind(undo).await;
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn transfer_steps(
        &self,
        offer: &BuyOffer,
        escrow: &EscrowLock,
        payment: PricePair,
        commission: PricePair,
        window: Option<&CampaignWindow>,
        buyer_floor: Decimal,
        prior_kind: StatusKind,
        prior_ask: PricePair,
        prior_floor: Decimal,
        now: DateTime<Utc>,
        undo: &mut Vec<Compensation>,
    ) -> Result<()> {
        let buyer = offer.buyer;
        let seller = offer.seller;
        let platform = self.config.platform_account;
        let parcel = offer.parcel;

        // Escrow conversion: unlock then debit the buyer charge
        for (asset, amount) in [(Asset::Psc, escrow.amount.psc), (Asset::Irr, escrow.amount.irr)] {
            self.wallet.unlock_balance(buyer, asset, amount).await?;
            undo.push(Compensation::Relock {
                user: buyer,
                asset,
                amount,
            });
            self.wallet.debit(buyer, asset, amount).await?;
            undo.push(Compensation::Refund {
                user: buyer,
                asset,
                amount,
            });
        }

        // Seller payment (price minus fee)
        for (asset, amount) in [(Asset::Psc, payment.psc), (Asset::Irr, payment.irr)] {
            self.wallet.credit(seller, asset, amount).await?;
            undo.push(Compensation::TakeBack {
                user: seller,
                asset,
                amount,
            });
        }

        // Platform commission (both fees)
        for (asset, amount) in [(Asset::Psc, commission.psc), (Asset::Irr, commission.irr)] {
            self.wallet.credit(platform, asset, amount).await?;
            undo.push(Compensation::TakeBack {
                user: platform,
                asset,
                amount,
            });
        }

        // Campaign purchase counts inside the same atomic unit, so
        // concurrent settlements cannot exceed the cap
        if let Some(window) = window {
            self.gate
                .record_purchase(buyer, window.id, parcel, now)
                .map_err(Error::from)?;
            undo.push(Compensation::RevokePurchase {
                user: buyer,
                campaign: window.id,
                parcel,
            });
        }

        // Ownership, status, published pricing
        let previous_owner = self.registry.set_owner(parcel, buyer)?;
        undo.push(Compensation::RestoreOwner {
            parcel,
            owner: previous_owner,
        });

        self.registry
            .transition_status(parcel, StatusKind::SoldAndNotPriced)?;
        undo.push(Compensation::RestoreStatus {
            parcel,
            kind: prior_kind,
        });

        self.registry
            .set_pricing(parcel, Decimal::ZERO, Decimal::ZERO, buyer_floor)?;
        undo.push(Compensation::RestorePricing {
            parcel,
            ask: prior_ask,
            floor_pct: prior_floor,
        });

        Ok(())
    }

    /// Run compensations in reverse order, best effort
    async fn unwind(&self, undo: Vec<Compensation>) {
        for step in undo.into_iter().rev() {
            let result: Result<()> = match step {
                Compensation::Relock { user, asset, amount } => self
                    .wallet
                    .lock_balance(user, asset, amount, "settlement rollback")
                    .await
                    .map_err(Error::from),
                Compensation::Refund { user, asset, amount } => self
                    .wallet
                    .credit(user, asset, amount)
                    .await
                    .map_err(Error::from),
                Compensation::TakeBack { user, asset, amount } => self
                    .wallet
                    .debit(user, asset, amount)
                    .await
                    .map_err(Error::from),
                Compensation::RevokePurchase {
                    user,
                    campaign,
                    parcel,
                } => {
                    self.gate.revoke_purchase(user, campaign, parcel);
                    Ok(())
                }
                Compensation::RestoreOwner { parcel, owner } => self
                    .registry
                    .set_owner(parcel, owner)
                    .map(|_| ())
                    .map_err(Error::from),
                Compensation::RestoreStatus { parcel, kind } => self
                    .registry
                    .set_status_external(parcel, kind)
                    .map(|_| ())
                    .map_err(Error::from),
                Compensation::RestorePricing {
                    parcel,
                    ask,
                    floor_pct,
                } => self
                    .registry
                    .set_pricing(parcel, ask.psc, ask.irr, floor_pct)
                    .map_err(Error::from),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "compensation failed; manual reconciliation required");
            }
        }
    }

    /// Reject every other pending offer on the parcel, releasing escrow
    ///
    /// Runs after the commit point: a failed release is logged for
    /// reconciliation, never unwinds the settled trade.
    async fn reject_rival_offers(&self, parcel: ParcelId, winner: Uuid) {
        for rival in self.book.pending_offers_for(parcel) {
            if rival.id == winner {
                continue;
            }
            let resolved = match self.book.resolve_offer(rival.id, OfferStatus::Rejected) {
                Ok(resolved) => resolved,
                Err(_) => continue, // cancelled concurrently
            };
            self.book.mark_deleted(rival.id);

            match self.book.take_escrow(rival.id) {
                Ok(escrow) => {
                    for (asset, amount) in
                        [(Asset::Psc, escrow.amount.psc), (Asset::Irr, escrow.amount.irr)]
                    {
                        if let Err(e) = self
                            .wallet
                            .unlock_balance(resolved.buyer, asset, amount)
                            .await
                        {
                            tracing::error!(
                                offer = %rival.id,
                                %asset,
                                error = %e,
                                "rival escrow release failed; manual reconciliation required"
                            );
                        }
                    }
                    self.metrics.escrow_released.inc();
                }
                Err(e) => {
                    tracing::error!(offer = %rival.id, error = %e, "rival escrow missing");
                }
            }

            self.notifier.notify(
                resolved.buyer,
                NotifyEvent::OfferRejected {
                    offer_id: rival.id,
                    parcel,
                },
            );
        }
    }
}
