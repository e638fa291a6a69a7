//! In-memory market book
//!
//! Holds listings, offers, escrow records, trades, commissions and
//! underpriced locks. Every cross-record guarantee the marketplace makes
//! bottoms out in one of this module's entry-locked operations:
//!
//! - one open listing per parcel (`insert_listing`)
//! - one pending offer per (buyer, parcel) (`reserve_pending`)
//! - exactly-one closer of a listing (`close_listing` version check)
//! - exactly-one resolver of an offer (`resolve_offer` status check)
//! - exactly-once escrow release (`take_escrow` removes the record)

use crate::error::{Error, Result};
use crate::types::{
    BuyOffer, Commission, EscrowLock, ListingStatus, OfferStatus, SellListing, Trade,
    UnderpricedLock,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parcel_core::{ParcelId, UserId};
use uuid::Uuid;

/// The market's mutable record store
#[derive(Debug, Default)]
pub struct MarketBook {
    listings: DashMap<Uuid, SellListing>,
    open_by_parcel: DashMap<ParcelId, Uuid>,
    offers: DashMap<Uuid, BuyOffer>,
    pending_by_buyer: DashMap<(UserId, ParcelId), Uuid>,
    escrows: DashMap<Uuid, EscrowLock>,
    trades: DashMap<Uuid, Trade>,
    commissions: DashMap<Uuid, Commission>,
    cooldowns: DashMap<ParcelId, UnderpricedLock>,
}

impl MarketBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    // ---- listings ----

    /// Insert an open listing; a parcel may have at most one
    pub fn insert_listing(&self, listing: SellListing) -> Result<()> {
        match self.open_by_parcel.entry(listing.parcel) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::Policy(format!(
                "{} already has an open listing",
                listing.parcel
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(listing.id);
                self.listings.insert(listing.id, listing);
                Ok(())
            }
        }
    }

    /// Remove a listing that never took effect (creation rollback)
    pub fn discard_listing(&self, id: Uuid) {
        if let Some((_, listing)) = self.listings.remove(&id) {
            self.open_by_parcel.remove_if(&listing.parcel, |_, v| *v == id);
        }
    }

    /// Fetch a listing
    pub fn listing(&self, id: Uuid) -> Result<SellListing> {
        self.listings
            .get(&id)
            .map(|l| l.clone())
            .ok_or_else(|| Error::NotFound(format!("listing {}", id)))
    }

    /// The open listing on a parcel, if any
    pub fn open_listing_for(&self, parcel: ParcelId) -> Option<SellListing> {
        let id = self.open_by_parcel.get(&parcel).map(|v| *v)?;
        self.listings.get(&id).map(|l| l.clone())
    }

    /// Close an open listing if the caller's version is still current
    ///
    /// Exactly one of several racing closers wins; the rest get a
    /// `Conflict`.
    pub fn close_listing(
        &self,
        id: Uuid,
        expected_version: u64,
        status: ListingStatus,
    ) -> Result<SellListing> {
        let mut listing = self
            .listings
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("listing {}", id)))?;
        if listing.status != ListingStatus::Open {
            return Err(Error::Conflict(format!("listing {} is not open", id)));
        }
        if listing.version != expected_version {
            return Err(Error::Conflict(format!(
                "listing {} changed concurrently (version {} != {})",
                id, listing.version, expected_version
            )));
        }
        listing.status = status;
        listing.version += 1;
        let closed = listing.clone();
        drop(listing);
        self.open_by_parcel.remove_if(&closed.parcel, |_, v| *v == id);
        Ok(closed)
    }

    /// Reopen a listing closed by a settlement that rolled back
    pub fn reopen_listing(&self, id: Uuid) -> Result<()> {
        let mut listing = self
            .listings
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("listing {}", id)))?;
        listing.status = ListingStatus::Open;
        listing.version += 1;
        let parcel = listing.parcel;
        drop(listing);
        self.open_by_parcel.insert(parcel, id);
        Ok(())
    }

    // ---- offers ----

    /// Reserve the (buyer, parcel) pending slot for a new offer
    ///
    /// Duplicate pending offers are refused here, atomically, before any
    /// funds are locked.
    pub fn reserve_pending(&self, buyer: UserId, parcel: ParcelId, offer_id: Uuid) -> Result<()> {
        match self.pending_by_buyer.entry((buyer, parcel)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::Policy(format!(
                "{} already has a pending offer on {}",
                buyer, parcel
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(offer_id);
                Ok(())
            }
        }
    }

    /// Release a reserved pending slot (offer creation rollback)
    pub fn release_pending(&self, buyer: UserId, parcel: ParcelId, offer_id: Uuid) {
        self.pending_by_buyer
            .remove_if(&(buyer, parcel), |_, v| *v == offer_id);
    }

    /// Insert a pending offer with its escrow record
    ///
    /// The pending slot must have been reserved with this offer's id.
    pub fn insert_offer(&self, offer: BuyOffer, escrow: EscrowLock) -> Result<()> {
        let reserved = self
            .pending_by_buyer
            .get(&(offer.buyer, offer.parcel))
            .map(|v| *v);
        if reserved != Some(offer.id) {
            return Err(Error::Conflict(format!(
                "pending slot for {} on {} is not held by offer {}",
                offer.buyer, offer.parcel, offer.id
            )));
        }
        self.escrows.insert(offer.id, escrow);
        self.offers.insert(offer.id, offer);
        Ok(())
    }

    /// Fetch an offer
    pub fn offer(&self, id: Uuid) -> Result<BuyOffer> {
        self.offers
            .get(&id)
            .map(|o| o.clone())
            .ok_or_else(|| Error::NotFound(format!("offer {}", id)))
    }

    /// Move a pending offer to a terminal status
    ///
    /// The single status check under the entry lock is what serializes a
    /// `CancelOffer` racing an `AcceptOffer`: exactly one resolver wins.
    pub fn resolve_offer(&self, id: Uuid, to: OfferStatus) -> Result<BuyOffer> {
        let mut offer = self
            .offers
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("offer {}", id)))?;
        if offer.status != OfferStatus::Pending {
            return Err(Error::Conflict(format!(
                "offer {} is no longer pending",
                id
            )));
        }
        offer.status = to;
        let resolved = offer.clone();
        drop(offer);
        self.pending_by_buyer
            .remove_if(&(resolved.buyer, resolved.parcel), |_, v| *v == id);
        Ok(resolved)
    }

    /// Return a resolved offer to pending (settlement rollback)
    pub fn restore_offer_pending(&self, id: Uuid) -> Result<()> {
        let mut offer = self
            .offers
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("offer {}", id)))?;
        offer.status = OfferStatus::Pending;
        let key = (offer.buyer, offer.parcel);
        drop(offer);
        self.pending_by_buyer.insert(key, id);
        Ok(())
    }

    /// Set the grace deadline on a pending offer
    pub fn set_grace_deadline(&self, id: Uuid, deadline: DateTime<Utc>) -> Result<()> {
        let mut offer = self
            .offers
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("offer {}", id)))?;
        if offer.status != OfferStatus::Pending {
            return Err(Error::Policy(format!("offer {} is not pending", id)));
        }
        offer.expires_at = Some(deadline);
        Ok(())
    }

    /// Soft-delete an offer, keeping the record for audit
    pub fn mark_deleted(&self, id: Uuid) {
        if let Some(mut offer) = self.offers.get_mut(&id) {
            offer.deleted = true;
        }
    }

    /// Pending offers on a parcel
    pub fn pending_offers_for(&self, parcel: ParcelId) -> Vec<BuyOffer> {
        self.offers
            .iter()
            .filter(|o| o.parcel == parcel && o.status == OfferStatus::Pending)
            .map(|o| o.clone())
            .collect()
    }

    /// Pending offers whose grace deadline has passed
    pub fn pending_offers_expired_by(&self, now: DateTime<Utc>) -> Vec<BuyOffer> {
        self.offers
            .iter()
            .filter(|o| {
                o.status == OfferStatus::Pending
                    && o.expires_at.map(|at| at < now).unwrap_or(false)
            })
            .map(|o| o.clone())
            .collect()
    }

    /// Offers made by a buyer, excluding soft-deleted records
    pub fn offers_by(&self, buyer: UserId) -> Vec<BuyOffer> {
        self.offers
            .iter()
            .filter(|o| o.buyer == buyer && !o.deleted)
            .map(|o| o.clone())
            .collect()
    }

    /// Offers received by a seller, excluding soft-deleted records
    pub fn offers_received_by(&self, seller: UserId) -> Vec<BuyOffer> {
        self.offers
            .iter()
            .filter(|o| o.seller == seller && !o.deleted)
            .map(|o| o.clone())
            .collect()
    }

    // ---- escrow ----

    /// Remove and return an offer's escrow record
    ///
    /// Removal is the exactly-once guarantee: a second release or a
    /// release racing a conversion finds nothing.
    pub fn take_escrow(&self, offer_id: Uuid) -> Result<EscrowLock> {
        self.escrows
            .remove(&offer_id)
            .map(|(_, e)| e)
            .ok_or_else(|| Error::Escrow(format!("no escrow held for offer {}", offer_id)))
    }

    /// Restore an escrow record (settlement rollback)
    pub fn put_escrow(&self, escrow: EscrowLock) {
        self.escrows.insert(escrow.offer, escrow);
    }

    /// The escrow record for an offer, if held
    pub fn escrow_for(&self, offer_id: Uuid) -> Option<EscrowLock> {
        self.escrows.get(&offer_id).map(|e| e.clone())
    }

    // ---- trades ----

    /// Record a settled trade with its commission
    pub fn record_trade(&self, trade: Trade, commission: Commission) {
        self.commissions.insert(trade.id, commission);
        self.trades.insert(trade.id, trade);
    }

    /// Fetch a trade
    pub fn trade(&self, id: Uuid) -> Result<Trade> {
        self.trades
            .get(&id)
            .map(|t| t.clone())
            .ok_or_else(|| Error::NotFound(format!("trade {}", id)))
    }

    /// The commission taken from a trade
    pub fn commission_for(&self, trade_id: Uuid) -> Option<Commission> {
        self.commissions.get(&trade_id).map(|c| c.clone())
    }

    /// Trades on a parcel, newest first
    pub fn trades_for(&self, parcel: ParcelId) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.parcel == parcel)
            .map(|t| t.clone())
            .collect();
        trades.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        trades
    }

    // ---- underpriced locks ----

    /// Engage a cooldown lock; a parcel may hold at most one active lock
    pub fn engage_cooldown(&self, lock: UnderpricedLock) -> Result<()> {
        match self.cooldowns.entry(lock.parcel) {
            dashmap::mapref::entry::Entry::Occupied(mut slot) => {
                if slot.get().active {
                    return Err(Error::Conflict(format!(
                        "{} already has an active cooldown",
                        lock.parcel
                    )));
                }
                slot.insert(lock);
                Ok(())
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(lock);
                Ok(())
            }
        }
    }

    /// The cooldown record on a parcel, if any
    pub fn cooldown(&self, parcel: ParcelId) -> Option<UnderpricedLock> {
        self.cooldowns.get(&parcel).map(|l| l.clone())
    }

    /// Deactivate a cooldown lock
    pub fn clear_cooldown(&self, parcel: ParcelId) {
        if let Some(mut lock) = self.cooldowns.get_mut(&parcel) {
            lock.active = false;
        }
    }

    /// Parcels with an active cooldown
    pub fn active_cooldowns(&self) -> Vec<UnderpricedLock> {
        self.cooldowns
            .iter()
            .filter(|l| l.active)
            .map(|l| l.clone())
            .collect()
    }
}
