//! End-to-end marketplace scenarios
//!
//! Full listing → offer → settlement flows against the in-memory wallet
//! store, including the underpriced cooldown, campaign caps, grace-period
//! expiry and wallet-outage rollback.

use campaign_gate::{CampaignWindow, Decision, DenialReason};
use chrono::{Duration, Utc};
use ledger_gateway::InMemoryLedger;
use marketplace::{
    Error, MarketConfig, MarketplaceEngine, OfferStatus, PricePair,
};
use parcel_core::{
    AgeBracket, Asset, LogNotifier, Parcel, ParcelClass, ParcelId, ParcelProperties,
    ParcelRegistry, ParcelStatus, StaticDirectory, StatusKind, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use yield_engine::YieldConfig;

// Matches MarketConfig::default().platform_account
const PLATFORM: UserId = UserId::new(2_000_000);

struct Harness {
    engine: MarketplaceEngine,
    registry: Arc<ParcelRegistry>,
    wallet: Arc<InMemoryLedger>,
    directory: Arc<StaticDirectory>,
}

fn d(n: i64) -> Decimal {
    Decimal::from(n)
}

fn psc(n: i64) -> PricePair {
    PricePair::new(d(n), Decimal::ZERO)
}

fn harness() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let registry = Arc::new(ParcelRegistry::new());
    let wallet = Arc::new(InMemoryLedger::new());
    let directory = Arc::new(StaticDirectory::new());
    let engine = MarketplaceEngine::new(
        MarketConfig::default(),
        YieldConfig::default(),
        registry.clone(),
        wallet.clone(),
        directory.clone(),
        directory.clone(),
        Arc::new(LogNotifier),
    )
    .unwrap();
    Harness {
        engine,
        registry,
        wallet,
        directory,
    }
}

impl Harness {
    /// Register a residential parcel owned by `owner`
    fn add_parcel(&self, id: u64, owner: u64, stability: i64, kind: StatusKind) {
        let parcel_id = ParcelId::new(id);
        self.registry
            .insert(
                Parcel {
                    id: parcel_id,
                    owner: UserId::new(owner),
                    geometry: None,
                    dynasty: None,
                },
                ParcelProperties {
                    parcel_id,
                    class: ParcelClass::Residential,
                    status: ParcelStatus::new(ParcelClass::Residential, kind),
                    area: d(120),
                    density: Decimal::ONE,
                    stability: d(stability),
                    price_psc: Decimal::ZERO,
                    price_irr: Decimal::ZERO,
                    minimum_price_pct: d(80),
                },
            )
            .unwrap();
    }

    fn add_adult(&self, id: u64, psc_balance: i64) -> UserId {
        let user = UserId::new(id);
        self.directory.put_user(user, true, AgeBracket::Adult, false);
        if psc_balance > 0 {
            self.wallet.deposit(user, Asset::Psc, d(psc_balance));
        }
        user
    }
}

#[tokio::test]
async fn test_full_sale_at_par() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 2000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    // List at 100% of the floor value: 15000 × 0.1 = 1500 PSC
    let listing = h
        .engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    assert_eq!(listing.floor_pct, d(80));
    assert_eq!(
        h.engine.parcel_status(parcel).unwrap().kind(),
        StatusKind::SoldAndPriced
    );

    // Offer at the ask: buyer charge is 1575
    let offer = h
        .engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), d(1575));
    assert_eq!(h.wallet.available_of(buyer, Asset::Psc), d(425));

    // Accept: seller nets 1425, platform takes 150, escrow fully consumed
    let trade = h.engine.accept_offer(seller, offer.id).await.unwrap();
    assert_eq!(trade.price.psc, d(1500));
    assert!(!trade.below_floor);
    assert_eq!(h.wallet.available_of(seller, Asset::Psc), d(1425));
    assert_eq!(h.wallet.available_of(PLATFORM, Asset::Psc), d(150));
    assert_eq!(h.wallet.available_of(buyer, Asset::Psc), d(425));
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), Decimal::ZERO);

    let commission = h.engine.commission_for(trade.id).unwrap();
    assert_eq!(commission.amount.psc, d(150));

    // Ownership, status and book state
    assert_eq!(h.registry.owner_of(parcel).unwrap(), buyer);
    assert_eq!(
        h.engine.parcel_status(parcel).unwrap().kind(),
        StatusKind::SoldAndNotPriced
    );
    assert!(h.engine.open_listing_for(parcel).is_none());
    assert_eq!(h.engine.offer(offer.id).unwrap().status, OfferStatus::Accepted);

    // The buyer starts a fresh yield interval; the seller has none
    assert_eq!(h.engine.active_accruals(buyer).len(), 1);
    assert_eq!(h.engine.active_accruals(seller).len(), 0);

    // A second acceptance of the same offer loses
    let result = h.engine.accept_offer(seller, offer.id).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_listing_below_floor_is_rejected_before_any_change() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    // 1050 PSC is 70% of value, below the 80% minimum
    let result = h.engine.create_listing(seller, parcel, psc(1050), None).await;
    assert!(matches!(result, Err(Error::Policy(_))));

    // No state changed
    assert_eq!(
        h.engine.parcel_status(parcel).unwrap().kind(),
        StatusKind::SoldAndNotPriced
    );
    assert!(h.engine.open_listing_for(parcel).is_none());
}

#[tokio::test]
async fn test_minor_seller_gets_stricter_floor() {
    let h = harness();
    let seller = UserId::new(10);
    h.directory.put_user(seller, true, AgeBracket::Minor, false);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);
    let parcel = ParcelId::new(1);

    // 100% of value is below a minor's 110% floor
    let result = h.engine.create_listing(seller, parcel, psc(1500), None).await;
    assert!(matches!(result, Err(Error::Policy(_))));

    // 110% passes
    h.engine
        .create_listing(seller, parcel, psc(1650), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_underpriced_sale_engages_cooldown() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 5000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    // 1350 PSC is 90% of value: listable (above 80) but under par
    h.engine
        .create_listing(seller, parcel, psc(1350), None)
        .await
        .unwrap();
    let offer = h
        .engine
        .create_offer(buyer, parcel, psc(1350), None)
        .await
        .unwrap();
    let trade = h.engine.accept_offer(seller, offer.id).await.unwrap();
    assert!(trade.below_floor);

    // Parcel is trading-limited for 24 hours
    assert_eq!(
        h.engine.parcel_status(parcel).unwrap().kind(),
        StatusKind::TradingLimited
    );
    assert!(!h.engine.is_tradable(parcel, Utc::now()).unwrap());

    let result = h.engine.create_listing(buyer, parcel, psc(1500), None).await;
    assert!(matches!(result, Err(Error::Policy(_))));

    // After the cooldown passes, the sweep releases the parcel
    let later = Utc::now() + Duration::hours(25);
    assert_eq!(h.engine.release_expired_cooldowns(later), 1);
    assert_eq!(
        h.engine.parcel_status(parcel).unwrap().kind(),
        StatusKind::SoldAndNotPriced
    );
    h.engine
        .create_listing(buyer, parcel, psc(1500), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_duplicate_pending_offer_refused() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 10_000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    h.engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    h.engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();

    let result = h.engine.create_offer(buyer, parcel, psc(1600), None).await;
    assert!(matches!(result, Err(Error::Policy(_))));

    // Only one charge is locked
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), d(1575));
}

#[tokio::test]
async fn test_losing_offers_are_rejected_with_escrow_released() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let winner = h.add_adult(20, 3000);
    let loser = h.add_adult(30, 3000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    h.engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    let winning = h
        .engine
        .create_offer(winner, parcel, psc(1500), None)
        .await
        .unwrap();
    let losing = h
        .engine
        .create_offer(loser, parcel, psc(1400), None)
        .await
        .unwrap();

    h.engine.accept_offer(seller, winning.id).await.unwrap();

    let resolved = h.engine.offer(losing.id).unwrap();
    assert_eq!(resolved.status, OfferStatus::Rejected);
    assert!(resolved.deleted);
    assert_eq!(h.wallet.locked_of(loser, Asset::Psc), Decimal::ZERO);
    assert_eq!(h.wallet.available_of(loser, Asset::Psc), d(3000));
}

#[tokio::test]
async fn test_insufficient_funds_leaves_no_trace() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 100);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    h.engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    let result = h.engine.create_offer(buyer, parcel, psc(1500), None).await;
    assert!(matches!(result, Err(Error::Escrow(_))));
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), Decimal::ZERO);

    // The pending slot was released; a funded retry is not a duplicate
    h.wallet.deposit(buyer, Asset::Psc, d(2000));
    h.engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_campaign_cap_of_one_purchase_per_user() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 10_000);
    h.add_parcel(100, 10, 15_000, StatusKind::SoldAndNotPriced);
    h.add_parcel(101, 10, 15_000, StatusKind::SoldAndNotPriced);
    let parcel_a = ParcelId::new(100);
    let parcel_b = ParcelId::new(101);

    let now = Utc::now();
    h.engine
        .gate()
        .register_window(CampaignWindow {
            id: Uuid::new_v4(),
            title: "district launch".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(24),
            first_parcel: parcel_a,
            last_parcel: parcel_b,
            require_verified_kyc: true,
            require_adult: false,
            require_minor: false,
            require_dynasty_owner: false,
            per_user_cap: Some(1),
            floor_override_pct: None,
            expired: false,
        })
        .unwrap();

    h.engine
        .create_listing(seller, parcel_a, psc(1500), None)
        .await
        .unwrap();
    h.engine
        .create_listing(seller, parcel_b, psc(1500), None)
        .await
        .unwrap();

    // First purchase in range settles and counts against the cap
    let offer = h
        .engine
        .create_offer(buyer, parcel_a, psc(1500), None)
        .await
        .unwrap();
    h.engine.accept_offer(seller, offer.id).await.unwrap();

    // Second offer in the same campaign is denied before escrow
    let result = h.engine.create_offer(buyer, parcel_b, psc(1500), None).await;
    assert!(matches!(result, Err(Error::Policy(_))));
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), Decimal::ZERO);

    let decision = h.engine.campaign_eligibility(buyer, parcel_b).await.unwrap();
    assert_eq!(
        decision,
        Decision::Denied(DenialReason::PurchaseCapReached { cap: 1 })
    );
}

#[tokio::test]
async fn test_cancel_offer_releases_escrow() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 2000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    h.engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    let offer = h
        .engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();

    h.engine.cancel_offer(buyer, offer.id).await.unwrap();
    assert_eq!(h.engine.offer(offer.id).unwrap().status, OfferStatus::Cancelled);
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), Decimal::ZERO);
    assert_eq!(h.wallet.available_of(buyer, Asset::Psc), d(2000));

    // The cancelled offer can no longer be accepted
    let result = h.engine.accept_offer(seller, offer.id).await;
    assert!(matches!(result, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_grace_period_expiry_releases_escrow() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 2000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    h.engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    let offer = h
        .engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();

    // Out-of-range grace periods are validation errors
    assert!(matches!(
        h.engine.grant_grace_period(seller, offer.id, 0),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        h.engine.grant_grace_period(seller, offer.id, 31),
        Err(Error::Validation(_))
    ));

    h.engine.grant_grace_period(seller, offer.id, 2).unwrap();

    // Nothing expires before the deadline
    assert_eq!(h.engine.expire_offers(Utc::now() + Duration::days(1)).await, 0);

    let expired = h.engine.expire_offers(Utc::now() + Duration::days(3)).await;
    assert_eq!(expired, 1);
    assert_eq!(h.engine.offer(offer.id).unwrap().status, OfferStatus::Expired);
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), Decimal::ZERO);
}

#[tokio::test]
async fn test_wallet_outage_rolls_back_settlement() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 2000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    h.engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    let offer = h
        .engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();

    // The wallet store goes down mid-flight; settlement fails closed
    h.wallet.set_offline(true);
    let result = h.engine.accept_offer(seller, offer.id).await;
    assert!(matches!(result, Err(Error::Dependency(_))));

    // Pre-settlement state is fully restored
    assert!(h.engine.open_listing_for(parcel).is_some());
    assert_eq!(h.engine.offer(offer.id).unwrap().status, OfferStatus::Pending);
    assert_eq!(h.registry.owner_of(parcel).unwrap(), seller);

    // Once the wallet is back the same acceptance succeeds
    h.wallet.set_offline(false);
    let trade = h.engine.accept_offer(seller, offer.id).await.unwrap();
    assert_eq!(trade.price.psc, d(1500));
    assert_eq!(h.wallet.available_of(seller, Asset::Psc), d(1425));
}

#[tokio::test]
async fn test_cancel_listing_refunds_pending_offers() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let buyer = h.add_adult(20, 2000);
    let parcel = ParcelId::new(1);
    h.add_parcel(1, 10, 15_000, StatusKind::SoldAndNotPriced);

    let listing = h
        .engine
        .create_listing(seller, parcel, psc(1500), None)
        .await
        .unwrap();
    let offer = h
        .engine
        .create_offer(buyer, parcel, psc(1500), None)
        .await
        .unwrap();

    h.engine.cancel_listing(seller, listing.id).await.unwrap();

    assert!(h.engine.open_listing_for(parcel).is_none());
    assert_eq!(
        h.engine.parcel_status(parcel).unwrap().kind(),
        StatusKind::SoldAndNotPriced
    );
    assert_eq!(h.engine.offer(offer.id).unwrap().status, OfferStatus::Rejected);
    assert_eq!(h.wallet.locked_of(buyer, Asset::Psc), Decimal::ZERO);
    assert_eq!(h.wallet.available_of(buyer, Asset::Psc), d(2000));
}

#[tokio::test]
async fn test_frozen_and_foreign_parcels_cannot_be_listed() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    let stranger = h.add_adult(30, 0);
    h.add_parcel(1, 10, 15_000, StatusKind::NotAllowedToSell);
    h.add_parcel(2, 10, 15_000, StatusKind::SoldAndNotPriced);

    let result = h
        .engine
        .create_listing(seller, ParcelId::new(1), psc(1500), None)
        .await;
    assert!(matches!(result, Err(Error::Policy(_))));

    let result = h
        .engine
        .create_listing(stranger, ParcelId::new(2), psc(1500), None)
        .await;
    assert!(matches!(result, Err(Error::Policy(_))));
}

#[tokio::test]
async fn test_campaign_floor_override_relaxes_listing_floor() {
    let h = harness();
    let seller = h.add_adult(10, 0);
    h.add_parcel(100, 10, 15_000, StatusKind::SoldAndNotPriced);
    let parcel = ParcelId::new(100);

    let now = Utc::now();
    h.engine
        .gate()
        .register_window(CampaignWindow {
            id: Uuid::new_v4(),
            title: "clearance".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(24),
            first_parcel: parcel,
            last_parcel: parcel,
            require_verified_kyc: false,
            require_adult: false,
            require_minor: false,
            require_dynasty_owner: false,
            per_user_cap: None,
            floor_override_pct: Some(d(50)),
            expired: false,
        })
        .unwrap();

    // 60% of value would normally be refused; the campaign floor allows it
    h.engine
        .create_listing(seller, parcel, psc(900), None)
        .await
        .unwrap();
}
