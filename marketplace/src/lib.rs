//! LandGrid Marketplace
//!
//! Listing, offer and settlement engine for virtual land parcels, with
//! escrowed offers, platform commission, underpriced-sale cooldowns and
//! campaign-gated purchases.
//!
//! # Architecture
//!
//! 1. **Listing**: the owner publishes an ask, validated against the
//!    status machine and the stability-derived price floor
//! 2. **Offer**: a buyer's charge (price + 5% fee) is locked at the
//!    wallet store before the offer becomes visible
//! 3. **Settlement**: acceptance converts the escrow into a transfer,
//!    pays the seller and platform, moves ownership and rejects every
//!    rival offer, as a saga with explicit compensations
//! 4. **Cooldown**: a sale below 100% of the floor freezes the parcel
//!    from trading for 24 hours
//!
//! # Example
//!
//! ```no_run
//! use ledger_gateway::InMemoryLedger;
//! use marketplace::{MarketConfig, MarketplaceEngine, PricePair};
//! use parcel_core::{LogNotifier, ParcelId, ParcelRegistry, StaticDirectory, UserId};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use yield_engine::YieldConfig;
//!
//! #[tokio::main]
//! async fn main() -> marketplace::Result<()> {
//!     let registry = Arc::new(ParcelRegistry::new());
//!     let directory = Arc::new(StaticDirectory::new());
//!     let engine = MarketplaceEngine::new(
//!         MarketConfig::default(),
//!         YieldConfig::default(),
//!         registry,
//!         Arc::new(InMemoryLedger::new()),
//!         directory.clone(),
//!         directory,
//!         Arc::new(LogNotifier),
//!     )?;
//!
//!     let listing = engine
//!         .create_listing(
//!             UserId::new(1),
//!             ParcelId::new(42),
//!             PricePair::new(Decimal::from(1500), Decimal::ZERO),
//!             None,
//!         )
//!         .await?;
//!     println!("listed at {} PSC", listing.ask.psc);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod book;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod listings;
pub mod metrics;
pub mod pricing;
pub mod settlement;
pub mod types;

// Re-exports
pub use book::MarketBook;
pub use config::{FloorConfig, MarketConfig, RateTable};
pub use cooldown::CooldownEnforcer;
pub use engine::MarketplaceEngine;
pub use error::{Error, Result};
pub use listings::ListingManager;
pub use metrics::Metrics;
pub use settlement::TradeSettlement;
pub use types::{
    BuyOffer, Commission, EscrowLock, ListingStatus, OfferStatus, PricePair, SellListing,
    Trade, UnderpricedLock,
};
