//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the marketplace:
//!
//! - `market_listings_created_total` - Sell listings created
//! - `market_offers_created_total` - Buy offers created with escrow
//! - `market_trades_settled_total` - Trades settled
//! - `market_escrow_released_total` - Escrow locks returned to buyers
//! - `market_underpriced_locks_total` - Cooldowns engaged
//! - `market_settlement_duration_seconds` - Settlement latency histogram

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Sell listings created
    pub listings_created: IntCounter,

    /// Buy offers created
    pub offers_created: IntCounter,

    /// Trades settled
    pub trades_settled: IntCounter,

    /// Escrow locks returned to buyers
    pub escrow_released: IntCounter,

    /// Underpriced cooldowns engaged
    pub underpriced_locks: IntCounter,

    /// Settlement latency
    pub settlement_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let listings_created = IntCounter::new(
            "market_listings_created_total",
            "Sell listings created",
        )?;
        registry.register(Box::new(listings_created.clone()))?;

        let offers_created = IntCounter::new(
            "market_offers_created_total",
            "Buy offers created with escrow",
        )?;
        registry.register(Box::new(offers_created.clone()))?;

        let trades_settled = IntCounter::new(
            "market_trades_settled_total",
            "Trades settled",
        )?;
        registry.register(Box::new(trades_settled.clone()))?;

        let escrow_released = IntCounter::new(
            "market_escrow_released_total",
            "Escrow locks returned to buyers",
        )?;
        registry.register(Box::new(escrow_released.clone()))?;

        let underpriced_locks = IntCounter::new(
            "market_underpriced_locks_total",
            "Underpriced-sale cooldowns engaged",
        )?;
        registry.register(Box::new(underpriced_locks.clone()))?;

        let settlement_duration = Histogram::with_opts(
            HistogramOpts::new(
                "market_settlement_duration_seconds",
                "Settlement latency",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(settlement_duration.clone()))?;

        Ok(Self {
            listings_created,
            offers_created,
            trades_settled,
            escrow_released,
            underpriced_locks,
            settlement_duration,
            registry,
        })
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
