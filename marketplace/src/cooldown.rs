//! Underpriced-sale cooldown
//!
//! A sale settling below 100% of the price floor freezes the parcel from
//! further trading for a fixed cooldown (24 hours by default). Expiry is
//! checked lazily on the next listing/offer attempt and by the periodic
//! sweep; whichever runs first moves the parcel back to sold-and-not-priced.

use crate::book::MarketBook;
use crate::error::{Error, Result};
use crate::types::UnderpricedLock;
use chrono::{DateTime, Duration, Utc};
use parcel_core::{ParcelId, ParcelRegistry, StatusKind};
use std::sync::Arc;

/// Applies and releases underpriced-sale locks
#[derive(Clone)]
pub struct CooldownEnforcer {
    book: Arc<MarketBook>,
    registry: Arc<ParcelRegistry>,
    lock_hours: i64,
}

impl std::fmt::Debug for CooldownEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownEnforcer")
            .field("lock_hours", &self.lock_hours)
            .finish()
    }
}

impl CooldownEnforcer {
    /// Create an enforcer with the configured lock duration
    pub fn new(book: Arc<MarketBook>, registry: Arc<ParcelRegistry>, lock_hours: i64) -> Self {
        Self {
            book,
            registry,
            lock_hours,
        }
    }

    /// Engage a cooldown after an underpriced settlement
    pub fn engage(&self, parcel: ParcelId, now: DateTime<Utc>) -> Result<UnderpricedLock> {
        let lock = UnderpricedLock {
            parcel,
            locked_at: now,
            lock_end: now + Duration::hours(self.lock_hours),
            active: true,
        };
        self.book.engage_cooldown(lock.clone())?;
        self.registry
            .transition_status(parcel, StatusKind::TradingLimited)?;
        tracing::info!(%parcel, lock_end = %lock.lock_end, "underpriced cooldown engaged");
        Ok(lock)
    }

    /// Fail with a policy error while a cooldown is in force
    ///
    /// An expired lock is released on the spot (lazy expiry), so callers
    /// see the unlocked parcel without waiting for the sweep.
    pub fn ensure_clear(&self, parcel: ParcelId, now: DateTime<Utc>) -> Result<()> {
        let lock = match self.book.cooldown(parcel) {
            Some(lock) if lock.active => lock,
            _ => return Ok(()),
        };

        if now >= lock.lock_end {
            self.release(parcel)?;
            return Ok(());
        }

        let remaining = lock.lock_end - now;
        let message = if remaining.num_hours() < 1 {
            format!(
                "parcel sold under 100% of its floor; trading resumes in {} minutes",
                remaining.num_minutes().max(1)
            )
        } else {
            format!(
                "parcel sold under 100% of its floor; trading resumes in {} hours",
                remaining.num_hours()
            )
        };
        Err(Error::Policy(message))
    }

    /// Release a parcel's cooldown and restore its tradable status
    pub fn release(&self, parcel: ParcelId) -> Result<()> {
        self.book.clear_cooldown(parcel);
        self.registry
            .transition_status(parcel, StatusKind::SoldAndNotPriced)?;
        tracing::info!(%parcel, "underpriced cooldown released");
        Ok(())
    }

    /// Release every lock whose end has passed; returns the count
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut released = 0;
        for lock in self.book.active_cooldowns() {
            if now >= lock.lock_end {
                match self.release(lock.parcel) {
                    Ok(()) => released += 1,
                    Err(e) => {
                        tracing::warn!(parcel = %lock.parcel, error = %e, "cooldown release failed")
                    }
                }
            }
        }
        released
    }
}
