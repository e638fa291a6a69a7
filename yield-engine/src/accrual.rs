//! Accrual bookkeeping and the per-cycle sweep

use crate::config::YieldConfig;
use crate::error::{Error, Result};
use crate::types::{CycleId, YieldAccrual};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ledger_gateway::LedgerGateway;
use parcel_core::{
    NotificationSink, NotifyEvent, ParcelId, ParcelRegistry, UserId,
};
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of one cycle sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    /// Entries credited this run
    pub credited: usize,

    /// Entries skipped (already credited, past deadline, frozen parcel,
    /// or wallet unreachable)
    pub skipped: usize,

    /// Entries deactivated because ownership changed out-of-band
    pub rotated: usize,
}

/// Ledger of yield accrual entries
pub struct AccrualLedger {
    entries: DashMap<Uuid, YieldAccrual>,
    by_parcel_owner: DashMap<(ParcelId, UserId), Uuid>,
    registry: Arc<ParcelRegistry>,
    wallet: Arc<dyn LedgerGateway>,
    notifier: Arc<dyn NotificationSink>,
    config: YieldConfig,
}

impl std::fmt::Debug for AccrualLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccrualLedger")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}

impl AccrualLedger {
    /// Create an accrual ledger over a parcel registry and wallet gateway
    pub fn new(
        registry: Arc<ParcelRegistry>,
        wallet: Arc<dyn LedgerGateway>,
        notifier: Arc<dyn NotificationSink>,
        config: YieldConfig,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            by_parcel_owner: DashMap::new(),
            registry,
            wallet,
            notifier,
            config,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &YieldConfig {
        &self.config
    }

    /// Open an accrual entry for an owner
    ///
    /// The entry starts at the next cycle boundary. If an active entry for
    /// the pair already exists it is returned unchanged.
    pub fn open_entry(&self, owner: UserId, parcel: ParcelId, now: DateTime<Utc>) -> Result<Uuid> {
        if let Some(existing) = self.by_parcel_owner.get(&(parcel, owner)) {
            return Ok(*existing);
        }

        let snapshot = self.registry.snapshot(parcel)?;
        let entry = YieldAccrual {
            id: Uuid::new_v4(),
            owner,
            parcel,
            asset: snapshot.properties.class.yield_asset(),
            amount: rust_decimal::Decimal::ZERO,
            deadline: now + Duration::days(self.config.deadline_days),
            starts_at_cycle: CycleId::at(now, self.config.cycle_hours).next(),
            last_credited_cycle: None,
            active: true,
            created_at: now,
        };
        let id = entry.id;
        self.entries.insert(id, entry);
        self.by_parcel_owner.insert((parcel, owner), id);
        Ok(id)
    }

    /// Rotate the accrual entry on a sale
    ///
    /// Deactivates the outgoing owner's entry immediately (no pro-rating)
    /// and opens the incoming owner's entry at the next cycle boundary.
    pub fn transfer_on_sale(
        &self,
        parcel: ParcelId,
        seller: UserId,
        buyer: UserId,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        self.deactivate(parcel, seller);
        self.open_entry(buyer, parcel, now)
    }

    /// Deactivate an owner's entry for a parcel, if one is active
    pub fn deactivate(&self, parcel: ParcelId, owner: UserId) {
        if let Some((_, id)) = self.by_parcel_owner.remove(&(parcel, owner)) {
            if let Some(mut entry) = self.entries.get_mut(&id) {
                entry.active = false;
            }
        }
    }

    /// Push an entry's accrual deadline forward (owner touch)
    pub fn renew(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("accrual {}", id)))?;
        entry.deadline = now + Duration::days(self.config.deadline_days);
        Ok(())
    }

    /// Fetch an entry by id
    pub fn entry(&self, id: Uuid) -> Result<YieldAccrual> {
        self.entries
            .get(&id)
            .map(|e| e.clone())
            .ok_or_else(|| Error::NotFound(format!("accrual {}", id)))
    }

    /// Active entries for a user
    pub fn active_accruals(&self, user: UserId) -> Vec<YieldAccrual> {
        self.entries
            .iter()
            .filter(|e| e.active && e.owner == user)
            .map(|e| e.clone())
            .collect()
    }

    /// Run one accrual cycle over all entries
    ///
    /// Safe to call repeatedly with the same cycle id: entries already
    /// credited for that cycle are skipped. Ownership is read once per
    /// parcel from a registry snapshot.
    pub async fn run_cycle(&self, cycle: CycleId, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();
        let ids: Vec<Uuid> = self
            .entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.id)
            .collect();

        for id in ids {
            let entry = match self.entries.get(&id) {
                Some(e) => e.clone(),
                None => continue,
            };

            if !entry.active
                || entry.starts_at_cycle > cycle
                || entry.last_credited_cycle == Some(cycle)
                || entry.deadline < now
            {
                report.skipped += 1;
                continue;
            }

            let snapshot = match self.registry.snapshot(entry.parcel) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(parcel = %entry.parcel, error = %e, "accrual skipped, parcel unreadable");
                    report.skipped += 1;
                    continue;
                }
            };

            // Administrative freezes pause accrual without closing the entry
            if snapshot.properties.status.is_frozen() {
                report.skipped += 1;
                continue;
            }

            // Ownership changed out-of-band: rotate the entry and let the
            // new owner start at the next boundary
            if snapshot.parcel.owner != entry.owner {
                self.deactivate(entry.parcel, entry.owner);
                if let Err(e) = self.open_entry(snapshot.parcel.owner, entry.parcel, now) {
                    tracing::warn!(parcel = %entry.parcel, error = %e, "failed to rotate accrual entry");
                }
                report.rotated += 1;
                continue;
            }

            let amount = snapshot.properties.stability * self.config.rate;
            match self.wallet.credit(entry.owner, entry.asset, amount).await {
                Ok(()) => {
                    if let Some(mut stored) = self.entries.get_mut(&id) {
                        stored.amount += amount;
                        stored.last_credited_cycle = Some(cycle);
                    }
                    self.notifier.notify(
                        entry.owner,
                        NotifyEvent::YieldDeposited {
                            parcel: entry.parcel,
                            asset: entry.asset,
                            amount,
                        },
                    );
                    report.credited += 1;
                }
                Err(e) => {
                    // Not marked credited: the next sweep retries this cycle
                    tracing::warn!(
                        parcel = %entry.parcel,
                        owner = %entry.owner,
                        error = %e,
                        "yield credit failed, will retry next cycle"
                    );
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            %cycle,
            credited = report.credited,
            skipped = report.skipped,
            rotated = report.rotated,
            "accrual cycle complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_gateway::InMemoryLedger;
    use parcel_core::{
        Asset, LogNotifier, Parcel, ParcelClass, ParcelProperties, ParcelStatus,
    };
    use rust_decimal::Decimal;

    fn setup(stability: i64) -> (Arc<ParcelRegistry>, Arc<InMemoryLedger>, AccrualLedger) {
        let registry = Arc::new(ParcelRegistry::new());
        let wallet = Arc::new(InMemoryLedger::new());
        let parcel_id = ParcelId::new(1);
        registry
            .insert(
                Parcel {
                    id: parcel_id,
                    owner: UserId::new(10),
                    geometry: None,
                    dynasty: None,
                },
                ParcelProperties {
                    parcel_id,
                    class: ParcelClass::Residential,
                    status: ParcelStatus::initial(ParcelClass::Residential),
                    area: Decimal::from(100),
                    density: Decimal::ONE,
                    stability: Decimal::from(stability),
                    price_psc: Decimal::ZERO,
                    price_irr: Decimal::ZERO,
                    minimum_price_pct: Decimal::from(80),
                },
            )
            .unwrap();

        let ledger = AccrualLedger::new(
            registry.clone(),
            wallet.clone(),
            Arc::new(LogNotifier),
            YieldConfig::default(),
        );
        (registry, wallet, ledger)
    }

    #[tokio::test]
    async fn test_cycle_credits_owner_wallet() {
        let (_registry, wallet, accruals) = setup(15_000);
        let owner = UserId::new(10);
        let parcel = ParcelId::new(1);
        let now = Utc::now();

        accruals.open_entry(owner, parcel, now).unwrap();
        let cycle = CycleId::at(now, 3).next();
        let report = accruals.run_cycle(cycle, now).await;

        assert_eq!(report.credited, 1);
        // 15000 × 0.000041666 = 0.62499
        let expected = Decimal::from(15_000) * Decimal::new(41_666, 9);
        assert_eq!(
            wallet.get_balance(owner, Asset::Yellow).await.unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_same_cycle_twice_credits_once() {
        let (_registry, wallet, accruals) = setup(15_000);
        let owner = UserId::new(10);
        let parcel = ParcelId::new(1);
        let now = Utc::now();

        accruals.open_entry(owner, parcel, now).unwrap();
        let cycle = CycleId::at(now, 3).next();

        let first = accruals.run_cycle(cycle, now).await;
        let second = accruals.run_cycle(cycle, now).await;

        assert_eq!(first.credited, 1);
        assert_eq!(second.credited, 0);
        assert_eq!(second.skipped, 1);

        let expected = Decimal::from(15_000) * Decimal::new(41_666, 9);
        assert_eq!(
            wallet.get_balance(owner, Asset::Yellow).await.unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_entry_not_credited_before_start_cycle() {
        let (_registry, wallet, accruals) = setup(15_000);
        let owner = UserId::new(10);
        let now = Utc::now();

        accruals.open_entry(owner, ParcelId::new(1), now).unwrap();
        // The entry starts at the NEXT boundary; the current cycle skips it
        let current = CycleId::at(now, 3);
        let report = accruals.run_cycle(current, now).await;

        assert_eq!(report.credited, 0);
        assert_eq!(
            wallet.get_balance(owner, Asset::Yellow).await.unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_sale_rotates_ownership_interval() {
        let (registry, wallet, accruals) = setup(15_000);
        let seller = UserId::new(10);
        let buyer = UserId::new(20);
        let parcel = ParcelId::new(1);
        let now = Utc::now();

        accruals.open_entry(seller, parcel, now).unwrap();
        let cycle = CycleId::at(now, 3).next();
        accruals.run_cycle(cycle, now).await;

        registry.set_owner(parcel, buyer).unwrap();
        accruals.transfer_on_sale(parcel, seller, buyer, now).unwrap();

        // Seller entry is inactive; next cycle credits only the buyer
        let next = cycle.next();
        let report = accruals.run_cycle(next, now).await;
        assert_eq!(report.credited, 1);

        let expected = Decimal::from(15_000) * Decimal::new(41_666, 9);
        assert_eq!(
            wallet.get_balance(seller, Asset::Yellow).await.unwrap(),
            expected
        );
        assert_eq!(
            wallet.get_balance(buyer, Asset::Yellow).await.unwrap(),
            expected
        );
        assert_eq!(accruals.active_accruals(seller).len(), 0);
        assert_eq!(accruals.active_accruals(buyer).len(), 1);
    }

    #[tokio::test]
    async fn test_offline_wallet_skips_and_retries() {
        let (_registry, wallet, accruals) = setup(15_000);
        let owner = UserId::new(10);
        let now = Utc::now();

        accruals.open_entry(owner, ParcelId::new(1), now).unwrap();
        let cycle = CycleId::at(now, 3).next();

        wallet.set_offline(true);
        let report = accruals.run_cycle(cycle, now).await;
        assert_eq!(report.credited, 0);
        assert_eq!(report.skipped, 1);

        // Same cycle succeeds once the wallet is back
        wallet.set_offline(false);
        let report = accruals.run_cycle(cycle, now).await;
        assert_eq!(report.credited, 1);
    }

    #[tokio::test]
    async fn test_expired_deadline_pauses_accrual() {
        let (_registry, _wallet, accruals) = setup(15_000);
        let owner = UserId::new(10);
        let now = Utc::now();

        let id = accruals.open_entry(owner, ParcelId::new(1), now).unwrap();
        let later = now + Duration::days(30);
        let cycle = CycleId::at(later, 3);

        let report = accruals.run_cycle(cycle, later).await;
        assert_eq!(report.credited, 0);

        // Renewal resumes accrual
        accruals.renew(id, later).unwrap();
        let report = accruals.run_cycle(cycle, later).await;
        assert_eq!(report.credited, 1);
    }
}
