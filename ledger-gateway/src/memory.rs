//! In-memory wallet store
//!
//! Reference implementation of [`LedgerGateway`] used by tests, local runs
//! and the yield sweep simulations. Accounts are keyed by (user, asset);
//! each mutation holds the entry lock for its full duration, so compound
//! lock/unlock sequences from concurrent offers never double-count.

use crate::error::{Error, Result};
use crate::gateway::LedgerGateway;
use async_trait::async_trait;
use dashmap::DashMap;
use parcel_core::{Asset, UserId};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default, Clone, Copy)]
struct Account {
    available: Decimal,
    locked: Decimal,
}

/// In-memory ledger keyed by (user, asset)
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: DashMap<(UserId, Asset), Account>,
    offline: AtomicBool,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a spendable balance (tests and simulations)
    pub fn deposit(&self, user: UserId, asset: Asset, amount: Decimal) {
        let mut account = self.accounts.entry((user, asset)).or_default();
        account.available += amount;
    }

    /// Currently locked amount for a (user, asset) pair
    pub fn locked_of(&self, user: UserId, asset: Asset) -> Decimal {
        self.accounts
            .get(&(user, asset))
            .map(|a| a.locked)
            .unwrap_or(Decimal::ZERO)
    }

    /// Currently spendable amount for a (user, asset) pair
    pub fn available_of(&self, user: UserId, asset: Asset) -> Decimal {
        self.accounts
            .get(&(user, asset))
            .map(|a| a.available)
            .unwrap_or(Decimal::ZERO)
    }

    /// Simulate the wallet store going down (tests)
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("wallet store offline".to_string()));
        }
        Ok(())
    }

    fn ensure_non_negative(amount: Decimal) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "negative amount {}",
                amount
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn lock_balance(
        &self,
        user: UserId,
        asset: Asset,
        amount: Decimal,
        reason: &str,
    ) -> Result<()> {
        self.ensure_online()?;
        Self::ensure_non_negative(amount)?;

        let mut account = self.accounts.entry((user, asset)).or_default();
        if account.available < amount {
            return Err(Error::Insufficient(format!(
                "{} has {} {} spendable, {} requested for {}",
                user, account.available, asset, amount, reason
            )));
        }
        account.available -= amount;
        account.locked += amount;
        tracing::debug!(%user, %asset, %amount, reason, "balance locked");
        Ok(())
    }

    async fn unlock_balance(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        self.ensure_online()?;
        Self::ensure_non_negative(amount)?;

        let mut account = self.accounts.entry((user, asset)).or_default();
        if account.locked < amount {
            return Err(Error::Insufficient(format!(
                "{} has {} {} locked, {} requested for unlock",
                user, account.locked, asset, amount
            )));
        }
        account.locked -= amount;
        account.available += amount;
        Ok(())
    }

    async fn credit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        self.ensure_online()?;
        Self::ensure_non_negative(amount)?;

        let mut account = self.accounts.entry((user, asset)).or_default();
        account.available += amount;
        Ok(())
    }

    async fn debit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        self.ensure_online()?;
        Self::ensure_non_negative(amount)?;

        let mut account = self.accounts.entry((user, asset)).or_default();
        if account.available < amount {
            return Err(Error::Insufficient(format!(
                "{} has {} {} spendable, {} requested for debit",
                user, account.available, asset, amount
            )));
        }
        account.available -= amount;
        Ok(())
    }

    async fn get_balance(&self, user: UserId, asset: Asset) -> Result<Decimal> {
        self.ensure_online()?;
        Ok(self
            .accounts
            .get(&(user, asset))
            .map(|a| a.available + a.locked)
            .unwrap_or(Decimal::ZERO))
    }
}
