//! The wallet gateway trait

use crate::error::Result;
use async_trait::async_trait;
use parcel_core::{Asset, UserId};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Atomic lock/unlock/debit/credit of named asset balances per user
///
/// Each method is a single atomic operation against the wallet store: a
/// lock either moves the full amount from spendable to locked or fails
/// with `Insufficient`, never partially.
///
/// `credit` and `debit` operate on the spendable balance; `lock_balance`
/// and `unlock_balance` move funds between the spendable and locked
/// buckets. Converting an escrow lock into a transfer is an unlock
/// followed by a debit of the same amount, each step individually
/// compensable.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Move `amount` of the user's spendable balance into the locked bucket
    async fn lock_balance(
        &self,
        user: UserId,
        asset: Asset,
        amount: Decimal,
        reason: &str,
    ) -> Result<()>;

    /// Return `amount` from the locked bucket to the spendable balance
    async fn unlock_balance(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()>;

    /// Add to the user's spendable balance
    async fn credit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()>;

    /// Remove from the user's spendable balance
    async fn debit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()>;

    /// Total balance (spendable + locked)
    async fn get_balance(&self, user: UserId, asset: Asset) -> Result<Decimal>;
}

#[async_trait]
impl<T: LedgerGateway + ?Sized> LedgerGateway for Arc<T> {
    async fn lock_balance(
        &self,
        user: UserId,
        asset: Asset,
        amount: Decimal,
        reason: &str,
    ) -> Result<()> {
        (**self).lock_balance(user, asset, amount, reason).await
    }

    async fn unlock_balance(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        (**self).unlock_balance(user, asset, amount).await
    }

    async fn credit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        (**self).credit(user, asset, amount).await
    }

    async fn debit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        (**self).debit(user, asset, amount).await
    }

    async fn get_balance(&self, user: UserId, asset: Asset) -> Result<Decimal> {
        (**self).get_balance(user, asset).await
    }
}
