//! Bounded-deadline gateway decorator
//!
//! Wallet calls cross a trust boundary; no marketplace operation may block
//! on them indefinitely. This wrapper applies a hard deadline to every
//! call and maps an elapsed deadline to [`Error::Timeout`] so callers can
//! roll back partial escrow instead of leaving it dangling.

use crate::error::{Error, Result};
use crate::gateway::LedgerGateway;
use async_trait::async_trait;
use parcel_core::{Asset, UserId};
use rust_decimal::Decimal;
use std::time::Duration;

/// Gateway decorator enforcing a per-call deadline
#[derive(Debug)]
pub struct BoundedGateway<G> {
    inner: G,
    deadline: Duration,
}

impl<G: LedgerGateway> BoundedGateway<G> {
    /// Wrap a gateway with a per-call deadline
    pub fn new(inner: G, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    /// The configured deadline
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl std::future::Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, deadline_ms = self.deadline.as_millis() as u64, "ledger call timed out");
                Err(Error::Timeout(format!(
                    "{} exceeded {}ms deadline",
                    op,
                    self.deadline.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl<G: LedgerGateway> LedgerGateway for BoundedGateway<G> {
    async fn lock_balance(
        &self,
        user: UserId,
        asset: Asset,
        amount: Decimal,
        reason: &str,
    ) -> Result<()> {
        self.bounded("lock_balance", self.inner.lock_balance(user, asset, amount, reason))
            .await
    }

    async fn unlock_balance(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        self.bounded("unlock_balance", self.inner.unlock_balance(user, asset, amount))
            .await
    }

    async fn credit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        self.bounded("credit", self.inner.credit(user, asset, amount)).await
    }

    async fn debit(&self, user: UserId, asset: Asset, amount: Decimal) -> Result<()> {
        self.bounded("debit", self.inner.debit(user, asset, amount)).await
    }

    async fn get_balance(&self, user: UserId, asset: Asset) -> Result<Decimal> {
        self.bounded("get_balance", self.inner.get_balance(user, asset)).await
    }
}
