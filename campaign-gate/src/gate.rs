//! Eligibility evaluation and purchase-cap tracking

use crate::types::{CampaignPurchase, CampaignWindow, Decision, DenialReason};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parcel_core::{
    AgeBracket, DynastyDirectory, Error, IdentityDirectory, ParcelId, Result, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Campaign eligibility gate
///
/// Holds the registered campaign windows and the purchase counters used to
/// enforce per-user caps. `record_purchase` re-checks the cap under the
/// counter's entry lock, which is what keeps concurrent settlements of the
/// same user inside the cap.
pub struct CampaignGate {
    windows: DashMap<Uuid, CampaignWindow>,
    purchases: DashMap<(UserId, Uuid), Vec<CampaignPurchase>>,
    identity: Arc<dyn IdentityDirectory>,
    dynasty: Arc<dyn DynastyDirectory>,
}

impl std::fmt::Debug for CampaignGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignGate")
            .field("windows", &self.windows.len())
            .finish()
    }
}

impl CampaignGate {
    /// Create a gate over the given collaborators
    pub fn new(identity: Arc<dyn IdentityDirectory>, dynasty: Arc<dyn DynastyDirectory>) -> Self {
        Self {
            windows: DashMap::new(),
            purchases: DashMap::new(),
            identity,
            dynasty,
        }
    }

    /// Register a campaign window
    pub fn register_window(&self, window: CampaignWindow) -> Result<()> {
        if window.first_parcel > window.last_parcel {
            return Err(Error::Validation(format!(
                "campaign {} has inverted parcel range",
                window.id
            )));
        }
        if window.starts_at >= window.ends_at {
            return Err(Error::Validation(format!(
                "campaign {} has inverted time range",
                window.id
            )));
        }
        tracing::info!(campaign = %window.id, title = %window.title, "campaign registered");
        self.windows.insert(window.id, window);
        Ok(())
    }

    /// Mark a window expired
    pub fn expire_window(&self, id: Uuid) -> Result<()> {
        let mut window = self
            .windows
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("campaign {}", id)))?;
        window.expired = true;
        Ok(())
    }

    /// The active window covering a parcel, if any
    pub fn active_window_for(&self, parcel: ParcelId, now: DateTime<Utc>) -> Option<CampaignWindow> {
        self.windows
            .iter()
            .find(|w| w.is_active(now) && w.covers(parcel))
            .map(|w| w.clone())
    }

    /// Campaign floor override for a parcel, if a covering window sets one
    pub fn floor_override_for(&self, parcel: ParcelId, now: DateTime<Utc>) -> Option<Decimal> {
        self.active_window_for(parcel, now)
            .and_then(|w| w.floor_override_pct)
    }

    /// Purchases a user has made against a campaign
    pub fn purchase_count(&self, user: UserId, campaign: Uuid) -> u32 {
        self.purchases
            .get(&(user, campaign))
            .map(|v| v.len() as u32)
            .unwrap_or(0)
    }

    /// Evaluate whether a buyer may purchase a parcel
    ///
    /// Returns `Allowed` when no active window covers the parcel. A
    /// collaborator failure surfaces as a dependency error: the gate fails
    /// closed rather than guessing.
    pub async fn evaluate(
        &self,
        user: UserId,
        parcel: ParcelId,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let window = match self.active_window_for(parcel, now) {
            Some(w) => w,
            None => return Ok(Decision::Allowed),
        };

        if window.require_verified_kyc && !self.identity.is_verified(user).await? {
            return Ok(Decision::Denied(DenialReason::KycRequired));
        }

        if window.require_adult || window.require_minor {
            let bracket = self.identity.age_bracket(user).await?;
            if window.require_adult && bracket == AgeBracket::Minor {
                return Ok(Decision::Denied(DenialReason::AdultsOnly));
            }
            if window.require_minor && bracket == AgeBracket::Adult {
                return Ok(Decision::Denied(DenialReason::MinorsOnly));
            }
        }

        if window.require_dynasty_owner && !self.dynasty.owns_dynasty(user).await? {
            return Ok(Decision::Denied(DenialReason::DynastyOwnershipRequired));
        }

        if let Some(cap) = window.per_user_cap {
            if self.purchase_count(user, window.id) >= cap {
                return Ok(Decision::Denied(DenialReason::PurchaseCapReached { cap }));
            }
        }

        Ok(Decision::Allowed)
    }

    /// Record a settled purchase against a campaign
    ///
    /// Re-checks the cap under the counter's entry lock; two settlements
    /// racing past `evaluate` cannot both record the capping purchase.
    pub fn record_purchase(
        &self,
        user: UserId,
        campaign: Uuid,
        parcel: ParcelId,
        now: DateTime<Utc>,
    ) -> Result<CampaignPurchase> {
        let window = self
            .windows
            .get(&campaign)
            .ok_or_else(|| Error::NotFound(format!("campaign {}", campaign)))?;
        let cap = window.per_user_cap;
        drop(window);

        let mut entry = self.purchases.entry((user, campaign)).or_default();
        if let Some(cap) = cap {
            if entry.len() as u32 >= cap {
                return Err(Error::Policy(
                    DenialReason::PurchaseCapReached { cap }.to_string(),
                ));
            }
        }
        let purchase = CampaignPurchase {
            user,
            campaign,
            parcel,
            purchased_at: now,
        };
        entry.push(purchase.clone());
        Ok(purchase)
    }

    /// Remove a recorded purchase (settlement rollback compensation)
    pub fn revoke_purchase(&self, user: UserId, campaign: Uuid, parcel: ParcelId) {
        if let Some(mut entry) = self.purchases.get_mut(&(user, campaign)) {
            if let Some(pos) = entry.iter().rposition(|p| p.parcel == parcel) {
                entry.remove(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use parcel_core::StaticDirectory;

    fn gate_with(dir: StaticDirectory) -> CampaignGate {
        let dir = Arc::new(dir);
        CampaignGate::new(dir.clone(), dir)
    }

    fn window(first: u64, last: u64) -> CampaignWindow {
        let now = Utc::now();
        CampaignWindow {
            id: Uuid::new_v4(),
            title: "district launch".to_string(),
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(24),
            first_parcel: ParcelId::new(first),
            last_parcel: ParcelId::new(last),
            require_verified_kyc: false,
            require_adult: false,
            require_minor: false,
            require_dynasty_owner: false,
            per_user_cap: None,
            floor_override_pct: None,
            expired: false,
        }
    }

    #[tokio::test]
    async fn test_uncovered_parcel_is_allowed() {
        let gate = gate_with(StaticDirectory::new());
        gate.register_window(window(100, 200)).unwrap();

        let decision = gate
            .evaluate(UserId::new(1), ParcelId::new(50), Utc::now())
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_kyc_requirement_denies_unverified() {
        let dir = StaticDirectory::new();
        dir.put_user(UserId::new(1), false, AgeBracket::Adult, false);
        let gate = gate_with(dir);

        let mut w = window(100, 200);
        w.require_verified_kyc = true;
        gate.register_window(w).unwrap();

        let decision = gate
            .evaluate(UserId::new(1), ParcelId::new(150), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, Decision::Denied(DenialReason::KycRequired));
    }

    #[tokio::test]
    async fn test_age_bracket_restrictions() {
        let dir = StaticDirectory::new();
        dir.put_user(UserId::new(1), true, AgeBracket::Minor, false);
        dir.put_user(UserId::new(2), true, AgeBracket::Adult, false);
        let gate = gate_with(dir);

        let mut w = window(100, 200);
        w.require_adult = true;
        gate.register_window(w).unwrap();

        let minor = gate
            .evaluate(UserId::new(1), ParcelId::new(150), Utc::now())
            .await
            .unwrap();
        assert_eq!(minor, Decision::Denied(DenialReason::AdultsOnly));

        let adult = gate
            .evaluate(UserId::new(2), ParcelId::new(150), Utc::now())
            .await
            .unwrap();
        assert!(adult.is_allowed());
    }

    #[tokio::test]
    async fn test_purchase_cap_enforced() {
        let gate = gate_with(StaticDirectory::new());
        let mut w = window(100, 200);
        w.per_user_cap = Some(1);
        let campaign = w.id;
        gate.register_window(w).unwrap();

        let user = UserId::new(1);
        let now = Utc::now();

        // First purchase in range fits the cap
        let decision = gate.evaluate(user, ParcelId::new(110), now).await.unwrap();
        assert!(decision.is_allowed());
        gate.record_purchase(user, campaign, ParcelId::new(110), now)
            .unwrap();

        // Second offer in the same campaign is denied
        let decision = gate.evaluate(user, ParcelId::new(120), now).await.unwrap();
        assert_eq!(
            decision,
            Decision::Denied(DenialReason::PurchaseCapReached { cap: 1 })
        );

        // Recording past the cap is refused even if evaluate was raced
        let result = gate.record_purchase(user, campaign, ParcelId::new(120), now);
        assert!(matches!(result, Err(Error::Policy(_))));
    }

    #[tokio::test]
    async fn test_revoked_purchase_frees_the_cap() {
        let gate = gate_with(StaticDirectory::new());
        let mut w = window(100, 200);
        w.per_user_cap = Some(1);
        let campaign = w.id;
        gate.register_window(w).unwrap();

        let user = UserId::new(1);
        let now = Utc::now();
        gate.record_purchase(user, campaign, ParcelId::new(110), now)
            .unwrap();
        gate.revoke_purchase(user, campaign, ParcelId::new(110));

        assert_eq!(gate.purchase_count(user, campaign), 0);
        let decision = gate.evaluate(user, ParcelId::new(120), now).await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_expired_window_stops_gating() {
        let gate = gate_with(StaticDirectory::new());
        let mut w = window(100, 200);
        w.require_verified_kyc = true;
        let id = w.id;
        gate.register_window(w).unwrap();
        gate.expire_window(id).unwrap();

        let decision = gate
            .evaluate(UserId::new(1), ParcelId::new(150), Utc::now())
            .await
            .unwrap();
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let gate = gate_with(StaticDirectory::new());
        let mut w = window(200, 100);
        w.last_parcel = ParcelId::new(100);
        w.first_parcel = ParcelId::new(200);
        assert!(matches!(
            gate.register_window(w),
            Err(Error::Validation(_))
        ));
    }
}
