//! In-memory parcel registry
//!
//! The registry is the unit of per-parcel mutual exclusion. Each entry
//! carries a version counter bumped on every mutation; callers that must
//! serialize against concurrent operations use the compare-and-transition
//! form and treat a version mismatch as a lost race.

use crate::error::{Error, Result};
use crate::status::{ParcelStatus, StatusKind};
use crate::types::{Parcel, ParcelId, ParcelProperties, UserId};
use dashmap::DashMap;
use rust_decimal::Decimal;

/// Consistent point-in-time view of a parcel
#[derive(Debug, Clone)]
pub struct ParcelSnapshot {
    /// Parcel identity and ownership
    pub parcel: Parcel,

    /// Trading properties
    pub properties: ParcelProperties,

    /// Version at snapshot time
    pub version: u64,
}

#[derive(Debug)]
struct Entry {
    parcel: Parcel,
    properties: ParcelProperties,
    version: u64,
}

/// Registry of all parcels known to the marketplace
#[derive(Debug, Default)]
pub struct ParcelRegistry {
    entries: DashMap<ParcelId, Entry>,
}

impl ParcelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parcel with its properties
    pub fn insert(&self, parcel: Parcel, properties: ParcelProperties) -> Result<()> {
        if parcel.id != properties.parcel_id {
            return Err(Error::Validation(format!(
                "properties parcel id {} does not match parcel {}",
                properties.parcel_id, parcel.id
            )));
        }
        let id = parcel.id;
        match self.entries.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::Conflict(format!(
                "{} is already registered",
                id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Entry {
                    parcel,
                    properties,
                    version: 0,
                });
                Ok(())
            }
        }
    }

    /// Point-in-time snapshot of a parcel
    pub fn snapshot(&self, id: ParcelId) -> Result<ParcelSnapshot> {
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(ParcelSnapshot {
            parcel: entry.parcel.clone(),
            properties: entry.properties.clone(),
            version: entry.version,
        })
    }

    /// Current owner of a parcel
    pub fn owner_of(&self, id: ParcelId) -> Result<UserId> {
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        Ok(entry.parcel.owner)
    }

    /// Whether the parcel is registered
    pub fn contains(&self, id: ParcelId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Apply a legal status transition, bumping the version
    pub fn transition_status(&self, id: ParcelId, to: StatusKind) -> Result<ParcelStatus> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let next = entry.properties.status.transition(to)?;
        entry.properties.status = next;
        entry.version += 1;
        Ok(next)
    }

    /// Apply a status transition only if the version is unchanged
    ///
    /// The losing side of a concurrent settlement/cancel race gets a
    /// `Conflict` and may retry from a fresh snapshot.
    pub fn compare_and_transition(
        &self,
        id: ParcelId,
        expected_version: u64,
        to: StatusKind,
    ) -> Result<ParcelStatus> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if entry.version != expected_version {
            return Err(Error::Conflict(format!(
                "{} changed concurrently (version {} != {})",
                id, entry.version, expected_version
            )));
        }
        let next = entry.properties.status.transition(to)?;
        entry.properties.status = next;
        entry.version += 1;
        Ok(next)
    }

    /// Set a collaborator-owned status kind, bypassing the transition table
    ///
    /// Construction, dynasty and admin services own these states; the
    /// marketplace only respects them as gates.
    pub fn set_status_external(&self, id: ParcelId, kind: StatusKind) -> Result<ParcelStatus> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let next = ParcelStatus::new(entry.properties.class, kind);
        entry.properties.status = next;
        entry.version += 1;
        Ok(next)
    }

    /// Transfer ownership (settlement only)
    pub fn set_owner(&self, id: ParcelId, new_owner: UserId) -> Result<UserId> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let previous = entry.parcel.owner;
        entry.parcel.owner = new_owner;
        entry.version += 1;
        Ok(previous)
    }

    /// Update ask prices and the minimum-price percentage
    pub fn set_pricing(
        &self,
        id: ParcelId,
        price_psc: Decimal,
        price_irr: Decimal,
        minimum_price_pct: Decimal,
    ) -> Result<()> {
        let mut entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        entry.properties.price_psc = price_psc;
        entry.properties.price_irr = price_irr;
        entry.properties.minimum_price_pct = minimum_price_pct;
        entry.version += 1;
        Ok(())
    }

    /// IDs of all registered parcels (accrual sweeps)
    pub fn parcel_ids(&self) -> Vec<ParcelId> {
        self.entries.iter().map(|e| *e.key()).collect()
    }

    /// Number of registered parcels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParcelClass;
    use rust_decimal::Decimal;

    fn residential(id: u64, owner: u64) -> (Parcel, ParcelProperties) {
        let parcel_id = ParcelId::new(id);
        (
            Parcel {
                id: parcel_id,
                owner: UserId::new(owner),
                geometry: None,
                dynasty: None,
            },
            ParcelProperties {
                parcel_id,
                class: ParcelClass::Residential,
                status: ParcelStatus::initial(ParcelClass::Residential),
                area: Decimal::from(120),
                density: Decimal::from(2),
                stability: Decimal::from(15_000),
                price_psc: Decimal::ZERO,
                price_irr: Decimal::ZERO,
                minimum_price_pct: Decimal::from(80),
            },
        )
    }

    #[test]
    fn test_insert_and_snapshot() {
        let registry = ParcelRegistry::new();
        let (parcel, props) = residential(1, 10);
        registry.insert(parcel, props).unwrap();

        let snap = registry.snapshot(ParcelId::new(1)).unwrap();
        assert_eq!(snap.parcel.owner, UserId::new(10));
        assert_eq!(snap.version, 0);
        assert_eq!(snap.properties.status.kind(), StatusKind::NotPriced);
    }

    #[test]
    fn test_duplicate_insert_conflicts() {
        let registry = ParcelRegistry::new();
        let (parcel, props) = residential(1, 10);
        registry.insert(parcel, props).unwrap();

        let (parcel, props) = residential(1, 11);
        assert!(matches!(
            registry.insert(parcel, props),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_transitions_bump_version() {
        let registry = ParcelRegistry::new();
        let (parcel, props) = residential(1, 10);
        registry.insert(parcel, props).unwrap();
        let id = ParcelId::new(1);

        registry.transition_status(id, StatusKind::Priced).unwrap();
        let snap = registry.snapshot(id).unwrap();
        assert_eq!(snap.version, 1);
        assert_eq!(snap.properties.status.kind(), StatusKind::Priced);
    }

    #[test]
    fn test_compare_and_transition_detects_race() {
        let registry = ParcelRegistry::new();
        let (parcel, props) = residential(1, 10);
        registry.insert(parcel, props).unwrap();
        let id = ParcelId::new(1);

        let snap = registry.snapshot(id).unwrap();
        // Another writer slips in first
        registry.transition_status(id, StatusKind::Priced).unwrap();

        let result = registry.compare_and_transition(id, snap.version, StatusKind::Priced);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_set_owner_returns_previous() {
        let registry = ParcelRegistry::new();
        let (parcel, props) = residential(1, 10);
        registry.insert(parcel, props).unwrap();
        let id = ParcelId::new(1);

        let prev = registry.set_owner(id, UserId::new(20)).unwrap();
        assert_eq!(prev, UserId::new(10));
        assert_eq!(registry.owner_of(id).unwrap(), UserId::new(20));
    }

    #[test]
    fn test_external_status_bypasses_table() {
        let registry = ParcelRegistry::new();
        let (parcel, props) = residential(1, 10);
        registry.insert(parcel, props).unwrap();
        let id = ParcelId::new(1);

        let status = registry
            .set_status_external(id, StatusKind::InConstruction)
            .unwrap();
        assert_eq!(status.kind(), StatusKind::InConstruction);
        assert!(status.is_frozen());
    }

    #[test]
    fn test_missing_parcel_not_found() {
        let registry = ParcelRegistry::new();
        assert!(matches!(
            registry.snapshot(ParcelId::new(99)),
            Err(Error::NotFound(_))
        ));
    }
}
