// # Shipment Store Trait
//
// Defines the interface for durable tracking state.
//
// ## Purpose
//
// The store holds one record per waybill:
// - The fingerprint of the last status the user was notified about
// - Whether the shipment was delivered (terminal, never polled again)
//
// It is what makes reconciliation idempotent across runs: a status whose
// fingerprint is already stored never produces a second notification.
//
// ## Implementations
//
// - `FileShipmentStore`: JSON file with atomic writes and backup recovery
// - `MemoryShipmentStore`: in-process only, for tests and dry runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::courier::Courier;
use crate::fingerprint::Fingerprint;

/// Tracking state for one waybill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    /// Courier-assigned tracking number (unique key)
    pub waybill: String,
    /// Courier, fixed at creation
    pub courier: Courier,
    /// Fingerprint of the last notified status, `None` before the first successful fetch
    pub last_event_hash: Option<Fingerprint>,
    /// Summary of the status behind `last_event_hash`
    #[serde(default)]
    pub last_status: Option<String>,
    /// Terminal flag, never reset once set
    pub is_delivered: bool,
    /// When the waybill was first discovered
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub last_updated: DateTime<Utc>,
}

impl ShipmentRecord {
    /// Create a fresh, active record with no fingerprint
    ///
    /// `pub(crate)`: records are only minted by store implementations.
    pub(crate) fn new(waybill: impl Into<String>, courier: Courier) -> Self {
        let now = Utc::now();
        Self {
            waybill: waybill.into(),
            courier,
            last_event_hash: None,
            last_status: None,
            is_delivered: false,
            created_at: now,
            last_updated: now,
        }
    }

    /// Whether the record is still being polled
    pub fn is_active(&self) -> bool {
        !self.is_delivered
    }

    /// Check a proposed update against this record and apply it if allowed
    ///
    /// Shared by store implementations so the compare-and-update rules live in
    /// one place.
    pub(crate) fn apply(&mut self, update: &RecordUpdate) -> UpdateOutcome {
        if self.is_delivered {
            return UpdateOutcome::AlreadyDelivered;
        }
        if self.last_event_hash != update.expected_hash {
            return UpdateOutcome::Stale {
                current_hash: self.last_event_hash.clone(),
            };
        }

        self.last_event_hash = Some(update.new_hash.clone());
        self.last_status = Some(update.status_summary.clone());
        self.is_delivered = update.delivered;
        self.last_updated = Utc::now();
        UpdateOutcome::Applied
    }
}

/// A status transition to persist for one record
///
/// `last_event_hash`, `last_status` and `is_delivered` are written together
/// or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    /// Fingerprint the caller compared against (`None` = never fetched)
    pub expected_hash: Option<Fingerprint>,
    /// New fingerprint
    pub new_hash: Fingerprint,
    /// Summary of the new status
    pub status_summary: String,
    /// Whether the new status is terminal delivery
    pub delivered: bool,
}

impl RecordUpdate {
    /// Create an update to `new_hash`, guarded by the hash the caller observed
    pub fn new(
        expected_hash: Option<Fingerprint>,
        new_hash: Fingerprint,
        status_summary: impl Into<String>,
        delivered: bool,
    ) -> Self {
        Self {
            expected_hash,
            new_hash,
            status_summary: status_summary.into(),
            delivered,
        }
    }
}

/// Result of a compare-and-update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The transition was persisted; the caller owns its notification
    Applied,
    /// Another writer moved the fingerprint first; nothing was written
    Stale {
        /// Fingerprint currently stored
        current_hash: Option<Fingerprint>,
    },
    /// The record is terminal; nothing was written
    AlreadyDelivered,
}

/// Trait for shipment store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. `update` must perform its
/// compare and its write under one lock so two writers can never both apply
/// the same transition.
///
/// # Durability
///
/// A successful `update` must be durable before it returns. A failed `update`
/// must leave the record exactly as it was.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Return the record for `waybill`, creating an active one if absent
    ///
    /// Idempotent: an existing record is returned untouched, even if
    /// `courier` differs from the stored courier.
    async fn get_or_create(
        &self,
        waybill: &str,
        courier: Courier,
    ) -> Result<ShipmentRecord, crate::Error>;

    /// Get a record without creating it
    async fn get(&self, waybill: &str) -> Result<Option<ShipmentRecord>, crate::Error>;

    /// All records not yet delivered (order unspecified)
    async fn list_active(&self) -> Result<Vec<ShipmentRecord>, crate::Error>;

    /// All records, delivered ones included
    async fn list_all(&self) -> Result<Vec<ShipmentRecord>, crate::Error>;

    /// Atomically apply a status transition
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateOutcome::Applied)`: persisted
    /// - `Ok(UpdateOutcome::Stale { .. })` / `Ok(UpdateOutcome::AlreadyDelivered)`: rejected, nothing written
    /// - `Err(Error::NotFound)`: unknown waybill
    /// - `Err(Error)`: storage failure, nothing written
    async fn update(
        &self,
        waybill: &str,
        update: &RecordUpdate,
    ) -> Result<UpdateOutcome, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::of_text(s)
    }

    #[test]
    fn test_apply_guards_on_expected_hash() {
        let mut record = ShipmentRecord::new("12345678901", Courier::BlueDart);

        let stale = RecordUpdate::new(Some(fp("other")), fp("a"), "A", false);
        assert!(matches!(record.apply(&stale), UpdateOutcome::Stale { current_hash: None }));
        assert_eq!(record.last_event_hash, None);

        let first = RecordUpdate::new(None, fp("a"), "A", false);
        assert_eq!(record.apply(&first), UpdateOutcome::Applied);
        assert_eq!(record.last_event_hash, Some(fp("a")));
        assert_eq!(record.last_status.as_deref(), Some("A"));

        // Replaying the same transition is rejected
        assert!(matches!(record.apply(&first), UpdateOutcome::Stale { .. }));
    }

    #[test]
    fn test_apply_delivered_is_terminal() {
        let mut record = ShipmentRecord::new("12345678901", Courier::BlueDart);
        let delivered = RecordUpdate::new(None, fp("d"), "Delivered", true);
        assert_eq!(record.apply(&delivered), UpdateOutcome::Applied);
        assert!(!record.is_active());

        let after = RecordUpdate::new(Some(fp("d")), fp("x"), "X", false);
        assert_eq!(record.apply(&after), UpdateOutcome::AlreadyDelivered);
        assert!(record.is_delivered);
        assert_eq!(record.last_event_hash, Some(fp("d")));
    }
}
