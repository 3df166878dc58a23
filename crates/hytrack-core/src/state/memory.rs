// # Memory Shipment Store
//
// In-memory implementation of ShipmentStore.
//
// ## Purpose
//
// Provides a fast store that doesn't persist across restarts. Useful for
// tests and for dry runs.
//
// ## Crash Behavior
//
// - All state is lost on restart
// - The next run treats every waybill as new and notifies its current status again

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::courier::Courier;
use crate::traits::shipment_store::{RecordUpdate, ShipmentRecord, ShipmentStore, UpdateOutcome};

/// In-memory shipment store
///
/// Records live in a HashMap protected by a RwLock. Clones share the same
/// map, so a test can keep a handle while the reconciler owns another.
///
/// # Example
///
/// ```rust,no_run
/// use hytrack_core::Courier;
/// use hytrack_core::state::MemoryShipmentStore;
/// use hytrack_core::traits::ShipmentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryShipmentStore::new();
///
///     let record = store.get_or_create("12345678901", Courier::BlueDart).await?;
///     assert!(record.last_event_hash.is_none());
///     assert_eq!(store.list_active().await?.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryShipmentStore {
    inner: Arc<RwLock<HashMap<String, ShipmentRecord>>>,
}

impl MemoryShipmentStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl Default for MemoryShipmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShipmentStore for MemoryShipmentStore {
    async fn get_or_create(&self, waybill: &str, courier: Courier) -> Result<ShipmentRecord, Error> {
        let mut guard = self.inner.write().await;
        let record = guard
            .entry(waybill.to_string())
            .or_insert_with(|| ShipmentRecord::new(waybill, courier));
        Ok(record.clone())
    }

    async fn get(&self, waybill: &str) -> Result<Option<ShipmentRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(waybill).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ShipmentRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.values().filter(|r| r.is_active()).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<ShipmentRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn update(&self, waybill: &str, update: &RecordUpdate) -> Result<UpdateOutcome, Error> {
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(waybill)
            .ok_or_else(|| Error::not_found(waybill))?;
        Ok(record.apply(update))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}
