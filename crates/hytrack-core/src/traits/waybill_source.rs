// # Waybill Source Trait
//
// Defines the producer of newly discovered waybills.
//
// Sources may report the same waybill on every run; the reconciler resolves
// duplicates through `ShipmentStore::get_or_create`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::courier::Courier;

/// A waybill found by a source, tagged with its courier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredWaybill {
    /// Tracking number
    pub waybill: String,
    /// Courier inferred from the tracking number format
    pub courier: Courier,
}

impl DiscoveredWaybill {
    /// Create a discovered waybill
    pub fn new(waybill: impl Into<String>, courier: Courier) -> Self {
        Self {
            waybill: waybill.into(),
            courier,
        }
    }
}

/// Trait for waybill source implementations
#[async_trait]
pub trait WaybillSource: Send + Sync {
    /// Return every waybill currently visible to the source
    async fn discover(&self) -> Result<Vec<DiscoveredWaybill>, crate::Error>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
