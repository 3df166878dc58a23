// # Shipment Store Implementations
//
// This module provides implementations of the ShipmentStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileShipmentStore;
pub use memory::MemoryShipmentStore;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::ShipmentStore;

/// Open the store described by the configuration
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn ShipmentStore>> {
    match config {
        StoreConfig::File { path } => {
            tracing::debug!("Opening file store at {}", path.display());
            Ok(Box::new(FileShipmentStore::new(path).await?))
        }
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory store: state will not survive this run");
            Ok(Box::new(MemoryShipmentStore::new()))
        }
    }
}
