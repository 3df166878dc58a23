// # hytrack-core
//
// Core library for the hytrack shipment tracker.
//
// ## Architecture Overview
//
// This library provides the change-detection and tracking-state engine:
// - **CourierAdapter**: Trait for fetching the current status of a waybill
// - **ShipmentStore**: Trait for durable per-waybill tracking state
// - **Notifier**: Trait for delivering change events to the user
// - **WaybillSource**: Trait for discovering new waybills
// - **TrackingReconciler**: Orchestrates discover → fetch → fingerprint → persist → notify
// - **CourierAdapters**: Closed set of adapters, one per supported courier
//
// ## Design Principles
//
// 1. **Persist before notify**: A change event is only emitted after the new
//    fingerprint is durably stored
// 2. **At most one notification per transition**: The store's compare-and-update
//    is the single point of truth for whether a transition already happened
// 3. **Termination on delivery**: Delivered shipments are never polled again
// 4. **Failure isolation**: A failure for one waybill never aborts the cycle
// 5. **Library-first**: Adapters, stores and notifiers are plain trait objects

pub mod config;
pub mod courier;
pub mod discovery;
pub mod error;
pub mod fingerprint;
pub mod reconciler;
pub mod registry;
pub mod render;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::HytrackConfig;
pub use courier::Courier;
pub use error::{Error, FetchFailure, Result};
pub use fingerprint::Fingerprint;
pub use reconciler::{CycleReport, DiscoveryReport, ReconcilerEvent, TrackingReconciler};
pub use registry::CourierAdapters;
pub use state::{FileShipmentStore, MemoryShipmentStore};
pub use traits::{CourierAdapter, Notifier, ShipmentStore, WaybillSource};
