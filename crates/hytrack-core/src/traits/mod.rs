//! Core traits for hytrack
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`CourierAdapter`]: Fetch the current status of a waybill
//! - [`ShipmentStore`]: Durable tracking state with compare-and-update
//! - [`Notifier`]: Deliver change events
//! - [`WaybillSource`]: Discover new waybills

pub mod courier_adapter;
pub mod notifier;
pub mod shipment_store;
pub mod waybill_source;

pub use courier_adapter::{CourierAdapter, StatusPayload};
pub use notifier::{ChangeEvent, LogNotifier, Notifier};
pub use shipment_store::{RecordUpdate, ShipmentRecord, ShipmentStore, UpdateOutcome};
pub use waybill_source::{DiscoveredWaybill, WaybillSource};
