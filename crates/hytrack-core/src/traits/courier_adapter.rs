// # Courier Adapter Trait
//
// Defines the interface for fetching the current tracking status of a waybill.
//
// ## Implementations
//
// - Blue Dart (HTTP + HTML parse): `hytrack-courier-bluedart` crate
// - Delhivery (headless browser over WebDriver): `hytrack-courier-delhivery` crate
//
// ## Usage
//
// ```rust,ignore
// use hytrack_core::CourierAdapter;
//
// let adapter = /* CourierAdapter implementation */;
// match adapter.fetch("12345678901").await {
//     Ok(payload) => println!("{}", payload.status),
//     Err(failure) => eprintln!("skipping this cycle: {failure}"),
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::courier::Courier;
use crate::error::FetchFailure;

/// The latest tracking event a courier reports for a waybill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Courier that reported the status
    pub courier: Courier,
    /// Human-readable status text (e.g. "SHIPMENT DELIVERED")
    pub status: String,
    /// Location of the event, if the courier exposes one
    pub location: Option<String>,
    /// Event date as reported by the courier
    pub event_date: Option<String>,
    /// Event time as reported by the courier
    pub event_time: Option<String>,
    /// Public tracking page for the waybill
    pub tracking_url: String,
    /// When hytrack observed this status (not part of the fingerprint)
    pub observed_at: DateTime<Utc>,
}

impl StatusPayload {
    /// Create a payload with only the status text set
    pub fn new(courier: Courier, status: impl Into<String>, tracking_url: impl Into<String>) -> Self {
        Self {
            courier,
            status: status.into(),
            location: None,
            event_date: None,
            event_time: None,
            tracking_url: tracking_url.into(),
            observed_at: Utc::now(),
        }
    }

    /// Set the event location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the event date and time
    pub fn with_event_time(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.event_date = Some(date.into());
        self.event_time = Some(time.into());
        self
    }

    /// Whether this status is terminal delivery for its courier
    pub fn is_delivered(&self) -> bool {
        self.courier.is_delivered_status(&self.status)
    }

    /// Short status line stored alongside the fingerprint
    pub fn summary(&self) -> String {
        match self.location.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(location) => format!("{} ({})", self.status.trim(), location),
            None => self.status.trim().to_string(),
        }
    }
}

/// Trait for courier adapter implementations
///
/// # Contract
///
/// - One fetch per call, no retries: the next reconciliation cycle is the retry
/// - Bounded time: implementations must apply their own request timeouts
/// - Never panic on malformed pages: return [`FetchFailure::Unrecognized`]
/// - No access to the shipment store and no decisions about change detection
///
/// A payload is only returned when a recognizable status was found; an empty
/// status is a failure, not a change.
#[async_trait]
pub trait CourierAdapter: Send + Sync {
    /// Fetch the latest tracking event for a waybill
    async fn fetch(&self, waybill: &str) -> Result<StatusPayload, FetchFailure>;

    /// The courier this adapter serves
    fn courier(&self) -> Courier;

    /// Adapter name (for logging/debugging)
    fn adapter_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_includes_location() {
        let payload = StatusPayload::new(Courier::BlueDart, " In Transit ", "url")
            .with_location("MUMBAI HUB");
        assert_eq!(payload.summary(), "In Transit (MUMBAI HUB)");

        let bare = StatusPayload::new(Courier::Delhivery, "Delivered", "url");
        assert_eq!(bare.summary(), "Delivered");
        assert!(bare.is_delivered());
    }
}
