// # Notifier Trait
//
// Defines the sink for change events.
//
// ## Implementations
//
// - SMTP email: `hytrack-notify-smtp` crate
// - `LogNotifier` (this module): logs the rendered subject only
//
// Notification is best-effort. By the time a notifier is called the state
// change is already committed; a failed notification is logged and never
// retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::courier::Courier;
use crate::traits::courier_adapter::StatusPayload;

/// A committed status transition for one shipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Waybill that changed
    pub waybill: String,
    /// Courier of the waybill
    pub courier: Courier,
    /// Summary of the previous status, `None` on the first successful fetch
    pub previous_status: Option<String>,
    /// The new status
    pub payload: StatusPayload,
    /// Whether the new status is terminal delivery
    pub delivered: bool,
}

/// Trait for notifier implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one change event
    ///
    /// # Returns
    ///
    /// - `Ok(())`: delivered
    /// - `Err(Error)`: delivery failed (logged by the reconciler, state untouched)
    async fn notify(&self, event: &ChangeEvent) -> Result<(), crate::Error>;

    /// Notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Notifier that only logs what would have been sent
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a new log notifier
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), crate::Error> {
        let message = crate::render::render_message(event);
        info!(
            waybill = %event.waybill,
            courier = %event.courier,
            delivered = event.delivered,
            "Notification: {}",
            message.subject
        );
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}
