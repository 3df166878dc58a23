//! Tracking reconciler
//!
//! The TrackingReconciler is responsible for:
//! - Registering discovered waybills (idempotently)
//! - Polling every active shipment through its courier's adapter
//! - Fingerprinting the fetched status and comparing it to the stored one
//! - Persisting genuine changes, then notifying
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ WaybillSource │─── DiscoveredWaybill ───┐
//! └───────────────┘                         │
//!                                           ▼
//!                                ┌────────────────────┐
//!                                │ TrackingReconciler │
//!                                └────────────────────┘
//!                                           │
//!         ┌──────────────────┬──────────────┴───┬──────────────────┐
//!         ▼                  ▼                  ▼                  ▼
//! ┌───────────────┐  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐
//! │ ShipmentStore │  │CourierAdapters│  │  Fingerprint  │  │   Notifier    │
//! │ (get/update)  │  │   (fetch)     │  │  (compare)    │  │ (best effort) │
//! └───────────────┘  └───────────────┘  └───────────────┘  └───────────────┘
//! ```
//!
//! ## Per-Record Flow
//!
//! 1. Fetch via the courier's adapter (bounded by `fetch_timeout`)
//! 2. Fetch failure → skip, nothing changes
//! 3. Fingerprint equal to stored → nothing changes
//! 4. Otherwise compare-and-update the store (hash, summary, delivered together)
//! 5. Only if the store applied the update → notify
//!
//! Records are processed one at a time, to completion, so persist-before-notify
//! holds without extra locking. The store's compare-and-update keeps the
//! at-most-one-notification guarantee even if two reconcilers share a store.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ReconcilerConfig;
use crate::courier::Courier;
use crate::error::{FetchFailure, Result};
use crate::fingerprint::Fingerprint;
use crate::registry::CourierAdapters;
use crate::traits::{
    ChangeEvent, DiscoveredWaybill, Notifier, RecordUpdate, ShipmentRecord, ShipmentStore,
    StatusPayload, UpdateOutcome, WaybillSource,
};

/// Events emitted by the TrackingReconciler for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerEvent {
    /// A new waybill was registered
    ShipmentDiscovered { waybill: String, courier: Courier },

    /// A discovered waybill was rejected (bad format)
    DiscoveryRejected { waybill: String, reason: String },

    /// A reconciliation cycle started
    CycleStarted { active_count: usize },

    /// Fetched status matches the stored fingerprint
    StatusUnchanged { waybill: String },

    /// A status change was persisted
    StatusChanged {
        waybill: String,
        fingerprint: Fingerprint,
        delivered: bool,
    },

    /// The adapter produced no usable status
    FetchFailed { waybill: String, error: String },

    /// The change could not be persisted (no notification sent)
    PersistFailed { waybill: String, error: String },

    /// Another writer already recorded this transition
    UpdateRejected { waybill: String, reason: String },

    /// The notifier failed (state stays committed)
    NotifyFailed { waybill: String, error: String },

    /// A reconciliation cycle finished
    CycleCompleted { report: CycleReport },
}

/// Result of registering discovered waybills
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Waybills seen for the first time
    pub created: usize,
    /// Waybills that already had a record
    pub existing: usize,
    /// Waybills that failed format validation
    pub rejected: usize,
    /// Waybills that could not be registered because the store failed
    pub failed: usize,
}

/// Counters for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Active records polled
    pub polled: usize,
    /// Records whose status had not changed
    pub unchanged: usize,
    /// Records whose change was persisted
    pub changed: usize,
    /// Of `changed`, records that reached terminal delivery
    pub delivered: usize,
    /// Records skipped because the fetch failed
    pub fetch_failures: usize,
    /// Records whose change could not be persisted
    pub persist_failures: usize,
    /// Records whose update was rejected by the store
    pub stale: usize,
    /// Persisted changes whose notification failed
    pub notify_failures: usize,
    /// Notifications delivered
    pub notified: usize,
}

/// What happened to one record in a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Fetched status matches the stored fingerprint
    Unchanged,
    /// Change persisted and notified
    Changed { delivered: bool },
    /// Change persisted, notification failed
    ChangedNotifyFailed { delivered: bool },
    /// Fetch failed; nothing changed
    FetchFailed(FetchFailure),
    /// Persisting failed; nothing changed, nothing notified
    PersistFailed(String),
    /// The store rejected the update; nothing notified
    Rejected,
}

impl CycleReport {
    fn record(&mut self, outcome: &RecordOutcome) {
        self.polled += 1;
        match outcome {
            RecordOutcome::Unchanged => self.unchanged += 1,
            RecordOutcome::Changed { delivered } => {
                self.changed += 1;
                self.notified += 1;
                if *delivered {
                    self.delivered += 1;
                }
            }
            RecordOutcome::ChangedNotifyFailed { delivered } => {
                self.changed += 1;
                self.notify_failures += 1;
                if *delivered {
                    self.delivered += 1;
                }
            }
            RecordOutcome::FetchFailed(_) => self.fetch_failures += 1,
            RecordOutcome::PersistFailed(_) => self.persist_failures += 1,
            RecordOutcome::Rejected => self.stale += 1,
        }
    }
}

/// Tracking reconciler
///
/// Owns an explicit store handle, the courier adapter set and a notifier.
/// A run is a single batch pass; invoke it periodically (e.g. from cron).
///
/// ## Lifecycle
///
/// 1. Create with [`TrackingReconciler::new()`]
/// 2. Call [`TrackingReconciler::run_once()`] (or `discover` + `run_cycle`)
/// 3. Drop
pub struct TrackingReconciler {
    /// Adapter per courier
    adapters: CourierAdapters,

    /// Durable tracking state
    store: Box<dyn ShipmentStore>,

    /// Change event sink
    notifier: Box<dyn Notifier>,

    /// Upper bound on a single fetch
    fetch_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcilerEvent>,
}

impl TrackingReconciler {
    /// Create a new reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// monitoring events
    pub fn new(
        adapters: CourierAdapters,
        store: Box<dyn ShipmentStore>,
        notifier: Box<dyn Notifier>,
        config: ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcilerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let reconciler = Self {
            adapters,
            store,
            notifier,
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// Discover, reconcile every active shipment, and flush the store
    ///
    /// A discovery failure is logged and the cycle still runs over the
    /// shipments already known. A failed final flush is only logged.
    pub async fn run_once(&self, source: &dyn WaybillSource) -> Result<CycleReport> {
        match source.discover().await {
            Ok(found) => {
                let report = self.discover(found).await;
                info!(
                    "Discovery via {}: {} new, {} known, {} rejected, {} failed",
                    source.source_name(),
                    report.created,
                    report.existing,
                    report.rejected,
                    report.failed
                );
            }
            Err(e) => {
                warn!("Discovery via {} failed: {}", source.source_name(), e);
            }
        }

        let report = self.run_cycle().await?;

        // Every applied update was already written through
        if let Err(e) = self.store.flush().await {
            warn!("Final store flush failed: {}", e);
        }

        Ok(report)
    }

    /// Register discovered waybills
    ///
    /// Idempotent: a waybill that already has a record is left untouched.
    pub async fn discover(
        &self,
        waybills: impl IntoIterator<Item = DiscoveredWaybill>,
    ) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for found in waybills {
            if let Err(e) = found.courier.validate_waybill(&found.waybill) {
                warn!("Rejecting discovered waybill {}: {}", found.waybill, e);
                self.emit_event(ReconcilerEvent::DiscoveryRejected {
                    waybill: found.waybill.clone(),
                    reason: e.to_string(),
                });
                report.rejected += 1;
                continue;
            }

            let existed = match self.store.get(&found.waybill).await {
                Ok(existing) => existing.is_some(),
                Err(e) => {
                    error!("Failed to look up waybill {}: {}", found.waybill, e);
                    report.failed += 1;
                    continue;
                }
            };

            match self.store.get_or_create(&found.waybill, found.courier).await {
                Ok(record) if existed => {
                    if record.courier != found.courier {
                        debug!(
                            "Waybill {} already tracked as {}, ignoring {}",
                            record.waybill, record.courier, found.courier
                        );
                    }
                    report.existing += 1;
                }
                Ok(record) => {
                    info!("Added new {} shipment: {}", record.courier, record.waybill);
                    self.emit_event(ReconcilerEvent::ShipmentDiscovered {
                        waybill: record.waybill,
                        courier: record.courier,
                    });
                    report.created += 1;
                }
                Err(e) => {
                    error!("Failed to register waybill {}: {}", found.waybill, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Run one reconciliation cycle over all active shipments
    ///
    /// Per-record failures are counted in the report and never abort the
    /// cycle. Only failing to list the active records is an error.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let active = self.store.list_active().await?;
        info!("Reconciliation cycle started: {} active shipment(s)", active.len());
        self.emit_event(ReconcilerEvent::CycleStarted {
            active_count: active.len(),
        });

        let mut report = CycleReport::default();
        for record in &active {
            let outcome = self.reconcile_record(record).await;
            report.record(&outcome);
        }

        info!(
            "Reconciliation cycle completed: {} polled, {} changed ({} delivered), {} unchanged, \
             {} fetch failure(s), {} persist failure(s), {} notify failure(s)",
            report.polled,
            report.changed,
            report.delivered,
            report.unchanged,
            report.fetch_failures,
            report.persist_failures,
            report.notify_failures
        );
        self.emit_event(ReconcilerEvent::CycleCompleted { report });

        Ok(report)
    }

    /// Reconcile one shipment: fetch, compare, persist, notify
    pub async fn reconcile_record(&self, record: &ShipmentRecord) -> RecordOutcome {
        let waybill = record.waybill.as_str();

        let payload = match self.fetch(record).await {
            Ok(payload) => payload,
            Err(failure) => {
                warn!("Fetch failed for {} ({}): {}", waybill, record.courier, failure);
                self.emit_event(ReconcilerEvent::FetchFailed {
                    waybill: waybill.to_string(),
                    error: failure.to_string(),
                });
                return RecordOutcome::FetchFailed(failure);
            }
        };

        let fingerprint = Fingerprint::of(&payload);
        if record.last_event_hash.as_ref() == Some(&fingerprint) {
            debug!("No change for {}", waybill);
            self.emit_event(ReconcilerEvent::StatusUnchanged {
                waybill: waybill.to_string(),
            });
            return RecordOutcome::Unchanged;
        }

        let delivered = payload.is_delivered();
        let update = RecordUpdate::new(
            record.last_event_hash.clone(),
            fingerprint.clone(),
            payload.summary(),
            delivered,
        );

        match self.store.update(waybill, &update).await {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::Stale { .. }) => {
                debug!("Update for {} is stale, another writer recorded it first", waybill);
                self.emit_event(ReconcilerEvent::UpdateRejected {
                    waybill: waybill.to_string(),
                    reason: "stale".to_string(),
                });
                return RecordOutcome::Rejected;
            }
            Ok(UpdateOutcome::AlreadyDelivered) => {
                debug!("Shipment {} is already delivered", waybill);
                self.emit_event(ReconcilerEvent::UpdateRejected {
                    waybill: waybill.to_string(),
                    reason: "already delivered".to_string(),
                });
                return RecordOutcome::Rejected;
            }
            Err(e) => {
                error!("Failed to persist update for {}, not notifying: {}", waybill, e);
                self.emit_event(ReconcilerEvent::PersistFailed {
                    waybill: waybill.to_string(),
                    error: e.to_string(),
                });
                return RecordOutcome::PersistFailed(e.to_string());
            }
        }

        info!(
            "Update detected for {}: {}{}",
            waybill,
            payload.status,
            if delivered { " (delivered)" } else { "" }
        );
        self.emit_event(ReconcilerEvent::StatusChanged {
            waybill: waybill.to_string(),
            fingerprint,
            delivered,
        });

        let event = ChangeEvent {
            waybill: waybill.to_string(),
            courier: record.courier,
            previous_status: record.last_status.clone(),
            payload,
            delivered,
        };

        match self.notifier.notify(&event).await {
            Ok(()) => {
                debug!("Notification sent for {} via {}", waybill, self.notifier.notifier_name());
                RecordOutcome::Changed { delivered }
            }
            Err(e) => {
                warn!(
                    "Notification via {} failed for {} (state kept): {}",
                    self.notifier.notifier_name(),
                    waybill,
                    e
                );
                self.emit_event(ReconcilerEvent::NotifyFailed {
                    waybill: waybill.to_string(),
                    error: e.to_string(),
                });
                RecordOutcome::ChangedNotifyFailed { delivered }
            }
        }
    }

    /// Fetch through the courier's adapter, bounded by the fetch timeout
    async fn fetch(&self, record: &ShipmentRecord) -> std::result::Result<StatusPayload, FetchFailure> {
        let adapter = self.adapters.for_courier(record.courier);

        let payload = tokio::time::timeout(self.fetch_timeout, adapter.fetch(&record.waybill))
            .await
            .map_err(|_| FetchFailure::Timeout(self.fetch_timeout))??;

        if payload.status.trim().is_empty() {
            return Err(FetchFailure::unrecognized("empty status text"));
        }
        if payload.courier != record.courier {
            return Err(FetchFailure::unrecognized(format!(
                "adapter '{}' returned a {} status for a {} shipment",
                adapter.adapter_name(),
                payload.courier,
                record.courier
            )));
        }

        Ok(payload)
    }

    /// Emit a monitoring event
    fn emit_event(&self, event: ReconcilerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_counts() {
        let mut report = CycleReport::default();
        report.record(&RecordOutcome::Unchanged);
        report.record(&RecordOutcome::Changed { delivered: true });
        report.record(&RecordOutcome::ChangedNotifyFailed { delivered: false });
        report.record(&RecordOutcome::FetchFailed(FetchFailure::HttpStatus(500)));
        report.record(&RecordOutcome::PersistFailed("disk full".to_string()));
        report.record(&RecordOutcome::Rejected);

        assert_eq!(report.polled, 6);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.changed, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(report.notify_failures, 1);
        assert_eq!(report.fetch_failures, 1);
        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.stale, 1);
    }
}
