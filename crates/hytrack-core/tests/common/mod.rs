//! Test doubles and common utilities for reconciler contract tests
//!
//! These doubles script courier responses, count notifications and inject
//! store failures. Counters live behind `Arc`s so a test can keep a handle
//! while the reconciler owns a boxed copy.

#![allow(dead_code)]

use async_trait::async_trait;
use hytrack_core::config::ReconcilerConfig;
use hytrack_core::error::{Error, FetchFailure, Result};
use hytrack_core::reconciler::ReconcilerEvent;
use hytrack_core::traits::{
    ChangeEvent, CourierAdapter, DiscoveredWaybill, Notifier, RecordUpdate, ShipmentRecord,
    ShipmentStore, StatusPayload, UpdateOutcome, WaybillSource,
};
use hytrack_core::{Courier, CourierAdapters, MemoryShipmentStore, TrackingReconciler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What a [`ScriptedAdapter`] answers for one waybill
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Report this status text
    Status(String),
    /// Fail the fetch
    Fail(FetchFailure),
    /// Never complete
    Hang,
}

/// A courier adapter whose answers are set by the test
pub struct ScriptedAdapter {
    courier: Courier,
    responses: Arc<Mutex<HashMap<String, Scripted>>>,
    fetch_counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl ScriptedAdapter {
    pub fn new(courier: Courier) -> Self {
        Self {
            courier,
            responses: Arc::new(Mutex::new(HashMap::new())),
            fetch_counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create an adapter that shares script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            courier: other.courier,
            responses: Arc::clone(&other.responses),
            fetch_counts: Arc::clone(&other.fetch_counts),
        }
    }

    /// Answer `status` for `waybill` from now on
    pub fn set_status(&self, waybill: &str, status: &str) {
        self.set(waybill, Scripted::Status(status.to_string()));
    }

    /// Fail fetches for `waybill` from now on
    pub fn set_failure(&self, waybill: &str, failure: FetchFailure) {
        self.set(waybill, Scripted::Fail(failure));
    }

    /// Never answer for `waybill` from now on
    pub fn set_hang(&self, waybill: &str) {
        self.set(waybill, Scripted::Hang);
    }

    fn set(&self, waybill: &str, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert(waybill.to_string(), response);
    }

    /// Number of fetches made for `waybill`
    pub fn fetch_count(&self, waybill: &str) -> usize {
        self.fetch_counts
            .lock()
            .unwrap()
            .get(waybill)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CourierAdapter for ScriptedAdapter {
    async fn fetch(&self, waybill: &str) -> std::result::Result<StatusPayload, FetchFailure> {
        *self
            .fetch_counts
            .lock()
            .unwrap()
            .entry(waybill.to_string())
            .or_insert(0) += 1;

        let response = self.responses.lock().unwrap().get(waybill).cloned();
        match response {
            Some(Scripted::Status(status)) => Ok(StatusPayload::new(
                self.courier,
                status,
                self.courier.tracking_url(waybill),
            )),
            Some(Scripted::Fail(failure)) => Err(failure),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(FetchFailure::unrecognized("no scripted response")),
        }
    }

    fn courier(&self) -> Courier {
        self.courier
    }

    fn adapter_name(&self) -> &'static str {
        "scripted"
    }
}

/// A notifier that records every event it is handed
pub struct CountingNotifier {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a notifier that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            events: Arc::clone(&other.events),
            attempts: Arc::clone(&other.attempts),
            failing: Arc::clone(&other.failing),
        }
    }

    /// Make subsequent notifications fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events delivered successfully
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events delivered for one waybill
    pub fn events_for(&self, waybill: &str) -> Vec<ChangeEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.waybill == waybill)
            .collect()
    }

    /// Every call to notify(), successful or not
    pub fn attempt_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::notify("relay unavailable"));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "counting"
    }
}

/// A memory store whose updates and flushes can be made to fail
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryShipmentStore,
    fail_updates: Arc<AtomicBool>,
    fail_flush: Arc<AtomicBool>,
    update_calls: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryShipmentStore::new(),
            fail_updates: Arc::new(AtomicBool::new(false)),
            fail_flush: Arc::new(AtomicBool::new(false)),
            update_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make subsequent updates fail (or succeed again)
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent flushes fail (or succeed again)
    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Number of update() calls, including failed ones
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShipmentStore for FlakyStore {
    async fn get_or_create(&self, waybill: &str, courier: Courier) -> Result<ShipmentRecord> {
        self.inner.get_or_create(waybill, courier).await
    }

    async fn get(&self, waybill: &str) -> Result<Option<ShipmentRecord>> {
        self.inner.get(waybill).await
    }

    async fn list_active(&self) -> Result<Vec<ShipmentRecord>> {
        self.inner.list_active().await
    }

    async fn list_all(&self) -> Result<Vec<ShipmentRecord>> {
        self.inner.list_all().await
    }

    async fn update(&self, waybill: &str, update: &RecordUpdate) -> Result<UpdateOutcome> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::store("disk full"));
        }
        self.inner.update(waybill, update).await
    }

    async fn flush(&self) -> Result<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(Error::store("disk full"));
        }
        self.inner.flush().await
    }
}

/// A waybill source with a fixed answer
pub struct FixedSource {
    result: std::result::Result<Vec<DiscoveredWaybill>, String>,
}

impl FixedSource {
    pub fn found(waybills: Vec<DiscoveredWaybill>) -> Self {
        Self { result: Ok(waybills) }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
        }
    }
}

#[async_trait]
impl WaybillSource for FixedSource {
    async fn discover(&self) -> Result<Vec<DiscoveredWaybill>> {
        self.result.clone().map_err(Error::discovery)
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// Handles a test keeps after handing boxed doubles to a reconciler
pub struct Harness {
    pub bluedart: ScriptedAdapter,
    pub delhivery: ScriptedAdapter,
    pub notifier: CountingNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            bluedart: ScriptedAdapter::new(Courier::BlueDart),
            delhivery: ScriptedAdapter::new(Courier::Delhivery),
            notifier: CountingNotifier::new(),
        }
    }

    /// Build a reconciler over `store` wired to this harness's doubles
    pub fn reconciler(
        &self,
        store: Box<dyn ShipmentStore>,
    ) -> (TrackingReconciler, mpsc::Receiver<ReconcilerEvent>) {
        let adapters = CourierAdapters::new(
            Box::new(ScriptedAdapter::sharing_counters_with(&self.bluedart)),
            Box::new(ScriptedAdapter::sharing_counters_with(&self.delhivery)),
        )
        .expect("adapters match their slots");

        TrackingReconciler::new(
            adapters,
            store,
            Box::new(CountingNotifier::sharing_counters_with(&self.notifier)),
            fast_config(),
        )
        .expect("reconciler construction succeeds")
    }
}

/// Reconciler config with a short fetch timeout
pub fn fast_config() -> ReconcilerConfig {
    ReconcilerConfig {
        fetch_timeout_secs: 1,
        ..ReconcilerConfig::default()
    }
}

/// Drain every event currently buffered in the channel
pub fn drain_events(rx: &mut mpsc::Receiver<ReconcilerEvent>) -> Vec<ReconcilerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
