// # Blue Dart Courier Adapter
//
// This crate provides the Blue Dart implementation of `CourierAdapter`.
//
// ## How It Works
//
// Blue Dart serves a public, server-rendered tracking page:
//
// ```http
// GET /trackdartresultthirdparty?trackFor=0&trackNo=<waybill>
// User-Agent: Mozilla/5.0
// ```
//
// The scan history is a table inside `div#SCAN<waybill>`. The first body row
// is the latest event, with columns: location, details, date, time.
//
// ## Constraints
//
// - One GET per fetch, no retries (the next reconciliation cycle retries)
// - Bounded by the configured HTTP timeout
// - Every failure (transport, status code, missing table) is a `FetchFailure`;
//   malformed pages never panic

use async_trait::async_trait;
use hytrack_core::config::CouriersConfig;
use hytrack_core::traits::{CourierAdapter, StatusPayload};
use hytrack_core::{Courier, Error, FetchFailure, Result};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

/// Blue Dart courier adapter
#[derive(Debug, Clone)]
pub struct BlueDartAdapter {
    /// HTTP client (timeout and user agent preset)
    client: reqwest::Client,

    /// Request timeout, reported on expiry
    timeout: Duration,

    /// Tracking page base, overridable for tests
    page_base: Option<String>,
}

impl BlueDartAdapter {
    /// Create a new Blue Dart adapter
    pub fn new(config: &CouriersConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            page_base: None,
        })
    }

    /// Load tracking pages from `base` instead of bluedart.com
    ///
    /// The waybill is appended to `base`. Payloads still link to the public
    /// tracking page.
    pub fn with_page_base(mut self, base: impl Into<String>) -> Self {
        self.page_base = Some(base.into());
        self
    }

    fn page_url(&self, waybill: &str) -> String {
        match &self.page_base {
            Some(base) => format!("{}{}", base, waybill),
            None => Courier::BlueDart.tracking_url(waybill),
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> FetchFailure {
        if e.is_timeout() {
            FetchFailure::Timeout(self.timeout)
        } else {
            FetchFailure::network(e.to_string())
        }
    }
}

#[async_trait]
impl CourierAdapter for BlueDartAdapter {
    async fn fetch(&self, waybill: &str) -> std::result::Result<StatusPayload, FetchFailure> {
        let url = self.page_url(waybill);
        tracing::debug!("Fetching Blue Dart status for {}", waybill);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(FetchFailure::HttpStatus(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let scan = parse_tracking_page(&html, waybill)?;
        Ok(StatusPayload::new(
            Courier::BlueDart,
            scan.details,
            Courier::BlueDart.tracking_url(waybill),
        )
            .with_location(scan.location)
            .with_event_time(scan.date, scan.time))
    }

    fn courier(&self) -> Courier {
        Courier::BlueDart
    }

    fn adapter_name(&self) -> &'static str {
        "bluedart"
    }
}

/// The latest scan row of a Blue Dart tracking page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRow {
    pub location: String,
    pub details: String,
    pub date: String,
    pub time: String,
}

/// Extract the latest scan for `waybill` from a tracking page
pub fn parse_tracking_page(
    html: &str,
    waybill: &str,
) -> std::result::Result<ScanRow, FetchFailure> {
    if waybill.is_empty() || !waybill.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FetchFailure::unrecognized(format!(
            "not a Blue Dart waybill: '{}'",
            waybill
        )));
    }

    let container_sel = selector(&format!("div#SCAN{}", waybill))?;
    let row_sel = selector("table tbody tr")?;
    let cell_sel = selector("td")?;

    let document = Html::parse_document(html);

    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| FetchFailure::unrecognized(format!("no scan history for {}", waybill)))?;

    let row = container
        .select(&row_sel)
        .next()
        .ok_or_else(|| FetchFailure::unrecognized("scan table has no rows"))?;

    let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
    let [location, details, date, time, ..] = cells.as_slice() else {
        return Err(FetchFailure::unrecognized(format!(
            "expected 4 scan columns, found {}",
            cells.len()
        )));
    };

    if details.is_empty() {
        return Err(FetchFailure::unrecognized("latest scan has no details"));
    }

    Ok(ScanRow {
        location: location.clone(),
        details: details.clone(),
        date: date.clone(),
        time: time.clone(),
    })
}

fn selector(s: &str) -> std::result::Result<Selector, FetchFailure> {
    Selector::parse(s).map_err(|e| FetchFailure::unrecognized(format!("bad selector '{}': {:?}", s, e)))
}

/// Text content of a cell with whitespace runs collapsed
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
