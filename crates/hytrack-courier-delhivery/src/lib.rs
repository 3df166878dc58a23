// # Delhivery Courier Adapter
//
// This crate provides the Delhivery implementation of `CourierAdapter`.
//
// ## How It Works
//
// Delhivery's tracking page renders its timeline client-side, so a plain
// GET returns no status. The adapter drives a headless Chrome through a
// WebDriver endpoint (e.g. `chromedriver --port=9515`):
//
// 1. Open a session (headless, no sandbox)
// 2. Navigate to `https://www.delhivery.com/track-v2/package/<waybill>`
// 3. Wait for the timeline blocks to render (implicit wait)
// 4. Read the first block's `h3` (status) and `p` (description)
// 5. Close the session, whatever happened in between
//
// The page exposes no location or event timestamp; the status text is
// `"<h3>: <p>"`.
//
// ## Constraints
//
// - One browser session per fetch, always closed; a fetch cancelled mid-flight
//   (e.g. by the reconciler's timeout) closes its session from a spawned task
// - Each WebDriver command is bounded; the reconciler bounds the whole fetch
// - Every failure is a `FetchFailure`, never a panic

pub mod webdriver;

use async_trait::async_trait;
use hytrack_core::config::CouriersConfig;
use hytrack_core::traits::{CourierAdapter, StatusPayload};
use hytrack_core::{Courier, FetchFailure, Result};
use std::time::Duration;

use crate::webdriver::{Locator, Session, WebDriverClient};

/// Timeline entries on the tracking page, newest first
pub const TIMELINE_XPATH: &str =
    "//div[contains(@class,'pl-6') and contains(@class,'cursor-pointer')]";

/// Delhivery courier adapter
#[derive(Debug, Clone)]
pub struct DelhiveryAdapter {
    /// WebDriver client
    driver: WebDriverClient,

    /// How long to wait for the timeline to render
    page_wait: Duration,

    /// Tracking page base, overridable for tests
    page_base: Option<String>,
}

impl DelhiveryAdapter {
    /// Create a new Delhivery adapter
    pub fn new(config: &CouriersConfig) -> Result<Self> {
        let page_wait = Duration::from_secs(config.page_wait_secs);
        let command_timeout = page_wait + Duration::from_secs(config.http_timeout_secs);
        let driver = WebDriverClient::new(&config.webdriver_url, command_timeout)
            .map_err(|e| hytrack_core::Error::config(e.to_string()))?;

        Ok(Self {
            driver,
            page_wait,
            page_base: None,
        })
    }

    /// Load tracking pages from `base` instead of delhivery.com
    ///
    /// The waybill is appended to `base`.
    pub fn with_page_base(mut self, base: impl Into<String>) -> Self {
        self.page_base = Some(base.into());
        self
    }

    fn page_url(&self, waybill: &str) -> String {
        match &self.page_base {
            Some(base) => format!("{}{}", base, waybill),
            None => Courier::Delhivery.tracking_url(waybill),
        }
    }

    /// Load the page and read the newest timeline entry
    async fn read_latest_event(
        &self,
        session: &Session,
        url: &str,
    ) -> std::result::Result<String, FetchFailure> {
        self.driver.set_implicit_wait(session, self.page_wait).await?;
        self.driver.navigate(session, url).await?;

        let blocks = self
            .driver
            .find_elements(session, Locator::XPath(TIMELINE_XPATH))
            .await?;
        let latest = blocks
            .first()
            .ok_or_else(|| FetchFailure::unrecognized("tracking timeline did not render"))?;

        let heading = self
            .driver
            .find_child(session, latest, Locator::TagName("h3"))
            .await?;
        let description = self
            .driver
            .find_child(session, latest, Locator::TagName("p"))
            .await?;

        let status = self.driver.element_text(session, &heading).await?;
        let detail = self.driver.element_text(session, &description).await?;

        compose_status(&status, &detail)
    }
}

#[async_trait]
impl CourierAdapter for DelhiveryAdapter {
    async fn fetch(&self, waybill: &str) -> std::result::Result<StatusPayload, FetchFailure> {
        let url = self.page_url(waybill);
        tracing::debug!("Fetching Delhivery status for {}", waybill);

        let session = SessionGuard::new(self.driver.clone(), self.driver.new_session().await?);
        let result = self.read_latest_event(session.session(), &url).await;
        session.close().await;

        let status = result?;
        Ok(StatusPayload::new(
            Courier::Delhivery,
            status,
            Courier::Delhivery.tracking_url(waybill),
        ))
    }

    fn courier(&self) -> Courier {
        Courier::Delhivery
    }

    fn adapter_name(&self) -> &'static str {
        "delhivery-webdriver"
    }
}

/// Closes a browser session when dropped
///
/// `close` deletes the session inline. If the guard is dropped without it,
/// the fetch was cancelled and the delete runs on a spawned task instead.
struct SessionGuard {
    driver: WebDriverClient,
    session: Session,
    closed: bool,
}

impl SessionGuard {
    fn new(driver: WebDriverClient, session: Session) -> Self {
        Self {
            driver,
            session,
            closed: false,
        }
    }

    fn session(&self) -> &Session {
        &self.session
    }

    async fn close(mut self) {
        close_session(&self.driver, &self.session).await;
        self.closed = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("Fetch cancelled, closing WebDriver session {}", self.session.id());
                let driver = self.driver.clone();
                let session = self.session.clone();
                handle.spawn(async move { close_session(&driver, &session).await });
            }
            Err(_) => tracing::warn!(
                "No runtime to close WebDriver session {}; it will linger until the driver reaps it",
                self.session.id()
            ),
        }
    }
}

async fn close_session(driver: &WebDriverClient, session: &Session) {
    if let Err(e) = driver.delete_session(session).await {
        tracing::warn!("Failed to close WebDriver session {}: {}", session.id(), e);
    }
}

/// `"<status>: <description>"`, or just the status when there is no description
pub fn compose_status(status: &str, description: &str) -> std::result::Result<String, FetchFailure> {
    let status = status.trim();
    let description = description.trim();

    match (status.is_empty(), description.is_empty()) {
        (true, _) => Err(FetchFailure::unrecognized("timeline entry has no status heading")),
        (false, true) => Ok(status.to_string()),
        (false, false) => Ok(format!("{}: {}", status, description)),
    }
}
