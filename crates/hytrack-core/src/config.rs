//! Configuration types for hytrack
//!
//! This module defines all configuration structures used throughout the
//! workspace. The binary fills them from environment variables; library users
//! can build or deserialize them directly.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main hytrack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HytrackConfig {
    /// Shipment store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Waybill discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Courier adapter settings
    #[serde(default)]
    pub couriers: CouriersConfig,

    /// Notifier configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

impl HytrackConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.discovery.validate()?;
        self.couriers.validate()?;
        self.notifier.validate()?;
        self.reconciler.validate()?;
        Ok(())
    }
}

/// Shipment store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// JSON file store
    File {
        /// Path to the state file
        path: PathBuf,
    },

    /// In-memory store (not persistent)
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.as_os_str().is_empty() => {
                Err(crate::Error::config("State store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: PathBuf::from("hytrack_shipments.json"),
        }
    }
}

/// Waybill discovery configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryConfig {
    /// Scan a directory of exported messages
    Directory {
        /// Directory holding `.eml` / `.txt` files
        path: PathBuf,
    },

    /// No discovery; only already-known waybills are polled
    #[default]
    Disabled,
}

impl DiscoveryConfig {
    /// Validate the discovery configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DiscoveryConfig::Directory { path } if path.as_os_str().is_empty() => {
                Err(crate::Error::config("Discovery directory cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Courier adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouriersConfig {
    /// User agent sent with HTTP fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single Blue Dart HTTP request (seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// WebDriver endpoint used for Delhivery (e.g. a local chromedriver)
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// How long to wait for the Delhivery timeline to render (seconds)
    #[serde(default = "default_page_wait_secs")]
    pub page_wait_secs: u64,
}

impl CouriersConfig {
    /// Validate the courier settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        if self.page_wait_secs == 0 {
            return Err(crate::Error::config("Page wait timeout must be > 0"));
        }
        if !self.webdriver_url.starts_with("http://") && !self.webdriver_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "WebDriver URL must use HTTP or HTTPS scheme. Got: {}",
                self.webdriver_url
            )));
        }
        Ok(())
    }
}

impl Default for CouriersConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            http_timeout_secs: default_http_timeout_secs(),
            webdriver_url: default_webdriver_url(),
            page_wait_secs: default_page_wait_secs(),
        }
    }
}

/// Notifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Email over SMTP with STARTTLS
    Smtp(SmtpConfig),

    /// Log the notification subject only
    #[default]
    Log,
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Smtp(smtp) => smtp.validate(),
            NotifierConfig::Log => Ok(()),
        }
    }
}

/// SMTP relay settings
///
/// The Debug implementation does not expose the password.
#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay host
    pub server: String,
    /// Relay port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Sender address
    pub from: String,
    /// Recipient address
    pub recipient: String,
}

impl SmtpConfig {
    /// Validate the SMTP settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.server.is_empty() {
            return Err(crate::Error::config("SMTP server cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("SMTP port must be > 0"));
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(crate::Error::config("SMTP credentials cannot be empty"));
        }
        for (name, address) in [("sender", &self.from), ("recipient", &self.recipient)] {
            if !address.contains('@') {
                return Err(crate::Error::config(format!(
                    "SMTP {} address is not an email address: '{}'",
                    name, address
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Upper bound on a single adapter fetch (seconds)
    ///
    /// Adapters apply their own timeouts; this bound catches adapters that
    /// don't. Expiry counts as a fetch failure.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Capacity of the monitoring event channel
    ///
    /// When full, events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.fetch_timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_page_wait_secs() -> u64 {
    20
}

fn default_smtp_port() -> u16 {
    587
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
