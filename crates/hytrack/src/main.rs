// # hytrack - Shipment Tracker
//
// This binary is a thin integration layer. All tracking logic lives in
// hytrack-core; this crate only:
// 1. Reads configuration from environment variables
// 2. Builds the store, courier adapters, notifier and waybill source
// 3. Runs one reconciliation pass and exits
//
// Run it periodically (cron, systemd timer). Each run discovers new waybills,
// polls every active shipment once, and emails on genuine status changes.
//
// ## Configuration
//
// ### State Store
// - `HYTRACK_STATE_STORE_TYPE`: `file` (default) or `memory`
// - `HYTRACK_STATE_STORE_PATH`: state file (default `hytrack_shipments.json`)
//
// ### Discovery
// - `HYTRACK_INBOX_DIR`: directory of exported `.eml`/`.txt` messages to scan
//   (discovery is skipped when unset)
//
// ### Couriers
// - `HYTRACK_WEBDRIVER_URL`: WebDriver endpoint for Delhivery (default `http://localhost:9515`)
// - `HYTRACK_HTTP_TIMEOUT_SECS`: Blue Dart request timeout (default 15)
// - `HYTRACK_PAGE_WAIT_SECS`: Delhivery render wait (default 20)
// - `HYTRACK_FETCH_TIMEOUT_SECS`: upper bound on any single fetch (default 60)
//
// ### Notifier
// - `HYTRACK_NOTIFIER_TYPE`: `smtp` (default) or `log`
// - `HYTRACK_SMTP_SERVER`, `HYTRACK_SMTP_PORT` (default 587)
// - `HYTRACK_SMTP_USERNAME`, `HYTRACK_SMTP_PASSWORD`
// - `HYTRACK_SMTP_FROM` (defaults to the username), `HYTRACK_RECIPIENT_EMAIL`
//
// ### Logging
// - `HYTRACK_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export HYTRACK_INBOX_DIR=/var/spool/hytrack/inbox
// export HYTRACK_STATE_STORE_PATH=/var/lib/hytrack/shipments.json
// export HYTRACK_SMTP_SERVER=smtp.gmail.com
// export HYTRACK_SMTP_USERNAME=me@gmail.com
// export HYTRACK_SMTP_PASSWORD=app_password
// export HYTRACK_RECIPIENT_EMAIL=me@gmail.com
//
// hytrack
// ```

use anyhow::Result;
use hytrack_core::config::{
    CouriersConfig, DiscoveryConfig, HytrackConfig, NotifierConfig, ReconcilerConfig, SmtpConfig,
    StoreConfig,
};
use hytrack_core::discovery::{DirectoryWaybillSource, NoDiscovery};
use hytrack_core::reconciler::ReconcilerEvent;
use hytrack_core::traits::{LogNotifier, Notifier, WaybillSource};
use hytrack_core::{CourierAdapters, TrackingReconciler};
use hytrack_courier_bluedart::BlueDartAdapter;
use hytrack_courier_delhivery::DelhiveryAdapter;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Run completed (per-shipment failures are logged, not fatal)
/// - 1: Configuration or startup error
/// - 2: Runtime error (store unusable)
#[derive(Debug, Clone, Copy)]
enum HytrackExitCode {
    /// Run completed
    Completed = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<HytrackExitCode> for ExitCode {
    fn from(code: HytrackExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration, as read from the environment
#[derive(Debug)]
struct Config {
    state_store_type: String,
    state_store_path: String,
    inbox_dir: Option<String>,
    webdriver_url: String,
    http_timeout_secs: u64,
    page_wait_secs: u64,
    fetch_timeout_secs: u64,
    notifier_type: String,
    smtp: Option<SmtpConfig>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` (environment in production)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds. Got: '{}'", key, raw)),
                None => Ok(default),
            }
        };

        let notifier_type = var("HYTRACK_NOTIFIER_TYPE").unwrap_or_else(|| "smtp".to_string());

        let smtp = if notifier_type == "smtp" {
            let required = |key: &str| {
                var(key).ok_or_else(|| {
                    anyhow::anyhow!(
                        "{} is required when HYTRACK_NOTIFIER_TYPE=smtp. \
                        Set it via: export {}=...",
                        key,
                        key
                    )
                })
            };
            let username = required("HYTRACK_SMTP_USERNAME")?;
            let port = match var("HYTRACK_SMTP_PORT") {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("HYTRACK_SMTP_PORT must be a port number. Got: '{}'", raw))?,
                None => 587,
            };
            Some(SmtpConfig {
                server: required("HYTRACK_SMTP_SERVER")?,
                port,
                password: required("HYTRACK_SMTP_PASSWORD")?,
                from: var("HYTRACK_SMTP_FROM").unwrap_or_else(|| username.clone()),
                recipient: required("HYTRACK_RECIPIENT_EMAIL")?,
                username,
            })
        } else {
            None
        };

        Ok(Self {
            state_store_type: var("HYTRACK_STATE_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            state_store_path: var("HYTRACK_STATE_STORE_PATH")
                .unwrap_or_else(|| "hytrack_shipments.json".to_string()),
            inbox_dir: var("HYTRACK_INBOX_DIR"),
            webdriver_url: var("HYTRACK_WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:9515".to_string()),
            http_timeout_secs: number("HYTRACK_HTTP_TIMEOUT_SECS", 15)?,
            page_wait_secs: number("HYTRACK_PAGE_WAIT_SECS", 20)?,
            fetch_timeout_secs: number("HYTRACK_FETCH_TIMEOUT_SECS", 60)?,
            notifier_type,
            smtp,
            log_level: var("HYTRACK_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "HYTRACK_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file" {
            if let Some(parent) = std::path::Path::new(&self.state_store_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    anyhow::bail!(
                        "HYTRACK_STATE_STORE_PATH parent directory does not exist: {}. \
                        Create it first: mkdir -p {}",
                        parent.display(),
                        parent.display()
                    );
                }
            }
        }

        match self.notifier_type.as_str() {
            "smtp" if cfg!(feature = "smtp") => {}
            "smtp" => anyhow::bail!("HYTRACK_NOTIFIER_TYPE=smtp requires the 'smtp' feature"),
            "log" => {}
            _ => anyhow::bail!(
                "HYTRACK_NOTIFIER_TYPE '{}' is not supported. \
                Supported types: smtp, log",
                self.notifier_type
            ),
        }

        if !(1..=600).contains(&self.fetch_timeout_secs) {
            anyhow::bail!(
                "HYTRACK_FETCH_TIMEOUT_SECS must be between 1 and 600 seconds. Got: {}",
                self.fetch_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HYTRACK_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.to_core().validate()?;
        Ok(())
    }

    /// The library configuration this environment describes
    fn to_core(&self) -> HytrackConfig {
        HytrackConfig {
            store: match self.state_store_type.as_str() {
                "memory" => StoreConfig::Memory,
                _ => StoreConfig::File {
                    path: PathBuf::from(&self.state_store_path),
                },
            },
            discovery: match &self.inbox_dir {
                Some(dir) => DiscoveryConfig::Directory {
                    path: PathBuf::from(dir),
                },
                None => DiscoveryConfig::Disabled,
            },
            couriers: CouriersConfig {
                webdriver_url: self.webdriver_url.clone(),
                http_timeout_secs: self.http_timeout_secs,
                page_wait_secs: self.page_wait_secs,
                ..CouriersConfig::default()
            },
            notifier: match &self.smtp {
                Some(smtp) => NotifierConfig::Smtp(smtp.clone()),
                None => NotifierConfig::Log,
            },
            reconciler: ReconcilerConfig {
                fetch_timeout_secs: self.fetch_timeout_secs,
                ..ReconcilerConfig::default()
            },
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return HytrackExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return HytrackExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HytrackExitCode::ConfigError.into();
    }

    info!("Starting hytrack run");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HytrackExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config.to_core())).into()
}

/// Build every component and run one pass
async fn run(config: HytrackConfig) -> HytrackExitCode {
    let (reconciler, source) = match build(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {}", e);
            return HytrackExitCode::ConfigError;
        }
    };
    let (reconciler, mut events) = reconciler;

    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let outcome = reconciler.run_once(&*source).await;

    // Closing the sender ends the event log task
    drop(reconciler);
    if let Err(e) = event_log.await {
        warn!("Event log task failed: {}", e);
    }

    match outcome {
        Ok(report) => {
            info!(
                "Run finished: {} polled, {} changed, {} delivered, {} failed",
                report.polled,
                report.changed,
                report.delivered,
                report.fetch_failures + report.persist_failures
            );
            HytrackExitCode::Completed
        }
        Err(e) => {
            error!("Run failed: {}", e);
            HytrackExitCode::RuntimeError
        }
    }
}

type Reconciler = (
    TrackingReconciler,
    tokio::sync::mpsc::Receiver<ReconcilerEvent>,
);

async fn build(config: &HytrackConfig) -> Result<(Reconciler, Box<dyn WaybillSource>)> {
    let store = hytrack_core::state::open_store(&config.store).await?;

    let adapters = CourierAdapters::new(
        Box::new(BlueDartAdapter::new(&config.couriers)?),
        Box::new(DelhiveryAdapter::new(&config.couriers)?),
    )?;
    debug!("Courier adapters: {:?}", adapters);

    let notifier: Box<dyn Notifier> = match &config.notifier {
        #[cfg(feature = "smtp")]
        NotifierConfig::Smtp(smtp) => Box::new(hytrack_notify_smtp::SmtpNotifier::new(smtp)?),
        #[cfg(not(feature = "smtp"))]
        NotifierConfig::Smtp(_) => anyhow::bail!("SMTP notifier not compiled in"),
        NotifierConfig::Log => {
            warn!("Using log notifier: no emails will be sent");
            Box::new(LogNotifier::new())
        }
    };

    let source: Box<dyn WaybillSource> = match &config.discovery {
        DiscoveryConfig::Directory { path } => {
            let source = DirectoryWaybillSource::new(path)?;
            info!("Scanning {} for new waybills", source.dir().display());
            Box::new(source)
        }
        DiscoveryConfig::Disabled => {
            info!("HYTRACK_INBOX_DIR not set, skipping discovery");
            Box::new(NoDiscovery)
        }
    };

    let reconciler = TrackingReconciler::new(adapters, store, notifier, config.reconciler.clone())?;
    Ok((reconciler, source))
}

/// Mirror monitoring events into the debug log
fn log_event(event: &ReconcilerEvent) {
    match event {
        ReconcilerEvent::CycleCompleted { report } => debug!("Cycle report: {:?}", report),
        other => debug!("Event: {:?}", other),
    }
}
