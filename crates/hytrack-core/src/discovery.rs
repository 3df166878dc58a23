//! Waybill discovery
//!
//! Finds tracking numbers in free text and tags them with a courier by
//! format: exactly 11 digits is Blue Dart, 12 to 14 digits is Delhivery.
//! A number already claimed as Blue Dart in the same text is never also
//! reported as Delhivery.
//!
//! [`DirectoryWaybillSource`] applies the extractor to a directory of
//! exported messages (`.eml` or `.txt`). Every run rescans the whole
//! directory; duplicates are resolved by the store.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, warn};

use crate::courier::Courier;
use crate::error::{Error, Result};
use crate::traits::{DiscoveredWaybill, WaybillSource};

const BLUEDART_PATTERN: &str = r"\b\d{11}\b";
const DELHIVERY_PATTERN: &str = r"\b\d{12,14}\b";

/// File extensions scanned by [`DirectoryWaybillSource`]
const MESSAGE_EXTENSIONS: [&str; 2] = ["eml", "txt"];

/// Extracts courier-tagged waybills from text
#[derive(Debug, Clone)]
pub struct WaybillExtractor {
    bluedart: Regex,
    delhivery: Regex,
}

impl WaybillExtractor {
    /// Compile the waybill patterns
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::discovery(format!("Invalid waybill pattern '{}': {}", pattern, e)))
        };

        Ok(Self {
            bluedart: compile(BLUEDART_PATTERN)?,
            delhivery: compile(DELHIVERY_PATTERN)?,
        })
    }

    /// Every waybill in `text` without duplicates, Blue Dart matches first
    pub fn extract(&self, text: &str) -> Vec<DiscoveredWaybill> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for m in self.bluedart.find_iter(text) {
            if seen.insert(m.as_str()) {
                found.push(DiscoveredWaybill::new(m.as_str(), Courier::BlueDart));
            }
        }

        for m in self.delhivery.find_iter(text) {
            if seen.insert(m.as_str()) {
                found.push(DiscoveredWaybill::new(m.as_str(), Courier::Delhivery));
            }
        }

        found
    }
}

/// Body of an RFC 822 message: everything after the first blank line
///
/// Digit runs in header lines (Message-ID, Date) are not waybills. Text
/// without a header block is returned whole.
pub fn message_body(raw: &str) -> &str {
    for separator in ["\r\n\r\n", "\n\n"] {
        if let Some(idx) = raw.find(separator) {
            let head = &raw[..idx];
            if head.lines().next().is_some_and(|l| l.contains(':')) {
                return &raw[idx + separator.len()..];
            }
        }
    }
    raw
}

/// Waybill source over a directory of exported messages
///
/// # Example
///
/// ```rust,no_run
/// use hytrack_core::discovery::DirectoryWaybillSource;
/// use hytrack_core::traits::WaybillSource;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = DirectoryWaybillSource::new("/var/spool/hytrack/inbox")?;
///     for found in source.discover().await? {
///         println!("{} {}", found.courier, found.waybill);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryWaybillSource {
    dir: PathBuf,
    extractor: WaybillExtractor,
}

impl DirectoryWaybillSource {
    /// Create a source over `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            dir: dir.into(),
            extractor: WaybillExtractor::new()?,
        })
    }

    /// Directory being scanned
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_message_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| MESSAGE_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
    }
}

#[async_trait]
impl WaybillSource for DirectoryWaybillSource {
    async fn discover(&self) -> Result<Vec<DiscoveredWaybill>> {
        let entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            Error::discovery(format!("Cannot read inbox directory {}: {}", self.dir.display(), e))
        })?;

        let mut paths = Vec::new();
        let mut stream = ReadDirStream::new(entries);
        while let Some(entry) = stream.next().await {
            let entry = entry?;
            let path = entry.path();
            if Self::is_message_file(&path) {
                paths.push(path);
            }
        }
        // Stable order so repeated runs report waybills identically
        paths.sort();

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for path in paths {
            let raw = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping unreadable message {}: {}", path.display(), e);
                    continue;
                }
            };
            let text = String::from_utf8_lossy(&raw);

            let waybills = self.extractor.extract(message_body(&text));
            debug!("{}: {} waybill(s)", path.display(), waybills.len());
            for waybill in waybills {
                if seen.insert(waybill.waybill.clone()) {
                    found.push(waybill);
                }
            }
        }

        Ok(found)
    }

    fn source_name(&self) -> &'static str {
        "directory"
    }
}

/// Waybill source that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiscovery;

#[async_trait]
impl WaybillSource for NoDiscovery {
    async fn discover(&self) -> Result<Vec<DiscoveredWaybill>> {
        Ok(Vec::new())
    }

    fn source_name(&self) -> &'static str {
        "disabled"
    }
}
