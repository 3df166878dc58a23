// # File Shipment Store
//
// File-based implementation of ShipmentStore with crash recovery.
//
// ## Purpose
//
// Provides durable tracking state across runs. Every mutation is written
// through before the call returns, so a committed fingerprint survives a crash
// that happens before the notification goes out.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename, never a half-written state file
// - Corruption detection: JSON validated on load
// - Automatic backup: `.backup` keeps the previous good state
// - Recovery: falls back to the backup if the main file is corrupt, and
//   refuses to open if neither is readable
//
// ## Failed Writes
//
// A mutation is applied to a copy of the records, the copy is written, and
// only then does it replace the in-memory view. If the write fails, memory
// and disk both still hold the previous state.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "12345678901": {
//       "waybill": "12345678901",
//       "courier": "BLUEDART",
//       "last_event_hash": "9f86d08...",
//       "last_status": "SHIPMENT DELIVERED (MUMBAI)",
//       "is_delivered": true,
//       "created_at": "2025-01-09T12:00:00Z",
//       "last_updated": "2025-01-10T08:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::courier::Courier;
use crate::traits::shipment_store::{RecordUpdate, ShipmentRecord, ShipmentStore, UpdateOutcome};

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

type Records = HashMap<String, ShipmentRecord>;

/// File-based shipment store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use hytrack_core::Courier;
/// use hytrack_core::state::FileShipmentStore;
/// use hytrack_core::traits::ShipmentStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileShipmentStore::new("/var/lib/hytrack/shipments.json").await?;
///
///     // Written to disk before returning
///     store.get_or_create("12345678901", Courier::BlueDart).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileShipmentStore {
    path: PathBuf,
    records: Arc<RwLock<Records>>,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: Records,
}

impl FileShipmentStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing state file
    /// 3. If it is corrupt, try to load the backup
    /// 4. If both fail, start with empty state
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state from file with automatic recovery
    ///
    /// Only a parse failure counts as corruption, and only a readable backup
    /// recovers from it. Every other outcome is an error: starting empty would
    /// revive delivered shipments and re-notify every status.
    async fn load_state_with_recovery(path: &Path) -> Result<Records, Error> {
        match Self::load_state(path).await {
            Ok(records) => {
                tracing::debug!("Loaded state from file: {} records", records.len());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "State file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    return Err(Error::store(format!(
                        "State file {} is corrupt ({}) and no backup exists. \
                        Repair or remove it to start over.",
                        path.display(),
                        e
                    )));
                }

                match Self::load_state(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("Recovered state from backup: {} records", records.len());

                        if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }

                        Ok(records)
                    }
                    Err(backup_err) => Err(Error::store(format!(
                        "State file {} is corrupt ({}) and its backup is unusable ({}). \
                        Repair or remove them to start over.",
                        path.display(),
                        e,
                        backup_err
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load state from file
    async fn load_state(path: &Path) -> Result<Records, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read state file {}: {}", path.display(), e))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.records)
    }

    /// Write a snapshot of the records to the state file atomically
    async fn write_snapshot(&self, records: &Records) -> Result<(), Error> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: records.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file)
            .map_err(|e| Error::store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore state file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl ShipmentStore for FileShipmentStore {
    async fn get_or_create(&self, waybill: &str, courier: Courier) -> Result<ShipmentRecord, Error> {
        let mut guard = self.records.write().await;
        if let Some(existing) = guard.get(waybill) {
            return Ok(existing.clone());
        }

        let record = ShipmentRecord::new(waybill, courier);
        let mut next = guard.clone();
        next.insert(waybill.to_string(), record.clone());

        self.write_snapshot(&next).await?;
        *guard = next;
        Ok(record)
    }

    async fn get(&self, waybill: &str) -> Result<Option<ShipmentRecord>, Error> {
        let guard = self.records.read().await;
        Ok(guard.get(waybill).cloned())
    }

    async fn list_active(&self) -> Result<Vec<ShipmentRecord>, Error> {
        let guard = self.records.read().await;
        Ok(guard.values().filter(|r| r.is_active()).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<ShipmentRecord>, Error> {
        let guard = self.records.read().await;
        Ok(guard.values().cloned().collect())
    }

    async fn update(&self, waybill: &str, update: &RecordUpdate) -> Result<UpdateOutcome, Error> {
        // The write lock is held across compare, write and commit
        let mut guard = self.records.write().await;

        let mut record = guard
            .get(waybill)
            .cloned()
            .ok_or_else(|| Error::not_found(waybill))?;

        let outcome = record.apply(update);
        if outcome != UpdateOutcome::Applied {
            return Ok(outcome);
        }

        let mut next = guard.clone();
        next.insert(waybill.to_string(), record);

        self.write_snapshot(&next).await?;
        *guard = next;
        Ok(outcome)
    }

    async fn flush(&self) -> Result<(), Error> {
        let guard = self.records.read().await;
        self.write_snapshot(&guard).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use tempfile::tempdir;

    fn update_to(expected: Option<&str>, new: &str, delivered: bool) -> RecordUpdate {
        RecordUpdate::new(
            expected.map(Fingerprint::of_text),
            Fingerprint::of_text(new),
            new,
            delivered,
        )
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.json");

        let store = FileShipmentStore::new(&path).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());

        store.get_or_create("12345678901", Courier::BlueDart).await.unwrap();
        let outcome = store
            .update("12345678901", &update_to(None, "shipped", false))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);
        assert!(path.exists());

        let store2 = FileShipmentStore::new(&path).await.unwrap();
        let record = store2.get("12345678901").await.unwrap().unwrap();
        assert_eq!(record.courier, Courier::BlueDart);
        assert_eq!(record.last_event_hash, Some(Fingerprint::of_text("shipped")));
        assert_eq!(record.last_status.as_deref(), Some("shipped"));
        assert!(!record.is_delivered);
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.json");

        let store = FileShipmentStore::new(&path).await.unwrap();
        store.get_or_create("12345678901", Courier::BlueDart).await.unwrap();
        store
            .update("12345678901", &update_to(None, "shipped", false))
            .await
            .unwrap();

        let backup_path = FileShipmentStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after second write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        let store2 = FileShipmentStore::new(&path).await.unwrap();
        let recovered = store2.get("12345678901").await.unwrap().unwrap();
        // The backup holds the state before the last write
        assert_eq!(recovered.last_event_hash, None);
    }

    #[tokio::test]
    async fn test_corrupt_state_without_backup_refuses_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.json");

        let store = FileShipmentStore::new(&path).await.unwrap();
        store.get_or_create("12345678901", Courier::BlueDart).await.unwrap();
        store
            .update("12345678901", &update_to(None, "delivered", true))
            .await
            .unwrap();
        drop(store);

        fs::remove_file(FileShipmentStore::backup_path(&path)).await.unwrap();
        fs::write(&path, b"{\"version\": \"1.0\", \"recor").await.unwrap();

        let result = FileShipmentStore::new(&path).await;
        assert!(matches!(result, Err(Error::Store(_))));

        // The corrupt file is left in place for inspection
        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("{\"version\""));
    }

    #[tokio::test]
    async fn test_corrupt_state_and_backup_refuses_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.json");

        let store = FileShipmentStore::new(&path).await.unwrap();
        store.get_or_create("12345678901", Courier::BlueDart).await.unwrap();
        store
            .update("12345678901", &update_to(None, "delivered", true))
            .await
            .unwrap();
        drop(store);

        fs::write(FileShipmentStore::backup_path(&path), b"not json").await.unwrap();
        fs::write(&path, b"also not json").await.unwrap();

        assert!(matches!(
            FileShipmentStore::new(&path).await,
            Err(Error::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let path = state_dir.join("shipments.json");

        let store = FileShipmentStore::new(&path).await.unwrap();
        store.get_or_create("12345678901", Courier::BlueDart).await.unwrap();

        // Pull the directory out from under the store
        fs::remove_dir_all(&state_dir).await.unwrap();

        let result = store
            .update("12345678901", &update_to(None, "shipped", true))
            .await;
        assert!(matches!(result, Err(Error::Store(_))));

        let record = store.get("12345678901").await.unwrap().unwrap();
        assert_eq!(record.last_event_hash, None);
        assert!(!record.is_delivered);
        assert_eq!(store.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_update_does_not_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shipments.json");

        let store = FileShipmentStore::new(&path).await.unwrap();
        store.get_or_create("12345678901", Courier::BlueDart).await.unwrap();
        store
            .update("12345678901", &update_to(None, "delivered", true))
            .await
            .unwrap();

        let outcome = store
            .update("12345678901", &update_to(Some("delivered"), "returned", false))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::AlreadyDelivered);

        let reloaded = FileShipmentStore::new(&path).await.unwrap();
        let record = reloaded.get("12345678901").await.unwrap().unwrap();
        assert!(record.is_delivered);
        assert!(reloaded.list_active().await.unwrap().is_empty());
    }
}
