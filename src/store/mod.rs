pub mod frame;
pub mod record;
pub mod storage;

use log::{debug, info, warn};
use std::io;
use thiserror::Error;

pub use record::{ConfigRecord, MqttSettings, SensorSlot, WifiCredentials, SENSOR_CONFIG_COUNT};
pub use storage::{FileStorage, MemoryStorage, NvStorage};

/// Default size of the storage area reserved for the record.
pub const DEFAULT_RECORD_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored record has no valid head/foot signature")]
    InvalidSignature,

    #[error("stored record version {0} is not supported")]
    UnsupportedVersion(u8),

    #[error("stored record checksum {stored:#06x} does not match {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },

    #[error("record of {size} bytes does not fit into {capacity} bytes")]
    RecordTooLarge { size: usize, capacity: usize },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode record: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Loads and saves the [`ConfigRecord`] in a fixed area of non-volatile storage.
pub struct ConfigStore<S: NvStorage> {
    storage: S,
    offset: usize,
    record_size: usize,
}

impl<S: NvStorage> ConfigStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_layout(storage, 0, DEFAULT_RECORD_SIZE)
    }

    pub fn with_layout(storage: S, offset: usize, record_size: usize) -> Self {
        Self {
            storage,
            offset,
            record_size,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Read and validate the stored record.
    pub fn load(&self) -> Result<ConfigRecord, StoreError> {
        let bytes = self.storage.read_bytes(self.offset, self.record_size)?;
        frame::decode(&bytes)
    }

    /// Load the stored record into `live`. On any failure `live` is left untouched.
    pub fn load_into(&self, live: &mut ConfigRecord) -> Result<(), StoreError> {
        match self.load() {
            Ok(stored) => {
                live.copy_fields_from(stored);
                info!("Configuration loaded from storage");
                Ok(())
            }
            Err(e) => {
                warn!("Stored configuration rejected, keeping defaults: {}", e);
                Err(e)
            }
        }
    }

    /// Write the record, committing if the storage buffers writes.
    pub fn save(&mut self, record: &ConfigRecord) -> Result<(), StoreError> {
        let frame = frame::encode(record, self.record_size)?;
        debug!("Writing {} byte record at offset {}", frame.len(), self.offset);
        self.storage.write_bytes(self.offset, &frame)?;
        if self.storage.buffers_writes() {
            self.storage.commit()?;
        }
        info!("Configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Memory storage that buffers and counts commits.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        commits: usize,
    }

    impl NvStorage for CountingStorage {
        fn read_bytes(&self, offset: usize, size: usize) -> io::Result<Vec<u8>> {
            self.inner.read_bytes(offset, size)
        }

        fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> io::Result<()> {
            self.inner.write_bytes(offset, bytes)
        }

        fn commit(&mut self) -> io::Result<()> {
            self.commits += 1;
            Ok(())
        }

        fn buffers_writes(&self) -> bool {
            true
        }
    }

    fn configured_record() -> ConfigRecord {
        let mut record = ConfigRecord::default();
        record.wifi.ssid = "Muspelheim".to_string();
        record.wifi.password = "secret".to_string();
        record.mqtt.server = "192.168.66.21".to_string();
        record.mqtt.user = "station".to_string();
        record.sensors[0].address = "2611223344556677".to_string();
        record.sensors[0].config.name = "Tank".to_string();
        record.sensors[0].config.format = "%s l".to_string();
        record.sensors[0].config.min = Some(0.0);
        record.sensors[0].config.max = Some(3.0);
        record.sensors[0].config.format_min = Some(0.0);
        record.sensors[0].config.format_max = Some(120.0);
        record.sensors[3].address = "28EE3F8C25160102".to_string();
        record.sensors[3].config.precision = 1;
        record.sensors[3].config.bonds = "0=0;1=50".to_string();
        record
    }

    #[test]
    fn test_load_from_erased_storage_keeps_defaults() {
        let store = ConfigStore::new(MemoryStorage::new());
        let mut live = ConfigRecord::default();
        live.wifi.ssid = "compiled-in".to_string();

        let result = store.load_into(&mut live);
        assert!(matches!(result, Err(StoreError::InvalidSignature)));
        assert_eq!(live.wifi.ssid, "compiled-in");
    }

    #[test]
    fn test_save_then_load_copies_every_field() {
        let record = configured_record();
        let mut store = ConfigStore::new(MemoryStorage::new());
        store.save(&record).unwrap();

        let mut live = ConfigRecord::default();
        store.load_into(&mut live).unwrap();
        assert_eq!(live, record);
    }

    #[test]
    fn test_mismatched_marker_leaves_live_config() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        store.save(&configured_record()).unwrap();
        store.storage_mut().as_bytes_mut()[0] = b'X';

        let mut live = ConfigRecord::default();
        assert!(matches!(
            store.load_into(&mut live),
            Err(StoreError::InvalidSignature)
        ));
        assert_eq!(live, ConfigRecord::default());
    }

    #[test]
    fn test_commit_only_for_buffering_storage() {
        let mut store = ConfigStore::new(CountingStorage::default());
        store.save(&configured_record()).unwrap();
        store.save(&configured_record()).unwrap();
        assert_eq!(store.storage().commits, 2);
    }

    #[test]
    fn test_record_at_offset() {
        let mut store = ConfigStore::with_layout(MemoryStorage::new(), 512, 2048);
        store.save(&configured_record()).unwrap();
        assert_eq!(&store.storage().as_bytes()[512..516], &frame::HEAD_MARKER);
        assert_eq!(store.load().unwrap(), configured_record());
    }

    #[test]
    fn test_file_backed_roundtrip_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("station.nvs");

        let mut store = ConfigStore::new(FileStorage::open(&path).unwrap());
        store.save(&configured_record()).unwrap();

        let reopened = ConfigStore::new(FileStorage::open(&path).unwrap());
        let mut live = ConfigRecord::default();
        reopened.load_into(&mut live).unwrap();
        assert_eq!(live.sensors[0].config.name, "Tank");
        assert_eq!(live.mqtt.server, "192.168.66.21");
    }
}
