//! Query storage: record system reads and replay them.
//!
//! Every successful read through a [`Recording`] source is stored as text
//! under its full name. With `recover_every_query` set, reads are answered
//! from the records first and only fall through to the real source when no
//! usable record exists. Loading a captured record set and switching
//! recovery on replays another machine.
//!
//! Integers read from a fixed-width source keep their width next to the
//! text, so a replayed read obeys the same width rule as a live one.

use crate::traits::{Fetch, Integer};
use hwprobe_core::{probe_trace, ProbeError, ProbeResult};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// One stored read.
///
/// Serialized as a bare string, or as `{"value": ..., "width": ...}` for a
/// fixed-width integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Text(String),
    Integer { value: String, width: usize },
}

impl StoredRecord {
    pub fn text(&self) -> &str {
        match self {
            StoredRecord::Text(text) => text,
            StoredRecord::Integer { value, .. } => value,
        }
    }

    /// Byte width of a fixed-width integer record.
    pub fn width(&self) -> Option<usize> {
        match self {
            StoredRecord::Text(_) => None,
            StoredRecord::Integer { width, .. } => Some(*width),
        }
    }
}

impl From<String> for StoredRecord {
    fn from(text: String) -> Self {
        StoredRecord::Text(text)
    }
}

impl From<&str> for StoredRecord {
    fn from(text: &str) -> Self {
        StoredRecord::Text(text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStorage {
    pub enabled: bool,
    pub recover_every_query: bool,
    records: BTreeMap<String, StoredRecord>,
}

impl Default for QueryStorage {
    fn default() -> Self {
        Self {
            enabled: true,
            recover_every_query: false,
            records: BTreeMap::new(),
        }
    }
}

impl QueryStorage {
    pub fn record(&mut self, name: &str, record: StoredRecord) {
        if self.enabled {
            self.records.insert(name.to_string(), record);
        }
    }

    pub fn recover(&self, name: &str) -> Option<&StoredRecord> {
        if self.enabled && self.recover_every_query {
            self.records.get(name)
        } else {
            None
        }
    }

    pub fn records(&self) -> &BTreeMap<String, StoredRecord> {
        &self.records
    }

    /// Merge captured records, overwriting existing names.
    pub fn load<R: Into<StoredRecord>>(&mut self, records: impl IntoIterator<Item = (String, R)>) {
        self.records
            .extend(records.into_iter().map(|(name, record)| (name, record.into())));
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

pub type SharedStorage = Arc<RwLock<QueryStorage>>;

static GLOBAL_STORAGE: Lazy<SharedStorage> =
    Lazy::new(|| Arc::new(RwLock::new(QueryStorage::default())));

/// The storage shared by the process-wide system registry.
pub fn global_storage() -> SharedStorage {
    Arc::clone(&GLOBAL_STORAGE)
}

/// A source wrapper that records and optionally replays reads.
#[derive(Debug, Clone)]
pub struct Recording<F> {
    inner: F,
    storage: SharedStorage,
}

impl<F: Fetch> Recording<F> {
    pub fn new(inner: F, storage: SharedStorage) -> Self {
        Self { inner, storage }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    fn recovered(&self, name: &str) -> Option<StoredRecord> {
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        storage.recover(name).cloned()
    }

    fn remember(&self, name: &str, record: StoredRecord) {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        storage.record(name, record);
    }
}

impl<F: Fetch> Fetch for Recording<F> {
    const FIXED_WIDTH: bool = F::FIXED_WIDTH;

    fn get_string(&self, name: &str) -> ProbeResult<String> {
        match self.recovered(name) {
            Some(StoredRecord::Text(text)) => {
                probe_trace!(key = name, "Answered from query storage");
                return Ok(text);
            }
            Some(StoredRecord::Integer { width, .. }) => {
                return Err(ProbeError::type_mismatch(
                    name,
                    "UTF-8 string",
                    format!("entry holds a {}-byte integer", width),
                ));
            }
            None => {}
        }

        let value = self.inner.get_string(name)?;
        self.remember(name, StoredRecord::Text(value.clone()));
        Ok(value)
    }

    fn get_integer<T: Integer>(&self, name: &str) -> ProbeResult<T> {
        if let Some(record) = self.recovered(name) {
            if let Some(width) = record.width().filter(|&width| width != T::WIDTH) {
                return Err(ProbeError::type_mismatch(
                    name,
                    T::NAME,
                    format!("entry is {} bytes wide, expected {}", width, T::WIDTH),
                ));
            }
            if let Ok(parsed) = record.text().parse::<T>() {
                probe_trace!(key = name, "Answered from query storage");
                return Ok(parsed);
            }
        }

        let value: T = self.inner.get_integer(name)?;
        let record = if F::FIXED_WIDTH {
            StoredRecord::Integer {
                value: value.to_string(),
                width: T::WIDTH,
            }
        } else {
            StoredRecord::Text(value.to_string())
        };
        self.remember(name, record);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MemoryFetcher, ProcFsFetcher};

    fn private_storage() -> SharedStorage {
        Arc::new(RwLock::new(QueryStorage::default()))
    }

    #[test]
    fn test_successful_reads_are_recorded() {
        let source = MemoryFetcher::new()
            .with_string("kern.ostype", "Darwin")
            .with_integer("hw.ncpu", 10i32);
        let recording = Recording::new(source, private_storage());

        assert_eq!(recording.get_string("kern.ostype").unwrap(), "Darwin");
        assert_eq!(recording.get_integer::<i32>("hw.ncpu").unwrap(), 10);
        assert!(recording.get_string("kern.missing").is_err());

        let storage = recording.storage().read().unwrap();
        assert_eq!(storage.records()["kern.ostype"], StoredRecord::from("Darwin"));
        assert_eq!(storage.records()["hw.ncpu"].text(), "10");
        assert_eq!(storage.records()["hw.ncpu"].width(), Some(4));
        assert!(!storage.records().contains_key("kern.missing"));
    }

    #[test]
    fn test_replay_takes_precedence_when_enabled() {
        let storage = private_storage();
        let source = MemoryFetcher::new().with_integer("hw.ncpu", 8i32);
        let recording = Recording::new(source, Arc::clone(&storage));

        // Recovery is off by default.
        assert_eq!(recording.get_integer::<i32>("hw.ncpu").unwrap(), 8);

        {
            let mut s = storage.write().unwrap();
            s.load([
                ("hw.ncpu".to_string(), "64".to_string()),
                ("kern.ostype".to_string(), "FreeBSD".to_string()),
                ("sysctl.proc_translated".to_string(), "1".to_string()),
            ]);
            s.recover_every_query = true;
        }
        assert_eq!(recording.get_integer::<i32>("hw.ncpu").unwrap(), 64);
        assert_eq!(recording.get_string("kern.ostype").unwrap(), "FreeBSD");
        assert!(recording.get_bool("sysctl.proc_translated").unwrap());
    }

    #[test]
    fn test_live_read_overwrites_loaded_record() {
        let storage = private_storage();
        storage
            .write()
            .unwrap()
            .load([("hw.ncpu".to_string(), "64".to_string())]);
        let source = MemoryFetcher::new().with_integer("hw.ncpu", 8i32);
        let recording = Recording::new(source, Arc::clone(&storage));

        assert_eq!(recording.get_integer::<i32>("hw.ncpu").unwrap(), 8);
        assert_eq!(storage.read().unwrap().records()["hw.ncpu"].text(), "8");
    }

    #[test]
    fn test_unparsable_record_falls_through() {
        let storage = private_storage();
        {
            let mut s = storage.write().unwrap();
            s.recover_every_query = true;
            s.load([("hw.ncpu".to_string(), "many".to_string())]);
        }
        let source = MemoryFetcher::new().with_integer("hw.ncpu", 8i32);
        let recording = Recording::new(source, storage);
        assert_eq!(recording.get_integer::<i32>("hw.ncpu").unwrap(), 8);
    }

    #[test]
    fn test_disabled_storage_neither_records_nor_recovers() {
        let storage = private_storage();
        {
            let mut s = storage.write().unwrap();
            s.enabled = false;
            s.recover_every_query = true;
        }
        let source = MemoryFetcher::new().with_string("kern.hostname", "build-01");
        let recording = Recording::new(source, Arc::clone(&storage));
        assert_eq!(recording.get_string("kern.hostname").unwrap(), "build-01");
        assert!(storage.read().unwrap().records().is_empty());
    }

    #[test]
    fn test_replayed_integers_keep_their_width() {
        let source = MemoryFetcher::new()
            .with_integer("hw.memsize", 34_359_738_368u64)
            .with_string("kern.ostype", "Darwin");
        let captured = Recording::new(source, private_storage());
        assert_eq!(captured.get_integer::<u64>("hw.memsize").unwrap(), 34_359_738_368);
        let text = serde_json::to_string(captured.storage().read().unwrap().records()).unwrap();

        let storage = private_storage();
        {
            let mut s = storage.write().unwrap();
            let records: BTreeMap<String, StoredRecord> = serde_json::from_str(&text).unwrap();
            s.load(records);
            s.recover_every_query = true;
        }
        let replay = Recording::new(MemoryFetcher::new(), storage);

        assert_eq!(replay.get_integer::<u64>("hw.memsize").unwrap(), 34_359_738_368);
        assert!(matches!(
            replay.get_integer::<u8>("hw.memsize"),
            Err(ProbeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            replay.get_integer::<i32>("hw.memsize"),
            Err(ProbeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            replay.get_string("hw.memsize"),
            Err(ProbeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_bare_string_records_parse_at_any_width() {
        let records: BTreeMap<String, StoredRecord> =
            serde_json::from_str(r#"{"hw.ncpu": "12", "hw.memsize": {"value": "8", "width": 8}}"#)
                .unwrap();
        assert_eq!(records["hw.ncpu"], StoredRecord::from("12"));
        assert_eq!(records["hw.memsize"].width(), Some(8));

        let storage = private_storage();
        {
            let mut s = storage.write().unwrap();
            s.load(records);
            s.recover_every_query = true;
        }
        let replay = Recording::new(MemoryFetcher::new(), storage);
        assert_eq!(replay.get_integer::<u8>("hw.ncpu").unwrap(), 12);
        assert_eq!(replay.get_integer::<i64>("hw.ncpu").unwrap(), 12);
        assert_eq!(replay.get_string("hw.ncpu").unwrap(), "12");
    }

    #[test]
    fn test_text_sources_record_bare_strings() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("pid_max"), "32768\n").unwrap();
        let recording = Recording::new(ProcFsFetcher::new(temp.path()), private_storage());

        assert_eq!(recording.get_integer::<u32>("pid_max").unwrap(), 32768);
        let storage = recording.storage().read().unwrap();
        assert_eq!(storage.records()["pid_max"], StoredRecord::from("32768"));
    }
}
