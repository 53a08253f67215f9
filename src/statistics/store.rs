//! Persistence of raw statistics per calendar date.

use crate::error::{Result, StatsError};
use crate::types::{RawStatistics, StatisticsVersion};
use chrono::NaiveDate;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Magic bytes for the statistics data file.
const STATS_MAGIC: &[u8; 4] = b"TST\0";

/// Current statistics file format version.
const STATS_VERSION: u8 = 1;

const DATA_FILE: &str = "statistics.bin";
const LOCK_FILE: &str = "LOCK";

/// Raw statistics of one key as persisted for one date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedStatistics {
    pub key: String,
    pub date: NaiveDate,
    /// Task version the raw statistics were taken at.
    pub version: StatisticsVersion,
    pub raw: RawStatistics,
}

/// Storage for dated raw statistics. One entry per (key, date); saving
/// again for the same pair overwrites.
pub trait StatisticsStore: Send + Sync {
    fn save(&self, statistics: DatedStatistics) -> Result<()>;

    fn load(&self, key: &str, date: NaiveDate) -> Result<Option<DatedStatistics>>;

    /// Entries for `key` with `start <= date <= end`, oldest first.
    fn range(&self, key: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<DatedStatistics>>;

    /// Most recent entry for `key`.
    fn latest(&self, key: &str) -> Result<Option<DatedStatistics>>;
}

type Entries = BTreeMap<(String, NaiveDate), DatedStatistics>;

fn range_of(entries: &Entries, key: &str, start: NaiveDate, end: NaiveDate) -> Vec<DatedStatistics> {
    if start > end {
        return Vec::new();
    }
    entries
        .range((key.to_string(), start)..=(key.to_string(), end))
        .map(|(_, v)| v.clone())
        .collect()
}

fn latest_of(entries: &Entries, key: &str) -> Option<DatedStatistics> {
    entries
        .range((key.to_string(), NaiveDate::MIN)..=(key.to_string(), NaiveDate::MAX))
        .next_back()
        .map(|(_, v)| v.clone())
}

/// Statistics store kept only in memory.
#[derive(Default)]
pub struct MemoryStatisticsStore {
    entries: RwLock<Entries>,
}

impl MemoryStatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StatisticsStore for MemoryStatisticsStore {
    fn save(&self, statistics: DatedStatistics) -> Result<()> {
        self.entries
            .write()
            .insert((statistics.key.clone(), statistics.date), statistics);
        Ok(())
    }

    fn load(&self, key: &str, date: NaiveDate) -> Result<Option<DatedStatistics>> {
        Ok(self.entries.read().get(&(key.to_string(), date)).cloned())
    }

    fn range(&self, key: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<DatedStatistics>> {
        Ok(range_of(&self.entries.read(), key, start, end))
    }

    fn latest(&self, key: &str) -> Result<Option<DatedStatistics>> {
        Ok(latest_of(&self.entries.read(), key))
    }
}

/// File store configuration.
#[derive(Clone, Debug)]
pub struct FileStoreConfig {
    /// Directory holding the data and lock files.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./statistics"),
            create_if_missing: true,
        }
    }
}

/// Statistics store backed by a single checksummed MessagePack file.
///
/// The whole file is rewritten on every save. The directory is locked for
/// exclusive use while the store is open.
pub struct FileStatisticsStore {
    path: PathBuf,
    _lock_file: File,
    entries: RwLock<Entries>,
}

impl FileStatisticsStore {
    /// Open an existing store directory or create a new one.
    pub fn open(config: FileStoreConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(StatsError::NotInitialized);
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        let data_path = config.path.join(DATA_FILE);
        let entries = if data_path.exists() {
            Self::read_entries(&data_path)?
        } else {
            Entries::new()
        };
        debug!(path = %data_path.display(), entries = entries.len(), "Opened statistics store");

        Ok(Self {
            path: data_path,
            _lock_file: lock_file,
            entries: RwLock::new(entries),
        })
    }

    fn acquire_lock(dir: &Path) -> Result<File> {
        let lock_file = File::create(dir.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StatsError::Locked)?;
        Ok(lock_file)
    }

    fn write_entries(&self, entries: &Entries) -> Result<()> {
        let list: Vec<&DatedStatistics> = entries.values().collect();
        let encoded = rmp_serde::to_vec(&list)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(STATS_MAGIC)?;
            file.write_all(&[STATS_VERSION])?;
            file.write_all(&(encoded.len() as u64).to_le_bytes())?;
            file.write_all(&encoded)?;
            file.write_all(&crc32fast::hash(&encoded).to_le_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn read_entries(path: &Path) -> Result<Entries> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STATS_MAGIC {
            return Err(StatsError::InvalidFormat("Invalid statistics file magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STATS_VERSION {
            return Err(StatsError::InvalidFormat(format!(
                "Unsupported statistics file version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if len > file.metadata()?.len() {
            return Err(StatsError::Corruption(format!(
                "Statistics payload length {} exceeds file size",
                len
            )));
        }

        let mut encoded = vec![0u8; len as usize];
        file.read_exact(&mut encoded)
            .map_err(|_| StatsError::Corruption("Truncated statistics file".into()))?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)
            .map_err(|_| StatsError::Corruption("Missing statistics checksum".into()))?;
        let expected = u32::from_le_bytes(checksum_bytes);
        let got = crc32fast::hash(&encoded);
        if expected != got {
            return Err(StatsError::ChecksumMismatch { expected, got });
        }

        let list: Vec<DatedStatistics> = rmp_serde::from_slice(&encoded)?;
        Ok(list
            .into_iter()
            .map(|s| ((s.key.clone(), s.date), s))
            .collect())
    }
}

impl StatisticsStore for FileStatisticsStore {
    fn save(&self, statistics: DatedStatistics) -> Result<()> {
        let mut entries = self.entries.write();
        let key = (statistics.key.clone(), statistics.date);
        let previous = entries.insert(key.clone(), statistics);
        if let Err(e) = self.write_entries(&entries) {
            // Keep memory consistent with disk.
            match previous {
                Some(prev) => entries.insert(key, prev),
                None => entries.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn load(&self, key: &str, date: NaiveDate) -> Result<Option<DatedStatistics>> {
        Ok(self.entries.read().get(&(key.to_string(), date)).cloned())
    }

    fn range(&self, key: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<DatedStatistics>> {
        Ok(range_of(&self.entries.read(), key, start, end))
    }

    fn latest(&self, key: &str) -> Result<Option<DatedStatistics>> {
        Ok(latest_of(&self.entries.read(), key))
    }
}
