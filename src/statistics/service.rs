//! Statistics service: live queries, dated persistence and history queries.

use crate::error::{Result, StatsError};
use crate::types::StatisticsVersion;
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::{DatedStatistics, StatisticsStore};
use super::task::StatisticsTask;

/// Statistics service configuration.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    /// Persist a key even if its task version hasn't changed since the
    /// last persist.
    pub persist_unchanged: bool,
}

/// Rendered statistics for one date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatedData {
    pub date: NaiveDate,
    pub data: serde_json::Value,
}

/// Routes statistics queries to registered tasks and persists their raw
/// statistics per date.
pub struct StatisticsService {
    config: ServiceConfig,
    store: Arc<dyn StatisticsStore>,
    /// Registered tasks, each once.
    tasks: RwLock<Vec<Arc<dyn StatisticsTask>>>,
    /// Statistics key to task.
    by_key: RwLock<HashMap<String, Arc<dyn StatisticsTask>>>,
    /// Task version last persisted per key.
    persisted: Mutex<HashMap<String, StatisticsVersion>>,
}

impl StatisticsService {
    pub fn new(store: Arc<dyn StatisticsStore>) -> Self {
        Self::with_config(store, ServiceConfig::default())
    }

    pub fn with_config(store: Arc<dyn StatisticsStore>, config: ServiceConfig) -> Self {
        Self {
            config,
            store,
            tasks: RwLock::new(Vec::new()),
            by_key: RwLock::new(HashMap::new()),
            persisted: Mutex::new(HashMap::new()),
        }
    }

    /// Register a task under all of its keys.
    pub fn register(&self, task: Arc<dyn StatisticsTask>) -> Result<()> {
        let keys = task.keys();
        let mut by_key = self.by_key.write();
        if let Some(key) = keys.iter().find(|k| by_key.contains_key(*k)) {
            return Err(StatsError::DuplicateStatisticsKey(key.clone()));
        }
        for key in keys {
            by_key.insert(key, Arc::clone(&task));
        }
        self.tasks.write().push(task);
        Ok(())
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.by_key.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Live statistics for `key`.
    pub fn statistics(&self, key: &str) -> Result<serde_json::Value> {
        let task = self.task(key)?;
        task.render(key, &task.raw_statistics(key))
    }

    /// Statistics persisted for `key` on `date`, if any.
    pub fn statistics_at(&self, key: &str, date: NaiveDate) -> Result<Option<DatedData>> {
        let task = self.task(key)?;
        match self.store.load(key, date)? {
            Some(dated) => Ok(Some(DatedData {
                date: dated.date,
                data: task.render(key, &dated.raw)?,
            })),
            None => Ok(None),
        }
    }

    /// Statistics persisted for `key` between `start` and `end` inclusive,
    /// oldest first.
    pub fn statistics_between(
        &self,
        key: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DatedData>> {
        if start > end {
            return Err(StatsError::InvalidDateRange { start, end });
        }
        let task = self.task(key)?;
        self.store
            .range(key, start, end)?
            .into_iter()
            .map(|dated| {
                Ok(DatedData {
                    date: dated.date,
                    data: task.render(key, &dated.raw)?,
                })
            })
            .collect()
    }

    /// Persist raw statistics of every key whose version changed since the
    /// last persist. Returns how many keys were saved.
    pub fn persist(&self, date: NaiveDate) -> Result<usize> {
        let entries: Vec<(String, Arc<dyn StatisticsTask>)> = self
            .by_key
            .read()
            .iter()
            .map(|(k, t)| (k.clone(), Arc::clone(t)))
            .collect();

        let mut persisted = self.persisted.lock();
        let mut saved = 0;
        for (key, task) in entries {
            let version = task.version();
            if !self.config.persist_unchanged && persisted.get(&key) == Some(&version) {
                debug!(key = key.as_str(), ?version, "Statistics unchanged, skipping persist");
                continue;
            }
            self.store.save(DatedStatistics {
                key: key.clone(),
                date,
                version,
                raw: task.raw_statistics(&key),
            })?;
            persisted.insert(key, version);
            saved += 1;
        }
        info!(%date, saved, "Persisted statistics");
        Ok(saved)
    }

    /// Seed every task from its most recently persisted statistics.
    /// Returns how many keys were restored.
    pub fn restore_latest(&self) -> Result<usize> {
        let entries: Vec<(String, Arc<dyn StatisticsTask>)> = self
            .by_key
            .read()
            .iter()
            .map(|(k, t)| (k.clone(), Arc::clone(t)))
            .collect();

        let mut persisted = self.persisted.lock();
        let mut restored = 0;
        for (key, task) in entries {
            if let Some(dated) = self.store.latest(&key)? {
                debug!(key = key.as_str(), date = %dated.date, "Restoring statistics");
                task.restore(&key, &dated.raw);
                // The restored counts are already on disk.
                persisted.insert(key, task.version());
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Rescan every registered task. All tasks are attempted; the first
    /// failure is returned.
    pub fn rescan_all(&self) -> Result<()> {
        let tasks: Vec<Arc<dyn StatisticsTask>> = self.tasks.read().clone();
        let mut first_error = None;
        for task in tasks {
            if let Err(e) = task.rescan() {
                warn!(keys = ?task.keys(), error = %e, "Statistics rescan failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn task(&self, key: &str) -> Result<Arc<dyn StatisticsTask>> {
        self.by_key
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StatsError::UnknownStatisticsKey(key.to_string()))
    }
}
