// Single-blob record store with eviction on quota exhaustion

use crate::backend::{BackendError, StorageBackend};
use crate::record::Record;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Storage key used by the browser form application
pub const DEFAULT_STORAGE_KEY: &str = "formDataRecords";

/// Fraction of the working set dropped per eviction round
const EVICT_FRACTION: f64 = 0.1;

/// Result of a save, for the caller to surface however it likes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Everything was written
    Saved { count: usize },
    /// Storage was full; the oldest `removed` records were dropped so `kept` could be written
    Purged { removed: usize, kept: usize },
    /// Storage stayed full even with nothing left to drop; the previous blob is untouched
    Failed { attempted: usize },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self, SaveOutcome::Failed { .. })
    }

    /// Records removed by eviction, zero unless `Purged`
    pub fn purged(&self) -> usize {
        match self {
            SaveOutcome::Purged { removed, .. } => *removed,
            _ => 0,
        }
    }
}

/// Why `load_checked` could not produce records
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("stored records under '{key}' are corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors that abort a save without retrying
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The full record collection persisted as one JSON array under one key.
///
/// Every operation reads or writes the whole collection; there is no
/// incremental update. With several writers the last save wins.
pub struct Store<B: StorageBackend> {
    backend: B,
    key: String,
}

impl<B: StorageBackend> Store<B> {
    /// Store using the default key
    pub fn new(backend: B) -> Self {
        Self::with_key(backend, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(backend: B, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load all records, failing soft.
    ///
    /// Missing, unreadable or corrupt data yields an empty list. The
    /// corrupt and unreadable cases are logged; use `load_checked` to act on
    /// them instead.
    pub fn load(&self) -> Vec<Record> {
        match self.load_checked() {
            Ok(records) => records,
            Err(LoadError::Corrupt { key, source }) => {
                warn!(key = %key, error = %source, "Stored records are corrupt, treating as empty");
                Vec::new()
            }
            Err(LoadError::Backend(e)) => {
                warn!(key = %self.key, error = %e, "Failed to read stored records, treating as empty");
                Vec::new()
            }
        }
    }

    /// Load all records, reporting corrupt data as an error
    pub fn load_checked(&self) -> Result<Vec<Record>, LoadError> {
        let Some(blob) = self.backend.get(&self.key)? else {
            debug!(key = %self.key, "No stored records");
            return Ok(Vec::new());
        };

        let records: Vec<Record> = serde_json::from_str(&blob).map_err(|source| LoadError::Corrupt {
            key: self.key.clone(),
            source,
        })?;

        debug!(key = %self.key, count = records.len(), "Loaded records");
        Ok(records)
    }

    /// Write the full collection.
    ///
    /// On a quota error the oldest records are evicted in rounds of 10%
    /// (at least one) and the write retried until it fits or nothing is
    /// left. Any other backend error is returned as-is.
    pub fn save(&self, records: Vec<Record>) -> Result<SaveOutcome, SaveError> {
        let count = records.len();
        match self.write(&records) {
            Ok(()) => {
                debug!(key = %self.key, count, "Saved records");
                return Ok(SaveOutcome::Saved { count });
            }
            Err(SaveError::Backend(e)) if e.is_quota_exceeded() => {
                warn!(key = %self.key, count, error = %e, "Storage full, evicting oldest records");
            }
            Err(e) => return Err(e),
        }

        let mut current = records;
        while !current.is_empty() {
            let remove_count = eviction_batch(current.len());
            current = evict_oldest(current, remove_count);

            match self.write(&current) {
                Ok(()) => {
                    let removed = count - current.len();
                    info!(key = %self.key, removed, kept = current.len(), "Saved after evicting oldest records");
                    return Ok(SaveOutcome::Purged {
                        removed,
                        kept: current.len(),
                    });
                }
                Err(SaveError::Backend(e)) if e.is_quota_exceeded() => {
                    debug!(remaining = current.len(), "Still over quota, evicting more");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(key = %self.key, attempted = count, "Unable to save records: storage is full");
        Ok(SaveOutcome::Failed { attempted: count })
    }

    /// Remove the stored collection entirely
    pub fn clear(&self) -> Result<(), BackendError> {
        self.backend.remove(&self.key)
    }

    fn write(&self, records: &[Record]) -> Result<(), SaveError> {
        let json = serde_json::to_string(records)?;
        self.backend.set(&self.key, &json)?;
        Ok(())
    }
}

/// Records to drop in one round: 10% rounded up, at least one
pub fn eviction_batch(len: usize) -> usize {
    ((len as f64 * EVICT_FRACTION).ceil() as usize).max(1)
}

/// Drop the `count` oldest records by age key.
///
/// Ordering is a stable ascending sort on `Record::age_key`, so among equal
/// ages the earlier record goes first. Survivors keep their relative order.
pub fn evict_oldest(records: Vec<Record>, count: usize) -> Vec<Record> {
    if count == 0 {
        return records;
    }
    if count >= records.len() {
        return Vec::new();
    }

    let mut by_age: Vec<(i64, usize)> = records.iter().enumerate().map(|(i, r)| (r.age_key(), i)).collect();
    by_age.sort_by_key(|(age, _)| *age);

    let mut evicted = vec![false; records.len()];
    for (_, i) in by_age.into_iter().take(count) {
        evicted[i] = true;
    }

    records
        .into_iter()
        .zip(evicted)
        .filter_map(|(r, gone)| (!gone).then_some(r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Backend that fails the next writes with queued errors, then delegates
    struct ScriptedBackend {
        inner: MemoryBackend,
        errors: RefCell<VecDeque<BackendError>>,
        writes: RefCell<usize>,
    }

    impl ScriptedBackend {
        fn new(inner: MemoryBackend, errors: Vec<BackendError>) -> Self {
            Self {
                inner,
                errors: RefCell::new(errors.into()),
                writes: RefCell::new(0),
            }
        }
    }

    impl StorageBackend for ScriptedBackend {
        fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
            *self.writes.borrow_mut() += 1;
            match self.errors.borrow_mut().pop_front() {
                Some(e) => Err(e),
                None => self.inner.set(key, value),
            }
        }

        fn remove(&self, key: &str) -> Result<(), BackendError> {
            self.inner.remove(key)
        }
    }

    fn rec(id: &str, created_at: Option<i64>, problem_len: usize) -> Record {
        Record {
            id: id.to_string(),
            name: format!("Customer {}", id),
            mobile: "9876543210".to_string(),
            problem: "x".repeat(problem_len),
            created_at,
            ..Default::default()
        }
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    fn blob_len(records: &[Record]) -> usize {
        serde_json::to_string(records).unwrap().len()
    }

    #[test]
    fn test_load_missing_is_empty() {
        let store = Store::new(MemoryBackend::new());
        assert!(store.load().is_empty());
        assert!(store.load_checked().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let store = Store::new(MemoryBackend::new());
        let records = vec![rec("rec-1", Some(1), 4), rec("rec-2", Some(2), 4)];

        let outcome = store.save(records.clone()).unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { count: 2 });
        assert_eq!(store.load(), records);
    }

    #[test]
    fn test_load_corrupt_is_observable() {
        let backend = MemoryBackend::new();
        backend.set(DEFAULT_STORAGE_KEY, "{not json").unwrap();
        let store = Store::new(backend);

        assert!(store.load().is_empty());
        assert!(matches!(store.load_checked(), Err(LoadError::Corrupt { .. })));
    }

    #[test]
    fn test_eviction_batch() {
        assert_eq!(eviction_batch(1), 1);
        assert_eq!(eviction_batch(9), 1);
        assert_eq!(eviction_batch(10), 1);
        assert_eq!(eviction_batch(11), 2);
        assert_eq!(eviction_batch(100), 10);
    }

    #[test]
    fn test_evict_oldest_hand_entered_first() {
        let records = vec![
            rec("rec-300", None, 0),
            rec("JOB-7", None, 0),
            rec("rec-100", None, 0),
            rec("rec-200", None, 0),
        ];
        let kept = evict_oldest(records, 2);
        assert_eq!(ids(&kept), vec!["rec-300", "rec-200"]);
    }

    #[test]
    fn test_evict_oldest_ties_are_stable() {
        let records = vec![rec("a", Some(5), 0), rec("b", Some(5), 0), rec("c", Some(1), 0)];
        let kept = evict_oldest(records, 2);
        assert_eq!(ids(&kept), vec!["b"]);
    }

    #[test]
    fn test_quota_purges_oldest_prefix() {
        let records: Vec<Record> = (0..20)
            .map(|i| rec(&format!("rec-{}", 1000 + i), Some(1000 + i), 50))
            // Shuffle insertion order so survivors' order is checkable
            .rev()
            .collect();
        let capacity = DEFAULT_STORAGE_KEY.len() + blob_len(&records[..12]);
        let store = Store::new(MemoryBackend::with_capacity(capacity));

        let outcome = store.save(records.clone()).unwrap();
        let SaveOutcome::Purged { removed, kept } = outcome else {
            panic!("expected purge, got {:?}", outcome);
        };
        assert_eq!(removed + kept, 20);
        assert!(kept > 0 && kept <= 12);

        // Removed records are exactly the `removed` oldest
        let loaded = store.load();
        let mut ages: Vec<i64> = loaded.iter().map(|r| r.age_key()).collect();
        assert!(ages.iter().all(|a| *a >= 1000 + removed as i64));

        // Survivors keep their original relative order (descending here)
        let mut sorted = ages.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ages, sorted);
        ages.dedup();
        assert_eq!(ages.len(), kept);
    }

    #[test]
    fn test_quota_failure_when_nothing_fits() {
        // Even "[]" does not fit
        let store = Store::new(MemoryBackend::with_capacity(DEFAULT_STORAGE_KEY.len() + 1));
        let records = vec![rec("rec-1", Some(1), 10), rec("rec-2", Some(2), 10)];

        let outcome = store.save(records).unwrap();
        assert_eq!(outcome, SaveOutcome::Failed { attempted: 2 });
        assert!(!outcome.is_saved());
        // Initial attempt plus one per round until empty
        assert_eq!(store.backend().write_attempts(), 3);
    }

    #[test]
    fn test_quota_can_purge_everything() {
        let backend = MemoryBackend::with_capacity(DEFAULT_STORAGE_KEY.len() + 2);
        backend.set(DEFAULT_STORAGE_KEY, "[]").unwrap();
        let store = Store::new(backend);

        let outcome = store.save(vec![rec("rec-1", Some(1), 10)]).unwrap();
        assert_eq!(outcome.purged(), 1);
        assert_eq!(outcome, SaveOutcome::Purged { removed: 1, kept: 0 });
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_eviction_terminates_and_shrinks() {
        for n in [1usize, 2, 7, 31, 64] {
            let records: Vec<Record> = (0..n).map(|i| rec(&format!("rec-{}", i), None, 30)).collect();
            let store = Store::new(MemoryBackend::with_capacity(DEFAULT_STORAGE_KEY.len() + 2));
            let outcome = store.save(records).unwrap();
            assert_eq!(outcome, SaveOutcome::Purged { removed: n, kept: 0 });
            // Strictly shrinking: never more attempts than records plus one
            assert!(store.backend().write_attempts() <= n + 1);
        }
    }

    #[test]
    fn test_non_quota_error_propagates() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(Some("permission denied"));
        let store = Store::new(backend);

        let err = store.save(vec![rec("rec-1", Some(1), 1)]).unwrap_err();
        assert!(matches!(err, SaveError::Backend(BackendError::Other(_))));
        assert_eq!(store.backend().write_attempts(), 1);
    }

    #[test]
    fn test_custom_key_and_clear() {
        let store = Store::with_key(MemoryBackend::new(), "otherKey");
        store.save(vec![rec("rec-1", Some(1), 1)]).unwrap();
        assert!(store.backend().get("otherKey").unwrap().is_some());

        store.clear().unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_non_quota_error_during_eviction_stops_retrying() {
        let inner = MemoryBackend::new();
        inner.set(DEFAULT_STORAGE_KEY, r#"[{"id":"rec-1"}]"#).unwrap();
        let backend = ScriptedBackend::new(
            inner,
            vec![
                BackendError::QuotaExceeded { needed: 100, available: 10 },
                BackendError::Other("device removed".to_string()),
            ],
        );
        let store = Store::new(backend);

        let records: Vec<Record> = (1..=5).map(|i| rec(&format!("rec-{}", i), Some(i), 10)).collect();
        let err = store.save(records).unwrap_err();
        assert!(matches!(err, SaveError::Backend(BackendError::Other(_))));
        assert_eq!(*store.backend().writes.borrow(), 2);

        let blob = store.backend().get(DEFAULT_STORAGE_KEY).unwrap();
        assert_eq!(blob.as_deref(), Some(r#"[{"id":"rec-1"}]"#));
    }
}
