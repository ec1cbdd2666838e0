// Key/value storage boundary

use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by a storage backend.
///
/// Callers branch on `QuotaExceeded` to run eviction; everything else is fatal.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Other(String),
}

impl BackendError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BackendError::QuotaExceeded { .. })
    }
}

/// Abstract interface for the persistent key/value store.
///
/// One key holds one serialized document. `set` MUST be atomic: on error the
/// previous value is left intact.
pub trait StorageBackend {
    /// Read the value stored under `key`; `Ok(None)` if absent
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// Replace the value stored under `key`
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<(), BackendError>;
}

/// In-memory backend with an optional byte capacity.
///
/// Capacity counts key and value bytes across all keys, which is how browser
/// local storage accounts for quota. Uses `RefCell` since the store is
/// single-threaded.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, String>>,
    capacity: Option<usize>,
    fail_reads: RefCell<Option<String>>,
    fail_writes: RefCell<Option<String>>,
    writes: RefCell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes pushing total usage past `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Make every subsequent `get` fail with an I/O error
    pub fn set_fail_reads(&self, message: Option<&str>) {
        *self.fail_reads.borrow_mut() = message.map(str::to_string);
    }

    /// Make every subsequent `set` fail with a non-quota error
    pub fn set_fail_writes(&self, message: Option<&str>) {
        *self.fail_writes.borrow_mut() = message.map(str::to_string);
    }

    /// Number of `set` calls attempted so far
    pub fn write_attempts(&self) -> usize {
        *self.writes.borrow()
    }

    /// Bytes currently used by all keys other than `key`
    fn used_except(&self, key: &str) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        if let Some(message) = self.fail_reads.borrow().as_ref() {
            return Err(BackendError::Io(std::io::Error::other(message.clone())));
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        *self.writes.borrow_mut() += 1;

        if let Some(message) = self.fail_writes.borrow().as_ref() {
            return Err(BackendError::Other(message.clone()));
        }

        if let Some(capacity) = self.capacity {
            let needed = key.len() + value.len();
            let available = capacity.saturating_sub(self.used_except(key));
            if needed > available {
                return Err(BackendError::QuotaExceeded { needed, available });
            }
        }

        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
