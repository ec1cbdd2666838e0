// Directory-backed storage: one JSON file per key

use crate::backend::{BackendError, StorageBackend};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = ".lock";
const VALUE_EXT: &str = "json";

/// Persistent backend storing each key as `<dir>/<key>.json`.
///
/// Writes go to a temp file that is renamed over the target, under an
/// exclusive lock, so a failed write leaves the previous value intact.
/// An optional quota caps the total bytes of all value files in the
/// directory.
#[derive(Debug)]
pub struct FileBackend {
    base_path: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileBackend {
    /// Open or create a backend rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            quota_bytes: None,
        })
    }

    /// Limit total stored bytes, emulating a browser storage quota
    pub fn with_quota(mut self, quota_bytes: Option<usize>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Get the base path of this backend
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn value_path(&self, key: &str) -> Result<PathBuf, BackendError> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.{}", key, VALUE_EXT)))
    }

    fn lock(&self) -> Result<File, BackendError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    /// Bytes used by value files other than `except`
    fn used_bytes(&self, except: &Path) -> Result<usize, BackendError> {
        let mut used = 0;
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path == except || path.extension().and_then(|s| s.to_str()) != Some(VALUE_EXT) {
                continue;
            }
            used += fs::metadata(&path)?.len() as usize;
        }
        Ok(used)
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let path = self.value_path(key)?;

        // Lock is released when the guard is dropped
        let _guard = self.lock()?;

        if let Some(quota) = self.quota_bytes {
            let needed = value.len();
            let available = quota.saturating_sub(self.used_bytes(&path)?);
            if needed > available {
                debug!(key, needed, available, "FileBackend::set: over quota");
                return Err(BackendError::QuotaExceeded { needed, available });
            }
        }

        let tmp_path = path.with_extension(format!("{}.tmp", VALUE_EXT));
        let result = write_and_sync(&tmp_path, value).and_then(|_| fs::rename(&tmp_path, &path));
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(classify_io(e, value.len()));
        }

        debug!(key, bytes = value.len(), "FileBackend::set: written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        let path = self.value_path(key)?;
        let _guard = self.lock()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_and_sync(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

/// A full disk is the filesystem's version of a quota error
fn classify_io(e: std::io::Error, needed: usize) -> BackendError {
    match e.kind() {
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded => BackendError::QuotaExceeded { needed, available: 0 },
        _ => BackendError::Io(e),
    }
}

/// Keys become file names, so keep them to a safe character set
fn validate_key(key: &str) -> Result<(), BackendError> {
    if key.is_empty() {
        return Err(BackendError::Other("Storage key cannot be empty".to_string()));
    }
    if key.len() > 64 {
        return Err(BackendError::Other(format!("Storage key too long: {} (max 64 chars)", key)));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(BackendError::Other(format!(
            "Invalid storage key: {} (must be alphanumeric with _/-)",
            key
        )));
    }
    Ok(())
}
