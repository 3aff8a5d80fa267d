//! On-disk inventory cache
//!
//! Holds the last built document as JSON. Freshness is judged from the file's
//! modification time. No locking is done: concurrent runs writing the same
//! file race and the last writer wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::document::InventoryDocument;
use crate::error::CacheError;

/// Cached inventory snapshot
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Create a cache backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last write time of the cache file
    #[must_use]
    pub fn modified_at(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    /// Check if the cache file exists and is at most `max_age` old
    #[must_use]
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        self.is_fresh_at(SystemTime::now(), max_age)
    }

    /// Freshness relative to `now`
    #[must_use]
    pub fn is_fresh_at(&self, now: SystemTime, max_age: Duration) -> bool {
        let Some(modified) = self.modified_at() else {
            return false;
        };

        // mtime in the future counts as age zero
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        age <= max_age
    }

    /// Read the cached document
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable or not a document
    pub fn try_load(&self) -> Result<InventoryDocument, CacheError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read the cached document, logging failures as a cache miss
    #[must_use]
    pub fn load(&self) -> Option<InventoryDocument> {
        match self.try_load() {
            Ok(document) => {
                debug!(path = %self.path.display(), "inventory served from cache");
                Some(document)
            }
            Err(e) => {
                warn!(error = %e, "failed to read inventory cache, rebuilding");
                None
            }
        }
    }

    /// Write `document` to the cache file
    ///
    /// # Errors
    /// Returns an error if the document cannot be serialized or written
    pub fn save(&self, document: &InventoryDocument) -> Result<(), CacheError> {
        let io_err = |source: std::io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = document.to_json()?;
        std::fs::write(&self.path, content).map_err(io_err)?;

        let written_at: Option<DateTime<Utc>> = self.modified_at().map(DateTime::from);
        info!(
            path = %self.path.display(),
            written_at = ?written_at,
            "inventory cache written"
        );
        Ok(())
    }

    /// Delete the cache file, logging failures
    pub fn invalidate(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "inventory cache invalidated"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to delete inventory cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> InventoryDocument {
        let mut doc = InventoryDocument::new();
        doc.add_group_member("esxi", "esx1");
        doc.set_host_var("esx1", "ansible_host", json!("10.0.0.1"));
        doc
    }

    #[test]
    fn test_missing_cache_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("inventory.json"));

        assert!(!cache.is_fresh(Duration::from_secs(3600)));
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("nested/inventory.json"));

        cache.save(&document()).unwrap();

        assert!(cache.is_fresh(Duration::from_secs(3600)));
        assert_eq!(cache.load().unwrap(), document());
    }

    #[test]
    fn test_age_limit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("inventory.json"));
        cache.save(&document()).unwrap();

        let later = SystemTime::now() + Duration::from_secs(7200);
        assert!(!cache.is_fresh_at(later, Duration::from_secs(3600)));
        assert!(cache.is_fresh_at(later, Duration::from_secs(10800)));
    }

    #[test]
    fn test_invalidate_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("inventory.json"));
        cache.save(&document()).unwrap();

        cache.invalidate();

        assert!(!cache.path().exists());
        assert!(!cache.is_fresh(Duration::from_secs(3600)));
        // second delete is a no-op
        cache.invalidate();
    }

    #[test]
    fn test_corrupt_cache_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("inventory.json"));
        std::fs::write(cache.path(), "{ truncated").unwrap();

        assert!(matches!(cache.try_load(), Err(CacheError::Serialize(_))));
        assert!(cache.load().is_none());
    }
}
