//! Local response cache for version lookups
//!
//! One JSON document per package lives in the cache directory. The file's
//! mtime is the staleness clock. Each document is an object whose top-level
//! fields (`latest_version`, `versions`) are filled in independently by
//! [`ResponseCache::merge`].
//!
//! The cache is an optimization only: unreadable or corrupt entries read as
//! misses and never fail the caller.

use crate::common::PathUtils;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const LATEST_VERSION_FIELD: &str = "latest_version";
pub const VERSIONS_FIELD: &str = "versions";

const ENTRY_EXTENSION: &str = ".json";

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    output: Logger,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, output: Logger) -> Self {
        Self {
            dir: dir.into(),
            output,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `package_name`.
    ///
    /// Names are form-urlencoded, which keeps distinct names distinct and
    /// leaves case untouched.
    pub fn entry_path(&self, package_name: &str) -> PathBuf {
        let encoded: String = url::form_urlencoded::byte_serialize(package_name.as_bytes()).collect();
        self.dir.join(format!("{}{}", encoded, ENTRY_EXTENSION))
    }

    /// The stored document, if it is younger than `max_age_secs`.
    ///
    /// A stale entry stays on disk so a later read with a larger max-age can
    /// still use it.
    pub async fn get(&self, package_name: &str, max_age_secs: u64) -> Option<Value> {
        let path = self.entry_path(package_name);
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        let modified = metadata.modified().ok()?;
        // An mtime in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age >= Duration::from_secs(max_age_secs) {
            self.output.detail(&format!(
                "Cache stale for {} ({}s old)",
                package_name,
                age.as_secs()
            ));
            return None;
        }

        let document = self.read_document(&path).await?;
        self.output.detail(&format!("Cache hit for {}", package_name));
        Some(document)
    }

    /// Replace the entry for `package_name`, stamping it with the current time.
    pub async fn put(&self, package_name: &str, document: &Value) -> Result<()> {
        let path = self.entry_path(package_name);
        let body = serde_json::to_vec_pretty(document)?;
        self.write_atomic(&path, &body).await
    }

    /// Set one top-level field of the entry, keeping the others.
    ///
    /// The existing document is read regardless of its age; a missing or
    /// corrupt one starts out empty.
    pub async fn merge(&self, package_name: &str, field: &str, value: Value) -> Result<()> {
        let path = self.entry_path(package_name);
        let mut fields = match self.read_document(&path).await {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert(field.to_string(), value);
        self.put(package_name, &Value::Object(fields)).await
    }

    /// Drop the entry for one package. Missing entries are fine.
    pub async fn invalidate(&self, package_name: &str) -> Result<()> {
        let path = self.entry_path(package_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.output.detail(&format!("Cache invalidated for {}", package_name));
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RegistryError::Cache(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Remove every entry, returning how many were deleted.
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(RegistryError::Cache(format!(
                    "Failed to read cache directory {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            tokio::fs::remove_file(&path).await.map_err(|e| {
                RegistryError::Cache(format!("Failed to remove {}: {}", path.display(), e))
            })?;
            if path.to_string_lossy().ends_with(ENTRY_EXTENSION) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn read_document(&self, path: &Path) -> Option<Value> {
        let bytes = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(document) => Some(document),
            Err(e) => {
                self.output
                    .detail(&format!("Ignoring corrupt cache entry {}: {}", path.display(), e));
                None
            }
        }
    }

    // Readers see either the previous document or the new one.
    async fn write_atomic(&self, path: &Path, body: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            RegistryError::Cache(format!(
                "Failed to create cache directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let tmp = PathUtils::temp_sibling(path);
        let written = match tokio::fs::write(&tmp, body).await {
            Ok(()) => tokio::fs::rename(&tmp, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(RegistryError::Cache(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }
}
