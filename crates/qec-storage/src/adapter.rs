//! The storage adapter contract (§4.4 "Storage-adapter contract").
//!
//! `StorageAdapter` is an external collaborator the blob reader drives: it
//! knows how to enumerate partitions and blobs and fetch a blob's raw
//! bytes, but nothing about decoding or partition-scheme semantics. Two
//! implementations ship here: a local-disk adapter (glob-based, mirroring
//! the teacher's CSV source) and an in-memory adapter for tests.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::warn;

use qec_core::{QecError, Result};

pub trait StorageAdapter: Send + Sync {
    /// Expand `dataset` into the partition paths that exist between
    /// `start_date` and `end_date`, honoring `partition_format` when the
    /// adapter supports server-side date filtering (neither adapter here
    /// does; both defer entirely to the partition scheme's own rendering).
    fn get_partitions(
        &self,
        dataset: &str,
        partition_format: Option<&str>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<String>>;

    /// List every blob under a partition path, including directory
    /// markers (paths ending in `/`); the caller strips those.
    fn get_blob_list(&self, partition: &str) -> Result<Vec<String>>;

    /// Fetch a blob's raw bytes.
    fn read_blob(&self, path: &str) -> Result<Vec<u8>>;
}

/// Reads blobs from the local filesystem, rooted at a configurable base
/// directory. Partitions are globbed directly from disk rather than
/// queried from an index.
pub struct LocalDiskAdapter {
    root: std::path::PathBuf,
}

impl LocalDiskAdapter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn full_path(&self, rel: &str) -> std::path::PathBuf {
        self.root.join(rel)
    }
}

impl StorageAdapter for LocalDiskAdapter {
    fn get_partitions(
        &self,
        dataset: &str,
        _partition_format: Option<&str>,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<String>> {
        let base = self.full_path(dataset);
        if !base.exists() {
            return Ok(Vec::new());
        }
        Ok(vec![dataset.to_string()])
    }

    fn get_blob_list(&self, partition: &str) -> Result<Vec<String>> {
        let pattern = self.full_path(partition).join("**").join("*");
        let pattern = pattern.to_string_lossy().to_string();
        let mut blobs = Vec::new();
        for entry in glob::glob(&pattern).map_err(|e| QecError::Storage(format!("glob: {e}")))? {
            match entry {
                Ok(path) => {
                    let rel = path
                        .strip_prefix(&self.root)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .to_string();
                    if path.is_dir() {
                        blobs.push(format!("{rel}/"));
                    } else {
                        blobs.push(rel);
                    }
                }
                Err(e) => warn!(error = %e, "glob entry error"),
            }
        }
        Ok(blobs)
    }

    fn read_blob(&self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(self.full_path(path)).map_err(|e| QecError::Storage(format!("{path}: {e}")))
    }
}

/// An in-memory storage adapter: partitions and blobs are supplied up
/// front as a flat path → bytes map. Useful for tests and the sample
/// datasets, which need a `StorageAdapter` but have no real blobs.
#[derive(Debug, Default)]
pub struct InMemoryAdapter {
    blobs: HashMap<String, Vec<u8>>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.blobs.insert(path.into(), bytes);
        self
    }
}

impl StorageAdapter for InMemoryAdapter {
    fn get_partitions(
        &self,
        dataset: &str,
        _partition_format: Option<&str>,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<String>> {
        if self.blobs.keys().any(|p| p.starts_with(dataset)) {
            Ok(vec![dataset.to_string()])
        } else {
            Ok(Vec::new())
        }
    }

    fn get_blob_list(&self, partition: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .keys()
            .filter(|p| p.starts_with(partition))
            .cloned()
            .collect())
    }

    fn read_blob(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(path)
            .cloned()
            .ok_or_else(|| QecError::Storage(format!("no such blob: {path}")))
    }
}
