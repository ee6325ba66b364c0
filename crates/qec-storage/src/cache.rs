//! The blob cache (§4.2 "Blob cache").
//!
//! Blobs are keyed by a content hash of their path, rendered as uppercase
//! hex, the same keying scheme the reference reader uses (`CityHash64`
//! there; `fnv_rs`'s 64-bit FNV-1a here — both are non-cryptographic,
//! fixed-width hashes, and nothing in this engine depends on the specific
//! algorithm). Items at or above `MAX_SIZE_SINGLE_CACHE_ITEM` are never
//! admitted; a cache transport failure on `get`/`set` degrades to a miss
//! rather than failing the read (§4.2, §5 "Shared-resource policy").

use std::collections::HashMap;
use std::sync::Mutex;

use fnv_rs::{Fnv64, FnvHasher};

/// Items this large or larger are never written to the cache.
pub const MAX_SIZE_SINGLE_CACHE_ITEM: usize = 32 * 1024 * 1024;

/// Hash a blob path into its cache key, matching the reference reader's
/// `format(CityHash64(path), "X")` rendering (uppercase hex, no prefix).
pub fn cache_key(path: &str) -> String {
    let digest = Fnv64::hash(path.as_bytes());
    let bytes = digest.as_bytes();
    let mut value: u64 = 0;
    for b in bytes.iter().take(8) {
        value = (value << 8) | (*b as u64);
    }
    format!("{:X}", value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    /// The blob was too large to admit after a miss.
    Oversize,
    /// The cache transport failed; treat as a miss and continue uncached.
    Error,
}

/// A blob cache keyed by content hash. Implementations must be `Send +
/// Sync` so a cache can be shared across the parallel decode workers in
/// `pipeline.rs`.
pub trait BlobCache: Send + Sync {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, String>;
    fn set(&self, key: &str, bytes: Vec<u8>) -> std::result::Result<(), String>;
}

/// An in-process cache, suitable for a single-node engine instance or
/// tests. Production deployments would swap in a networked cache behind
/// the same trait without changing the reader.
#[derive(Debug, Default)]
pub struct InMemoryBlobCache {
    items: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobCache for InMemoryBlobCache {
    fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, String> {
        Ok(self.items.lock().expect("cache mutex poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, bytes: Vec<u8>) -> std::result::Result<(), String> {
        self.items
            .lock()
            .expect("cache mutex poisoned")
            .insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Try to admit `bytes` under `key`, classifying the outcome for the
/// statistics record (§4.2, `cache_oversize`/`cache_errors`). `max_item_bytes`
/// is normally `MAX_SIZE_SINGLE_CACHE_ITEM`, but callers configured with a
/// smaller `QecConfig::max_cache_item_bytes` cap pass that instead.
pub fn try_admit(cache: &dyn BlobCache, key: &str, bytes: &[u8], max_item_bytes: usize) -> CacheOutcome {
    if bytes.len() >= max_item_bytes {
        return CacheOutcome::Oversize;
    }
    match cache.set(key, bytes.to_vec()) {
        Ok(()) => CacheOutcome::Miss,
        Err(_) => CacheOutcome::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        assert_eq!(cache_key("a/b/c.parquet"), cache_key("a/b/c.parquet"));
        assert_ne!(cache_key("a/b/c.parquet"), cache_key("a/b/d.parquet"));
    }

    #[test]
    fn cache_key_is_uppercase_hex() {
        let key = cache_key("some/blob/path.parquet");
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn in_memory_cache_round_trips() {
        let cache = InMemoryBlobCache::new();
        assert!(cache.get("K").unwrap().is_none());
        cache.set("K", vec![1, 2, 3]).unwrap();
        assert_eq!(cache.get("K").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn oversize_item_is_rejected_before_admission() {
        let cache = InMemoryBlobCache::new();
        let big = vec![0u8; MAX_SIZE_SINGLE_CACHE_ITEM];
        assert_eq!(try_admit(&cache, "K", &big, MAX_SIZE_SINGLE_CACHE_ITEM), CacheOutcome::Oversize);
        assert!(cache.get("K").unwrap().is_none());
    }

    #[test]
    fn undersize_item_is_admitted() {
        let cache = InMemoryBlobCache::new();
        assert_eq!(try_admit(&cache, "K", &[1, 2, 3], MAX_SIZE_SINGLE_CACHE_ITEM), CacheOutcome::Miss);
        assert_eq!(cache.get("K").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn a_configured_lower_cap_rejects_items_the_default_would_admit() {
        let cache = InMemoryBlobCache::new();
        assert_eq!(try_admit(&cache, "K", &[1, 2, 3, 4], 4), CacheOutcome::Oversize);
    }
}
