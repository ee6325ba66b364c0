//! The statistics record (§3 "Statistics record", §5 "Shared-resource
//! policy").
//!
//! One `Statistics` is created per query and handed by reference to every
//! operator and worker thread involved in executing it; all counters are
//! atomics so parallel blob decode (§4.6) can update them without a lock.
//! Time fields are accumulated in nanoseconds and converted to seconds only
//! when a `StatisticsSnapshot` is taken for the client (§6).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

macro_rules! atomic_counters {
    ($($name:ident),* $(,)?) => {
        #[derive(Debug, Default)]
        pub struct Statistics {
            $(pub $name: AtomicU64,)*
            warnings: Mutex<Vec<String>>,
        }
    };
}

atomic_counters! {
    count_blobs_found,
    count_data_blobs_read,
    count_non_data_blobs_read,
    count_blobs_ignored_frames,
    count_control_blobs_found,
    count_unknown_blob_type_found,
    read_errors,
    bytes_read_control,
    bytes_read_data,
    bytes_processed_data,
    rows_read,
    columns_read,
    partitions_found,
    partitions_scanned,
    partitions_read,
    segments_scanned,
    collections_read,
    document_pages,
    page_splits,
    page_merges,
    cache_hits,
    cache_misses,
    cache_oversize,
    cache_errors,
    // time fields, nanoseconds internally
    time_data_read,
    time_scanning_partitions,
    time_planning,
    time_selecting,
    time_aggregating,
    time_ordering,
    start_time,
    end_time,
}

/// Client-facing snapshot: counters as-is, time fields converted to
/// seconds (§6 "Statistics output").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatisticsSnapshot {
    pub count_blobs_found: u64,
    pub count_data_blobs_read: u64,
    pub count_non_data_blobs_read: u64,
    pub count_blobs_ignored_frames: u64,
    pub count_control_blobs_found: u64,
    pub count_unknown_blob_type_found: u64,
    pub read_errors: u64,
    pub bytes_read_control: u64,
    pub bytes_read_data: u64,
    pub bytes_processed_data: u64,
    pub rows_read: u64,
    pub columns_read: u64,
    pub partitions_found: u64,
    pub partitions_scanned: u64,
    pub partitions_read: u64,
    pub segments_scanned: u64,
    pub collections_read: u64,
    pub document_pages: u64,
    pub page_splits: u64,
    pub page_merges: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_oversize: u64,
    pub cache_errors: u64,
    pub time_data_read: f64,
    pub time_scanning_partitions: f64,
    pub time_planning: f64,
    pub time_selecting: f64,
    pub time_aggregating: f64,
    pub time_ordering: f64,
    pub time_total: f64,
    pub warnings: Vec<String>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary count to a counter, e.g. a blob-list length.
    pub fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub fn inc(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    pub fn add_time(counter: &AtomicU64, nanos: u64) {
        Self::add(counter, nanos);
    }

    /// Record a (deduplicated) warning surfaced to the client.
    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        let mut warnings = self.warnings.lock().expect("warnings mutex poisoned");
        if !warnings.contains(&text) {
            warnings.push(text);
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().expect("warnings mutex poisoned").is_empty()
    }

    fn ns_to_s(nanos: u64) -> f64 {
        if nanos == 0 {
            0.0
        } else {
            nanos as f64 / 1e9
        }
    }

    /// Take a point-in-time read of every counter, converting the
    /// nanosecond time fields to seconds as the client-facing record does.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatisticsSnapshot {
            count_blobs_found: load(&self.count_blobs_found),
            count_data_blobs_read: load(&self.count_data_blobs_read),
            count_non_data_blobs_read: load(&self.count_non_data_blobs_read),
            count_blobs_ignored_frames: load(&self.count_blobs_ignored_frames),
            count_control_blobs_found: load(&self.count_control_blobs_found),
            count_unknown_blob_type_found: load(&self.count_unknown_blob_type_found),
            read_errors: load(&self.read_errors),
            bytes_read_control: load(&self.bytes_read_control),
            bytes_read_data: load(&self.bytes_read_data),
            bytes_processed_data: load(&self.bytes_processed_data),
            rows_read: load(&self.rows_read),
            columns_read: load(&self.columns_read),
            partitions_found: load(&self.partitions_found),
            partitions_scanned: load(&self.partitions_scanned),
            partitions_read: load(&self.partitions_read),
            segments_scanned: load(&self.segments_scanned),
            collections_read: load(&self.collections_read),
            document_pages: load(&self.document_pages),
            page_splits: load(&self.page_splits),
            page_merges: load(&self.page_merges),
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            cache_oversize: load(&self.cache_oversize),
            cache_errors: load(&self.cache_errors),
            time_data_read: Self::ns_to_s(load(&self.time_data_read)),
            time_scanning_partitions: Self::ns_to_s(load(&self.time_scanning_partitions)),
            time_planning: Self::ns_to_s(load(&self.time_planning)),
            time_selecting: Self::ns_to_s(load(&self.time_selecting)),
            time_aggregating: Self::ns_to_s(load(&self.time_aggregating)),
            time_ordering: Self::ns_to_s(load(&self.time_ordering)),
            time_total: Self::ns_to_s(load(&self.end_time).saturating_sub(load(&self.start_time))),
            warnings: self.warnings.lock().expect("warnings mutex poisoned").clone(),
        }
    }
}
