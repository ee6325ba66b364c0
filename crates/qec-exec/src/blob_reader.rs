//! The blob reader operator (§4.5).
//!
//! Drives partition discovery (via a `PartitionScheme`), lists and
//! classifies blobs (via a `StorageAdapter`), and on `execute()` fans the
//! read+decode of each partition's surviving blobs out across the
//! parallel pipeline in `qec_storage::pipeline`, reconciling each batch's
//! schema and metadata against the reader's working schema as it goes.
//!
//! Construction itself runs the scanner: a dataset with no surviving
//! DATA blobs across any partition fails at `new()`, not on the first
//! pull of the stream.

use std::sync::Arc;

use chrono::NaiveDate;

use qec_core::{normalize_types, Batch, BatchStream, Hints, PlanOperator, ProducerArity, QecError, Result, Statistics, TableMeta};
use qec_storage::{lookup_extension, BlobCache, Decoder, ExtensionKind, PartitionScheme, ReadTask, StorageAdapter};

/// One surviving partition: its path, and the sorted `(path, decoder)`
/// pairs of DATA blobs found in it.
#[derive(Clone)]
struct ScannedPartition {
    path: String,
    blobs: Vec<(String, Decoder)>,
}

pub struct BlobReaderOperator {
    dataset: String,
    alias: Option<String>,
    projection: Option<Vec<String>>,
    no_push_projection: bool,
    adapter: Arc<dyn StorageAdapter>,
    cache: Option<Arc<dyn BlobCache>>,
    max_cache_item_bytes: usize,
    statistics: Arc<Statistics>,
    producers: Vec<Arc<dyn PlanOperator>>,
    scanned: Vec<ScannedPartition>,
}

impl BlobReaderOperator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dataset: impl Into<String>,
        alias: Option<String>,
        hints: Hints,
        start_date: NaiveDate,
        end_date: NaiveDate,
        projection: Option<Vec<String>>,
        adapter: Arc<dyn StorageAdapter>,
        cache: Option<Arc<dyn BlobCache>>,
        partition_scheme: Arc<dyn PartitionScheme>,
        statistics: Arc<Statistics>,
    ) -> Result<Self> {
        Self::with_cache_limit(
            dataset,
            alias,
            hints,
            start_date,
            end_date,
            projection,
            adapter,
            cache,
            qec_storage::MAX_SIZE_SINGLE_CACHE_ITEM,
            partition_scheme,
            statistics,
        )
    }

    /// As `new`, but with an explicit per-item cache admission cap
    /// (`QecConfig::max_cache_item_bytes`) instead of the built-in default.
    #[allow(clippy::too_many_arguments)]
    pub fn with_cache_limit(
        dataset: impl Into<String>,
        alias: Option<String>,
        hints: Hints,
        start_date: NaiveDate,
        end_date: NaiveDate,
        projection: Option<Vec<String>>,
        adapter: Arc<dyn StorageAdapter>,
        cache: Option<Arc<dyn BlobCache>>,
        max_cache_item_bytes: usize,
        partition_scheme: Arc<dyn PartitionScheme>,
        statistics: Arc<Statistics>,
    ) -> Result<Self> {
        let dataset = dataset.into();
        let scanned = scan(&dataset, &hints, start_date, end_date, adapter.as_ref(), partition_scheme.as_ref(), &statistics)?;
        Ok(Self {
            dataset,
            alias,
            projection,
            no_push_projection: hints.no_push_projection,
            adapter,
            cache,
            max_cache_item_bytes,
            statistics,
            producers: Vec::new(),
            scanned,
        })
    }
}

/// Run the scanner (§4.5: "on construction, invokes the scanner"):
/// obtain candidate partitions, list and classify each one's blobs, and
/// fail with `DatasetNotFoundError` if none survive with any DATA blobs.
#[allow(clippy::too_many_arguments)]
fn scan(
    dataset: &str,
    hints: &Hints,
    start_date: NaiveDate,
    end_date: NaiveDate,
    adapter: &dyn StorageAdapter,
    partition_scheme: &dyn PartitionScheme,
    statistics: &Statistics,
) -> Result<Vec<ScannedPartition>> {
    let partitions = if hints.no_partition {
        vec![dataset.to_string()]
    } else {
        partition_scheme.render_partitions(dataset, start_date, end_date)
    };
    Statistics::add(&statistics.partitions_found, partitions.len() as u64);

    let mut surviving = Vec::new();
    for partition in partitions {
        Statistics::inc(&statistics.partitions_scanned);

        let scan_start = std::time::Instant::now();
        let mut blob_list = adapter.get_blob_list(&partition)?;
        Statistics::add_time(&statistics.time_scanning_partitions, scan_start.elapsed().as_nanos() as u64);

        blob_list.retain(|b| !b.ends_with('/'));
        Statistics::add(&statistics.count_blobs_found, blob_list.len() as u64);
        let found = blob_list.len();

        if hints.no_partition {
            // default scheme semantics: no frame filtering
        } else {
            blob_list = partition_scheme.filter_blobs(blob_list, statistics);
        }
        let ignored = found - blob_list.len();
        Statistics::add(&statistics.count_blobs_ignored_frames, ignored as u64);

        let mut data_blobs = Vec::new();
        for blob_name in blob_list {
            let extension = blob_name.rsplit('.').next().unwrap_or("");
            match lookup_extension(extension) {
                Some((decoder, ExtensionKind::Data)) => data_blobs.push((blob_name, decoder)),
                Some((_, ExtensionKind::Control)) => {
                    Statistics::inc(&statistics.count_control_blobs_found);
                }
                None => {
                    Statistics::inc(&statistics.count_unknown_blob_type_found);
                }
            }
        }

        if !data_blobs.is_empty() {
            data_blobs.sort_by(|a, b| a.0.cmp(&b.0));
            surviving.push(ScannedPartition { path: partition, blobs: data_blobs });
        }
    }

    if surviving.is_empty() {
        return Err(QecError::DatasetNotFound(dataset.to_string()));
    }
    Ok(surviving)
}

/// Re-apply the working table metadata to a later batch, keyed by the
/// blob path it was decoded from (§4.5 step 2). Fails if the batch is
/// missing one of the columns the working schema established.
fn reapply_table_metadata(batch: Batch, names: &[String], table: &TableMeta) -> Result<Batch> {
    let schema = batch.schema();
    for name in names {
        schema.index_of(name).map_err(|_| {
            QecError::Decode(format!(
                "column '{name}' missing while re-applying metadata for dataset {}",
                table.dataset_name
            ))
        })?;
    }
    Ok(batch.with_table_meta(table.clone()))
}

impl PlanOperator for BlobReaderOperator {
    fn name(&self) -> &'static str {
        "Blob Reader"
    }

    fn config(&self) -> String {
        let cache_note = if self.cache.is_none() { " (NO_CACHE)" } else { "" };
        match &self.alias {
            Some(alias) => format!("{} => {alias}{cache_note}", self.dataset),
            None => format!("{}{cache_note}", self.dataset),
        }
    }

    fn expected_producers(&self) -> ProducerArity {
        ProducerArity::Exactly(0)
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let partitions = self.scanned.clone();

        let projection = if self.no_push_projection { None } else { self.projection.clone() };
        let dataset_name = self.dataset.clone();
        let alias = self.alias.clone();
        let adapter = Arc::clone(&self.adapter);
        let cache = self.cache.clone();
        let max_cache_item_bytes = self.max_cache_item_bytes;
        let statistics = Arc::clone(&self.statistics);

        let mut output: Vec<Result<Batch>> = Vec::new();
        let mut working_schema: Option<Vec<String>> = None;
        let mut working_table: Option<TableMeta> = None;
        let mut row_count_estimate: Option<usize> = None;

        for partition in partitions {
            Statistics::inc(&statistics.partitions_read);
            let surviving_blob_count = partition.blobs.len();

            let reader = {
                let adapter = Arc::clone(&adapter);
                move |path: &str| adapter.read_blob(path)
            };
            let tasks: Vec<ReadTask<'_>> = partition
                .blobs
                .iter()
                .map(|(path, decoder)| ReadTask {
                    path: path.clone(),
                    decoder: *decoder,
                    projection: projection.as_deref(),
                })
                .collect();

            let cache_ref = cache.as_deref();
            let mut results = qec_storage::read_and_decode(tasks, &reader, cache_ref, max_cache_item_bytes, &statistics);
            results.sort_by(|a, b| a.path.cmp(&b.path));

            for result in results {
                Statistics::inc(&statistics.count_data_blobs_read);
                Statistics::add(&statistics.bytes_read_data, result.blob_bytes as u64);
                Statistics::add_time(&statistics.time_data_read, result.elapsed_ns);
                Statistics::add(&statistics.rows_read, result.batch.num_rows() as u64);

                let mut batch = Batch::new(result.batch).with_source_path(&result.path);
                Statistics::add(&statistics.bytes_processed_data, batch.byte_size() as u64);

                if row_count_estimate.is_none() {
                    row_count_estimate = Some(batch.num_rows() * surviving_blob_count);
                }

                if working_schema.is_none() {
                    let table = TableMeta {
                        dataset_name: dataset_name.trim_end_matches('/').replace('/', "."),
                        aliases: alias.clone().into_iter().collect(),
                        estimated_row_count: row_count_estimate,
                    };
                    batch = batch.with_table_meta(table.clone());
                    working_schema = Some(batch.column_names());
                    working_table = Some(table);
                    Statistics::add(&statistics.columns_read, batch.num_columns() as u64);
                } else {
                    let names = working_schema.as_ref().unwrap();
                    let table = working_table.as_ref().unwrap();

                    batch = match reapply_table_metadata(batch.clone(), names, table) {
                        Ok(b) => b,
                        Err(_) => {
                            Statistics::inc(&statistics.read_errors);
                            statistics.warn(format!(
                                "metadata re-apply failed for {}, materializing and retrying",
                                result.path
                            ));
                            let materialized = match Batch::concat(std::slice::from_ref(&batch)) {
                                Ok(b) => b,
                                Err(e) => {
                                    output.push(Err(e));
                                    continue;
                                }
                            };
                            match reapply_table_metadata(materialized, names, table) {
                                Ok(b) => b,
                                Err(e) => {
                                    output.push(Err(e));
                                    continue;
                                }
                            }
                        }
                    };

                    match batch.select_columns(names) {
                        Ok(b) => batch = b,
                        Err(e) => {
                            output.push(Err(e));
                            continue;
                        }
                    }
                }

                match normalize_types(batch) {
                    Ok(normalized) => output.push(Ok(normalized)),
                    Err(e) => output.push(Err(e)),
                }
            }
        }

        Box::new(output.into_iter())
    }
}
