//! The columnar batch abstraction (§3 "Batch").
//!
//! A `Batch` pairs an Arrow `RecordBatch` with the per-column and per-table
//! metadata the rest of the engine needs: display names, the table alias a
//! column came from, and (for reader-produced batches) the source blob path
//! a column's values were read from. Batches are immutable — every operator
//! in `qec-exec` produces a new `Batch` rather than mutating one in place.

use std::sync::Arc;

use arrow_array::{RecordBatch, UInt32Array};
use arrow_schema::SchemaRef;
use arrow_select::{concat::concat_batches, take::take};

use crate::error::{QecError, Result};

/// Metadata carried for a single column, independent of its Arrow `Field`.
#[derive(Debug, Clone, Default)]
pub struct ColumnMeta {
    /// The name the client should see (may differ from the Arrow field name
    /// after a projection rename).
    pub display_name: String,
    /// Alias of the table this column came from, for `t.*` style filtering
    /// and collision resolution in joins.
    pub source_table: Option<String>,
    /// Path of the blob this column's values were decoded from, used to
    /// re-key metadata application for subsequent batches from a reader.
    pub source_path: Option<String>,
}

/// Metadata attached once, to the first batch a reader produces.
#[derive(Debug, Clone)]
pub struct TableMeta {
    pub dataset_name: String,
    pub aliases: Vec<String>,
    pub estimated_row_count: Option<usize>,
}

/// An immutable columnar batch with an ordered schema and row count.
///
/// Invariant: every column in `record_batch` has the same length; this is
/// enforced by `arrow_array::RecordBatch::try_new` at construction time.
#[derive(Debug, Clone)]
pub struct Batch {
    record_batch: RecordBatch,
    columns: Vec<ColumnMeta>,
    table: Option<TableMeta>,
}

impl Batch {
    /// Wrap a `RecordBatch`, defaulting column metadata from the schema.
    pub fn new(record_batch: RecordBatch) -> Self {
        let columns = record_batch
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnMeta {
                display_name: f.name().clone(),
                source_table: None,
                source_path: None,
            })
            .collect();
        Self {
            record_batch,
            columns,
            table: None,
        }
    }

    pub fn from_parts(record_batch: RecordBatch, columns: Vec<ColumnMeta>, table: Option<TableMeta>) -> Self {
        Self { record_batch, columns, table }
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.record_batch
    }

    pub fn into_record_batch(self) -> RecordBatch {
        self.record_batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.record_batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.record_batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.record_batch.num_columns()
    }

    /// Approximate in-memory footprint, used for the statistics record's
    /// `bytes_processed_data` counter.
    pub fn byte_size(&self) -> usize {
        self.record_batch.get_array_memory_size()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.record_batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn column_meta(&self, idx: usize) -> Option<&ColumnMeta> {
        self.columns.get(idx)
    }

    pub fn columns_meta(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn table_meta(&self) -> Option<&TableMeta> {
        self.table.as_ref()
    }

    pub fn with_table_meta(mut self, table: TableMeta) -> Self {
        for c in &mut self.columns {
            c.source_table = table.aliases.first().cloned().or(Some(table.dataset_name.clone()));
        }
        self.table = Some(table);
        self
    }

    /// Re-apply metadata to a later batch from the same reader, keyed by
    /// the blob path it was decoded from (§4.5 step 2).
    pub fn with_source_path(mut self, path: &str) -> Self {
        for c in &mut self.columns {
            c.source_path = Some(path.to_string());
        }
        self
    }

    /// Row-index selection; `indices` must be in-bounds.
    pub fn take_rows(&self, indices: &UInt32Array) -> Result<Batch> {
        let mut arrays = Vec::with_capacity(self.record_batch.num_columns());
        for col in self.record_batch.columns() {
            arrays.push(take(col.as_ref(), indices, None)?);
        }
        let rb = RecordBatch::try_new(self.record_batch.schema(), arrays)?;
        Ok(Batch::from_parts(rb, self.columns.clone(), self.table.clone()))
    }

    /// Project down to the subset of `names` present in this batch's
    /// schema, preserving the order `names` gives (used both for SELECT
    /// projection and for reconciling a reader batch's schema against the
    /// first batch's schema, per §3).
    pub fn select_columns(&self, names: &[String]) -> Result<Batch> {
        let schema = self.record_batch.schema();
        let mut arrays = Vec::new();
        let mut fields = Vec::new();
        let mut columns = Vec::new();
        for name in names {
            if let Ok(idx) = schema.index_of(name) {
                arrays.push(Arc::clone(self.record_batch.column(idx)));
                fields.push(schema.field(idx).clone());
                columns.push(self.columns[idx].clone());
            }
        }
        let new_schema = Arc::new(arrow_schema::Schema::new(fields));
        let rb = RecordBatch::try_new(new_schema, arrays)?;
        Ok(Batch::from_parts(rb, columns, self.table.clone()))
    }

    /// Concatenate same-schema batches into one (used by Sort/Aggregate/
    /// Distinct, which must materialize their whole input first).
    pub fn concat(batches: &[Batch]) -> Result<Batch> {
        if batches.is_empty() {
            return Err(QecError::InvalidPlan("concat of zero batches".into()));
        }
        if batches.len() == 1 {
            return Ok(batches[0].clone());
        }
        let schema = batches[0].schema();
        let record_batches: Vec<RecordBatch> = batches.iter().map(|b| b.record_batch.clone()).collect();
        let rb = concat_batches(&schema, &record_batches)?;
        Ok(Batch::from_parts(rb, batches[0].columns.clone(), batches[0].table.clone()))
    }
}
