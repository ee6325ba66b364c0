//! Schema normalization applied to every batch on ingress (§3).
//!
//! Temporal columns are widened to a single canonical type so that batches
//! decoded from different file formats (parquet's `timestamp[ms]`, feather's
//! `date32`, ...) line up, and empty-typed list columns are widened to
//! `list<string>` so that an empty list column from one blob doesn't clash
//! with a populated `list<string>` column from another.

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_cast::cast::cast;
use arrow_schema::{DataType, Field, Schema, TimeUnit};

use crate::batch::Batch;
use crate::error::Result;

fn needs_timestamp_normalization(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Date32
            | DataType::Date64
            | DataType::Timestamp(TimeUnit::Second, _)
            | DataType::Timestamp(TimeUnit::Millisecond, _)
    )
}

fn needs_list_normalization(dt: &DataType) -> bool {
    matches!(dt, DataType::List(f) if matches!(f.data_type(), DataType::Null))
}

/// Cast `date32`/`date64`/`timestamp[s]`/`timestamp[ms]` columns to
/// `timestamp[µs]` and `list<null>` columns to `list<string>`.
pub fn normalize_types(batch: Batch) -> Result<Batch> {
    let schema = batch.schema();
    if !schema
        .fields()
        .iter()
        .any(|f| needs_timestamp_normalization(f.data_type()) || needs_list_normalization(f.data_type()))
    {
        return Ok(batch);
    }

    let record_batch = batch.record_batch().clone();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut arrays = Vec::with_capacity(schema.fields().len());

    for (idx, field) in schema.fields().iter().enumerate() {
        let array = record_batch.column(idx);
        if needs_timestamp_normalization(field.data_type()) {
            let target = DataType::Timestamp(TimeUnit::Microsecond, None);
            let casted = cast(array.as_ref(), &target)?;
            fields.push(Arc::new(Field::new(field.name(), target, field.is_nullable())));
            arrays.push(casted);
        } else if needs_list_normalization(field.data_type()) {
            let target = DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)));
            let casted = cast(array.as_ref(), &target)?;
            fields.push(Arc::new(Field::new(field.name(), target, field.is_nullable())));
            arrays.push(casted);
        } else {
            fields.push(field.clone());
            arrays.push(Arc::clone(array));
        }
    }

    let new_schema = Arc::new(Schema::new(fields));
    let new_record_batch = RecordBatch::try_new(new_schema, arrays)?;
    Ok(Batch::from_parts(
        new_record_batch,
        batch.columns_meta().to_vec(),
        batch.table_meta().cloned(),
    ))
}
