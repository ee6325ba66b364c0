//! File decoders (§4.3 "Blob decoders" / §4.5 step 1).
//!
//! Each decoder takes a blob's raw bytes plus an optional pushed-down
//! projection (a column name list) and returns a `RecordBatch`. Decoders
//! that support column pruning at the format level (parquet) use the
//! projection to avoid reading columns the plan doesn't need; the others
//! ignore it, the same asymmetry the reference decoders have.

use std::io::Cursor;
use std::sync::Arc;

use arrow::ipc::reader::FileReader as ArrowIpcFileReader;
use arrow_array::RecordBatch;
use arrow_json::ReaderBuilder as JsonReaderBuilder;
use arrow_schema::Schema;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use qec_core::{QecError, Result};

/// Whether a filename extension names a readable data file or a sidecar
/// control marker (§4.4 "known extensions").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Data,
    Control,
}

pub type Decoder = fn(&[u8], Option<&[String]>) -> Result<RecordBatch>;

/// `complete`/`ignore` marker blobs carry no rows; reading one is a no-op.
fn control_passthrough(_bytes: &[u8], _projection: Option<&[String]>) -> Result<RecordBatch> {
    Ok(RecordBatch::new_empty(Arc::new(Schema::empty())))
}

pub fn parquet_decoder(bytes: &[u8], projection: Option<&[String]>) -> Result<RecordBatch> {
    let data = bytes::Bytes::copy_from_slice(bytes);
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(|e| QecError::Decode(format!("parquet: {e}")))?;

    if let Some(wanted) = projection {
        if !wanted.iter().any(|c| c == "*") {
            let file_schema = builder.schema().clone();
            let indices: Vec<usize> = file_schema
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| wanted.iter().any(|w| w == f.name()))
                .map(|(i, _)| i)
                .collect();
            if !indices.is_empty() {
                let mask = parquet::arrow::ProjectionMask::roots(
                    builder.parquet_schema(),
                    indices,
                );
                builder = builder.with_projection(mask);
            }
        }
    }

    let reader = builder.build().map_err(|e| QecError::Decode(format!("parquet: {e}")))?;
    let batches: Vec<RecordBatch> = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| QecError::Decode(format!("parquet: {e}")))?;
    concat_or_empty(batches)
}

pub fn arrow_decoder(bytes: &[u8], _projection: Option<&[String]>) -> Result<RecordBatch> {
    let cursor = Cursor::new(bytes);
    let reader = ArrowIpcFileReader::try_new(cursor, None)
        .map_err(|e| QecError::Decode(format!("arrow/feather: {e}")))?;
    let batches: Vec<RecordBatch> = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| QecError::Decode(format!("arrow/feather: {e}")))?;
    concat_or_empty(batches)
}

/// ORC is a recognized extension but decoding it is not implemented: the
/// only maintained Rust ORC reader pins an Arrow major version that
/// conflicts with this workspace's Arrow version.
pub fn orc_decoder(_bytes: &[u8], _projection: Option<&[String]>) -> Result<RecordBatch> {
    Err(QecError::Decode(
        "orc: no compatible decoder available in this build".into(),
    ))
}

pub fn jsonl_decoder(bytes: &[u8], _projection: Option<&[String]>) -> Result<RecordBatch> {
    decode_jsonl(bytes)
}

pub fn zstd_decoder(bytes: &[u8], projection: Option<&[String]>) -> Result<RecordBatch> {
    let decompressed =
        zstd::stream::decode_all(Cursor::new(bytes)).map_err(|e| QecError::Decode(format!("zstd: {e}")))?;
    jsonl_decoder(&decompressed, projection)
}

fn decode_jsonl(bytes: &[u8]) -> Result<RecordBatch> {
    let cursor = Cursor::new(bytes);
    let (schema, _) = arrow_json::reader::infer_json_schema_from_seekable(
        &mut Cursor::new(bytes),
        None,
    )
    .map_err(|e| QecError::Decode(format!("jsonl schema inference: {e}")))?;
    let mut reader = JsonReaderBuilder::new(Arc::new(schema))
        .build(cursor)
        .map_err(|e| QecError::Decode(format!("jsonl: {e}")))?;
    let mut batches = Vec::new();
    for batch in &mut reader {
        batches.push(batch.map_err(|e| QecError::Decode(format!("jsonl: {e}")))?);
    }
    concat_or_empty(batches)
}

fn concat_or_empty(batches: Vec<RecordBatch>) -> Result<RecordBatch> {
    if batches.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    }
    if batches.len() == 1 {
        return Ok(batches.into_iter().next().unwrap());
    }
    let schema = batches[0].schema();
    Ok(arrow_select::concat::concat_batches(&schema, &batches)?)
}

/// Extension → (decoder, kind) registry (§4.4 "known extensions").
pub fn lookup_extension(extension: &str) -> Option<(Decoder, ExtensionKind)> {
    match extension {
        "complete" | "ignore" => Some((control_passthrough, ExtensionKind::Control)),
        "parquet" => Some((parquet_decoder, ExtensionKind::Data)),
        "arrow" => Some((arrow_decoder, ExtensionKind::Data)),
        "orc" => Some((orc_decoder, ExtensionKind::Data)),
        "jsonl" => Some((jsonl_decoder, ExtensionKind::Data)),
        "zstd" => Some((zstd_decoder, ExtensionKind::Data)),
        _ => None,
    }
}
