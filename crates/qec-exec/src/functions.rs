//! Dataset-producing functions (§3 "Dataset identifier" variant (c);
//! §4.7 "function operator").
//!
//! Each function takes its call arguments (already evaluated to plain
//! strings by the planner) and returns a single batch containing the
//! generated column(s), named after the function or its declared alias.

use std::sync::Arc;

use arrow_array::{Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};

use qec_core::{Batch, QecError, Result};

/// `generate_series(start, stop[, step])` — an inclusive integer range.
pub fn generate_series(args: &[String], column_name: &str) -> Result<Batch> {
    if args.len() < 2 || args.len() > 3 {
        return Err(QecError::Evaluation(
            "generate_series expects (start, stop[, step])".into(),
        ));
    }
    let parse = |s: &str| -> Result<i64> {
        s.parse::<i64>().map_err(|_| QecError::Evaluation(format!("generate_series: not an integer: {s}")))
    };
    let start = parse(&args[0])?;
    let stop = parse(&args[1])?;
    let step = if args.len() == 3 { parse(&args[2])? } else { 1 };
    if step == 0 {
        return Err(QecError::Evaluation("generate_series: step must not be zero".into()));
    }

    let mut values = Vec::new();
    let mut v = start;
    if step > 0 {
        while v <= stop {
            values.push(v);
            v += step;
        }
    } else {
        while v >= stop {
            values.push(v);
            v += step;
        }
    }

    let schema = Arc::new(Schema::new(vec![Field::new(column_name, DataType::Int64, false)]));
    let rb = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))])?;
    Ok(Batch::new(rb))
}

/// `values(...)` — an inline row-literal table; each argument is one row
/// of a single text column (richer multi-column VALUES lists are a
/// planner-level concern this function doesn't need to know about).
pub fn values(args: &[String], column_name: &str) -> Result<Batch> {
    let schema = Arc::new(Schema::new(vec![Field::new(column_name, DataType::Utf8, true)]));
    let rb = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(args.to_vec()))])?;
    Ok(Batch::new(rb))
}

/// `unnest(column)` is implemented by `join::JoinOperator::new_unnest_cross`
/// (a correlated cross join against an exploded list column, §4.13) rather
/// than here; this stub exists so the dataset-identifier match in
/// `function_node.rs` has a named error for the case where `unnest` is
/// reached as a plain dataset function outside that context.
pub fn unnest_requires_join_context() -> QecError {
    QecError::InvalidPlan("unnest must be the right-hand side of a cross join".into())
}
