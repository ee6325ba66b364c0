//! Batch consolidation helper (§4.8 "the operator exposes a
//! `consolidate_batches` helper").
//!
//! Concatenates small producer batches up to a target row count before
//! handing them to an operator that needs to see more than one blob's
//! worth of rows per evaluator call (cross-batch-invariant predicates,
//! window functions).

use qec_core::{Batch, Result};

/// Pull batches from `producer`, concatenating consecutive ones until
/// the running row count reaches `target_rows` (or the producer is
/// exhausted), then yield the consolidated batch. A single
/// larger-than-target batch is passed through unmerged.
pub fn consolidate_batches(
    producer: impl Iterator<Item = Result<Batch>>,
    target_rows: usize,
) -> impl Iterator<Item = Result<Batch>> {
    let mut producer = producer.peekable();
    std::iter::from_fn(move || {
        let mut pending: Vec<Batch> = Vec::new();
        let mut rows = 0usize;
        loop {
            match producer.peek() {
                None => break,
                Some(Err(_)) => {
                    if pending.is_empty() {
                        return producer.next();
                    }
                    break;
                }
                Some(Ok(_)) => {}
            }
            if rows >= target_rows && !pending.is_empty() {
                break;
            }
            match producer.next() {
                Some(Ok(batch)) => {
                    rows += batch.num_rows();
                    pending.push(batch);
                }
                _ => unreachable!("peek guaranteed Some(Ok(_))"),
            }
        }
        if pending.is_empty() {
            None
        } else if pending.len() == 1 {
            Some(Ok(pending.into_iter().next().unwrap()))
        } else {
            Some(Batch::concat(&pending))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch};
    use arrow_schema::{DataType, Field, Schema};
    use std::sync::Arc;

    fn small_batch(values: Vec<i64>) -> Batch {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let rb = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap();
        Batch::new(rb)
    }

    #[test]
    fn merges_small_batches_up_to_target() {
        let batches = vec![Ok(small_batch(vec![1])), Ok(small_batch(vec![2])), Ok(small_batch(vec![3]))];
        let merged: Vec<_> = consolidate_batches(batches.into_iter(), 2).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].num_rows(), 2);
        assert_eq!(merged[1].num_rows(), 1);
    }

    #[test]
    fn passes_through_a_single_oversized_batch() {
        let batches = vec![Ok(small_batch(vec![1, 2, 3, 4, 5]))];
        let merged: Vec<_> = consolidate_batches(batches.into_iter(), 2).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].num_rows(), 5);
    }

    #[test]
    fn empty_producer_yields_no_batches() {
        let batches: Vec<Result<Batch>> = vec![];
        let merged: Vec<_> = consolidate_batches(batches.into_iter(), 10).collect();
        assert!(merged.is_empty());
    }
}
