//! The sort operator (§4.11).
//!
//! Materializes all input batches, concatenates them, computes a stable
//! permutation from the key expressions (ASC/DESC per key, or a uniform
//! shuffle for `RANDOM()`), applies `take`, and emits the result as a
//! single batch.

use std::sync::Arc;
use std::time::Instant;

use arrow_array::UInt32Array;
use arrow_ord::sort::{lexsort_to_indices, SortColumn, SortOptions};
use rand::seq::SliceRandom;

use qec_core::{Batch, BatchStream, PlanOperator, ProducerArity, Result, Statistics};

use crate::evaluator::{evaluate, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
    /// `ORDER BY RANDOM()` — the key expression is never evaluated; the
    /// whole result is shuffled into a uniformly random row order instead.
    Random,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self { expr, direction: SortDirection::Asc }
    }

    pub fn desc(expr: Expr) -> Self {
        Self { expr, direction: SortDirection::Desc }
    }

    /// `ORDER BY RANDOM()`. The expression argument is unused by `execute`
    /// but kept so a lone random key doesn't need a second `SortKey` shape.
    pub fn random() -> Self {
        Self { expr: Expr::lit_i64(0), direction: SortDirection::Random }
    }
}

pub struct SortOperator {
    keys: Vec<SortKey>,
    producers: Vec<Arc<dyn PlanOperator>>,
    statistics: Arc<Statistics>,
}

impl SortOperator {
    pub fn new(keys: Vec<SortKey>, statistics: Arc<Statistics>) -> Self {
        Self { keys, producers: Vec::new(), statistics }
    }
}

impl PlanOperator for SortOperator {
    fn name(&self) -> &'static str {
        "Sort"
    }

    fn config(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{:?} {:?}", k.expr, k.direction))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let producer = self.producers[0].execute();
        let keys = self.keys.clone();
        let statistics = Arc::clone(&self.statistics);

        Box::new(std::iter::once_with(move || -> Result<Batch> {
            let batches: Vec<Batch> = producer.collect::<Result<Vec<_>>>()?;
            if batches.is_empty() {
                return Batch::concat(&[]);
            }
            let merged = Batch::concat(&batches)?;

            let start = Instant::now();

            // `ORDER BY RANDOM()` shuffles the whole result; it doesn't
            // compose with other keys, so a random key takes over the
            // entire permutation rather than breaking ties within it.
            let result = if keys.iter().any(|k| k.direction == SortDirection::Random) {
                let mut order: Vec<u32> = (0..merged.num_rows() as u32).collect();
                order.shuffle(&mut rand::thread_rng());
                merged.take_rows(&UInt32Array::from(order))
            } else {
                let sort_columns: Vec<SortColumn> = keys
                    .iter()
                    .map(|key| {
                        let values = evaluate(&key.expr, &merged)?;
                        Ok(SortColumn {
                            values,
                            options: Some(SortOptions {
                                descending: key.direction == SortDirection::Desc,
                                nulls_first: false,
                            }),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                if sort_columns.is_empty() {
                    Ok(merged)
                } else {
                    let indices = lexsort_to_indices(&sort_columns, None)?;
                    merged.take_rows(&indices)
                }
            };
            Statistics::add_time(&statistics.time_ordering, start.elapsed().as_nanos() as u64);
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch};
    use arrow_schema::{DataType, Field, Schema};

    struct Leaf(Vec<Batch>);
    impl PlanOperator for Leaf {
        fn name(&self) -> &'static str { "Leaf" }
        fn config(&self) -> String { String::new() }
        fn expected_producers(&self) -> ProducerArity { ProducerArity::Exactly(0) }
        fn producers(&self) -> &[Arc<dyn PlanOperator>] { &[] }
        fn set_producers_unchecked(&mut self, _: Vec<Arc<dyn PlanOperator>>) {}
        fn execute(&self) -> BatchStream {
            Box::new(self.0.clone().into_iter().map(Ok))
        }
    }

    fn batch_with(values: Vec<i64>) -> Batch {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let rb = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))]).unwrap();
        Batch::new(rb)
    }

    #[test]
    fn sorts_ascending_by_default_key() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![3, 1, 2])]));
        let mut op = SortOperator::new(vec![SortKey::asc(Expr::col("n"))], Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        let col = out.record_batch().column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(col.values(), &[1, 2, 3]);
    }

    #[test]
    fn sorts_descending_when_requested() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![3, 1, 2])]));
        let mut op = SortOperator::new(vec![SortKey::desc(Expr::col("n"))], Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        let col = out.record_batch().column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(col.values(), &[3, 2, 1]);
    }

    #[test]
    fn sort_merges_multiple_input_batches() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![5, 4]), batch_with(vec![1, 2, 3])]));
        let mut op = SortOperator::new(vec![SortKey::asc(Expr::col("n"))], Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 5);
        let col = out.record_batch().column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(col.values(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn random_sort_preserves_the_row_set_without_a_fixed_order() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2, 3, 4, 5])]));
        let mut op = SortOperator::new(vec![SortKey::random()], Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        let col = out.record_batch().column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        let mut values: Vec<i64> = col.values().to_vec();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
