//! The distinct operator (§4.12).
//!
//! Materializes the producer stream, hashes each row's rendered value
//! vector, and keeps the first occurrence of each distinct key.

use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::UInt32Array;

use qec_core::{Batch, BatchStream, PlanOperator, ProducerArity, Result};

pub struct DistinctOperator {
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl DistinctOperator {
    pub fn new() -> Self {
        Self { producers: Vec::new() }
    }
}

impl Default for DistinctOperator {
    fn default() -> Self {
        Self::new()
    }
}

fn row_key(batch: &Batch, row: usize) -> String {
    use arrow_cast::display::{ArrayFormatter, FormatOptions};

    let rb = batch.record_batch();
    let options = FormatOptions::default().with_null("\u{0}NULL\u{0}");
    let mut parts = Vec::with_capacity(rb.num_columns());
    for col in rb.columns() {
        let rendered = ArrayFormatter::try_new(col.as_ref(), &options)
            .map(|f| f.value(row).to_string())
            .unwrap_or_default();
        parts.push(rendered);
    }
    parts.join("\u{1}")
}

impl PlanOperator for DistinctOperator {
    fn name(&self) -> &'static str {
        "Distinct"
    }

    fn config(&self) -> String {
        String::new()
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let producer = self.producers[0].execute();
        Box::new(std::iter::once_with(move || -> Result<Batch> {
            let batches: Vec<Batch> = producer.collect::<Result<Vec<_>>>()?;
            if batches.is_empty() {
                return Err(qec_core::QecError::InvalidPlan("distinct over zero batches".into()));
            }
            let merged = Batch::concat(&batches)?;
            let mut seen = HashSet::new();
            let mut keep = Vec::new();
            for row in 0..merged.num_rows() {
                let key = row_key(&merged, row);
                if seen.insert(key) {
                    keep.push(row as u32);
                }
            }
            merged.take_rows(&UInt32Array::from(keep))
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
    fn keeps_first_occurrence_of_each_value() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2, 1, 3, 2])]));
        let mut op = DistinctOperator::new();
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        let col = out.record_batch().column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(col.values(), &[1, 2, 3]);
    }

    #[test]
    fn distinct_across_multiple_batches() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2]), batch_with(vec![2, 3])]));
        let mut op = DistinctOperator::new();
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 3);
    }
}
