//! The selection (filter) operator (§4.8).

use std::sync::Arc;
use std::time::Instant;

use arrow_array::UInt32Array;

use qec_core::{BatchStream, PlanOperator, ProducerArity, Result, Statistics};

use crate::consolidate::consolidate_batches;
use crate::evaluator::{evaluate_predicate, Expr};

/// Target row count `consolidate_batches` merges small producer batches up
/// to before the predicate is evaluated (§4.8: "the evaluator sees at
/// least one full batch per invocation").
const CONSOLIDATION_TARGET_ROWS: usize = 8192;

pub struct SelectionOperator {
    predicate: Option<Expr>,
    producers: Vec<Arc<dyn PlanOperator>>,
    statistics: Arc<Statistics>,
}

impl SelectionOperator {
    pub fn new(predicate: Option<Expr>, statistics: Arc<Statistics>) -> Self {
        Self { predicate, producers: Vec::new(), statistics }
    }
}

impl PlanOperator for SelectionOperator {
    fn name(&self) -> &'static str {
        "Selection"
    }

    fn config(&self) -> String {
        match &self.predicate {
            Some(expr) => format!("{expr:?}"),
            None => "<none>".to_string(),
        }
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let producer = consolidate_batches(self.producers[0].execute(), CONSOLIDATION_TARGET_ROWS);
        let predicate = self.predicate.clone();
        let statistics = Arc::clone(&self.statistics);

        Box::new(producer.map(move |batch| {
            let batch = batch?;
            let predicate = match &predicate {
                Some(p) => p,
                None => return Ok(batch),
            };
            let start = Instant::now();
            let mask = evaluate_predicate(predicate, &batch)?;
            let indices: UInt32Array = mask
                .iter()
                .enumerate()
                .filter_map(|(i, keep)| if keep.unwrap_or(false) { Some(i as u32) } else { None })
                .collect();
            let result = batch.take_rows(&indices);
            Statistics::add_time(&statistics.time_selecting, start.elapsed().as_nanos() as u64);
            result
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch};
    use arrow_schema::{DataType, Field, Schema};
    use qec_core::Batch;

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
    fn no_predicate_passes_every_row_through() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2, 3])]));
        let mut op = SelectionOperator::new(None, Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out: Vec<_> = op.execute().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(out[0].num_rows(), 3);
    }

    #[test]
    fn predicate_filters_down_to_matching_rows() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2, 3, 4])]));
        let predicate = Expr::col("n").gt(Expr::lit_i64(2));
        let mut op = SelectionOperator::new(Some(predicate), Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out: Vec<_> = op.execute().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(out[0].num_rows(), 2);
    }

    #[test]
    fn evaluating_a_predicate_completes_without_error() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1])]));
        let statistics = Arc::new(Statistics::new());
        let predicate = Expr::col("n").gt(Expr::lit_i64(0));
        let mut op = SelectionOperator::new(Some(predicate), Arc::clone(&statistics));
        op.set_producers(vec![leaf]).unwrap();
        let out: Vec<_> = op.execute().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(out[0].num_rows(), 1);
    }
}
