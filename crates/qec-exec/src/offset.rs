//! The offset operator (§4.12): discard the first K rows, then stream
//! the rest unmodified.

use std::sync::Arc;

use arrow_array::UInt32Array;

use qec_core::{BatchStream, PlanOperator, ProducerArity};

pub struct OffsetOperator {
    offset: usize,
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl OffsetOperator {
    pub fn new(offset: usize) -> Self {
        Self { offset, producers: Vec::new() }
    }
}

impl PlanOperator for OffsetOperator {
    fn name(&self) -> &'static str {
        "Offset"
    }

    fn config(&self) -> String {
        format!("{}", self.offset)
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let mut producer = self.producers[0].execute();
        let mut to_skip = self.offset;

        Box::new(std::iter::from_fn(move || loop {
            match producer.next() {
                None => return None,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(batch)) => {
                    if to_skip == 0 {
                        return Some(Ok(batch));
                    }
                    if batch.num_rows() <= to_skip {
                        to_skip -= batch.num_rows();
                        continue;
                    }
                    let indices: UInt32Array = (to_skip as u32..batch.num_rows() as u32).collect();
                    to_skip = 0;
                    return Some(batch.take_rows(&indices));
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch};
    use arrow_schema::{DataType, Field, Schema};
    use qec_core::{Batch, Result};

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
    fn offset_skips_rows_within_a_batch() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2, 3, 4, 5])]));
        let mut op = OffsetOperator::new(2);
        op.set_producers(vec![leaf]).unwrap();
        let out: Vec<_> = op.execute().collect::<Result<Vec<_>>>().unwrap();
        let total: usize = out.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn offset_spanning_whole_batches_drops_them_entirely() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2]), batch_with(vec![3, 4, 5])]));
        let mut op = OffsetOperator::new(2);
        op.set_producers(vec![leaf]).unwrap();
        let out: Vec<_> = op.execute().collect::<Result<Vec<_>>>().unwrap();
        let total: usize = out.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn zero_offset_is_a_no_op() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![batch_with(vec![1, 2, 3])]));
        let mut op = OffsetOperator::new(0);
        op.set_producers(vec![leaf]).unwrap();
        let out: Vec<_> = op.execute().collect::<Result<Vec<_>>>().unwrap();
        let total: usize = out.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 3);
    }
}
