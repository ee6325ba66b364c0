//! The limit operator (§4.12): pass through at most N rows total,
//! cutting the final batch mid-stream rather than materializing
//! everything.

use std::sync::Arc;

use arrow_array::UInt32Array;

use qec_core::{BatchStream, PlanOperator, ProducerArity};

pub struct LimitOperator {
    limit: usize,
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl LimitOperator {
    pub fn new(limit: usize) -> Self {
        Self { limit, producers: Vec::new() }
    }
}

impl PlanOperator for LimitOperator {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn config(&self) -> String {
        format!("{}", self.limit)
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let mut producer = self.producers[0].execute();
        let mut remaining = self.limit;
        let mut done = false;

        Box::new(std::iter::from_fn(move || {
            if done || remaining == 0 {
                return None;
            }
            match producer.next() {
                None => {
                    done = true;
                    None
                }
                Some(Err(e)) => {
                    done = true;
                    Some(Err(e))
                }
                Some(Ok(batch)) => {
                    if batch.num_rows() <= remaining {
                        remaining -= batch.num_rows();
                        Some(Ok(batch))
                    } else {
                        let indices: UInt32Array = (0..remaining as u32).collect();
                        remaining = 0;
                        done = true;
                        Some(batch.take_rows(&indices))
                    }
                }
            }
        }))
    }
}
