//! The internal dataset operator (§4.7).
//!
//! Maps a `$`-prefixed sample name to its in-memory batch, normalizes
//! types, attaches table metadata, and yields exactly that one batch.

use std::sync::Arc;

use qec_core::{normalize_types, Batch, BatchStream, PlanOperator, ProducerArity, TableMeta};

use crate::samples;

pub struct InternalDatasetOperator {
    dataset_name: String,
    alias: Option<String>,
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl InternalDatasetOperator {
    pub fn new(dataset_name: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            alias,
            producers: Vec::new(),
        }
    }
}

impl PlanOperator for InternalDatasetOperator {
    fn name(&self) -> &'static str {
        "Internal Dataset"
    }

    fn config(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} => {alias}", self.dataset_name),
            None => self.dataset_name.clone(),
        }
    }

    fn expected_producers(&self) -> ProducerArity {
        ProducerArity::Exactly(0)
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let dataset_name = self.dataset_name.clone();
        let alias = self.alias.clone();
        let batch = samples::lookup(&dataset_name).and_then(|batch| {
            let batch = normalize_types(batch)?;
            let estimated_row_count = Some(batch.num_rows());
            let table = TableMeta {
                dataset_name: dataset_name.trim_start_matches('$').to_string(),
                aliases: alias.clone().into_iter().collect(),
                estimated_row_count,
            };
            Ok(batch.with_table_meta(table))
        });
        Box::new(std::iter::once(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_exactly_one_batch() {
        let op = InternalDatasetOperator::new("$planets", None);
        let batches: Vec<_> = op.execute().collect::<qec_core::Result<Vec<_>>>().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 8);
    }

    #[test]
    fn unknown_sample_name_is_an_error() {
        let op = InternalDatasetOperator::new("$not_real", None);
        let mut stream = op.execute();
        assert!(stream.next().unwrap().is_err());
    }

    #[test]
    fn alias_is_recorded_in_table_metadata() {
        let op = InternalDatasetOperator::new("$planets", Some("p".to_string()));
        let batch = op.execute().next().unwrap().unwrap();
        assert_eq!(batch.table_meta().unwrap().aliases, vec!["p".to_string()]);
    }
}
