//! The function dataset operator (§4.7).

use std::sync::Arc;

use qec_core::{normalize_types, BatchStream, PlanOperator, ProducerArity, QecError, TableMeta};

use crate::functions;

pub struct FunctionDatasetOperator {
    function_name: String,
    args: Vec<String>,
    alias: Option<String>,
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl FunctionDatasetOperator {
    pub fn new(function_name: impl Into<String>, args: Vec<String>, alias: Option<String>) -> Self {
        Self { function_name: function_name.into(), args, alias, producers: Vec::new() }
    }

    fn output_column_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.function_name.clone())
    }
}

impl PlanOperator for FunctionDatasetOperator {
    fn name(&self) -> &'static str {
        "Function Dataset"
    }

    fn config(&self) -> String {
        format!("{}({})", self.function_name, self.args.join(", "))
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
        let column_name = self.output_column_name();
        let result = match self.function_name.as_str() {
            "generate_series" => functions::generate_series(&self.args, &column_name),
            "values" => functions::values(&self.args, &column_name),
            "unnest" => Err(functions::unnest_requires_join_context()),
            other => Err(QecError::InvalidPlan(format!("unknown dataset function: {other}"))),
        };
        let result = result.and_then(normalize_types).map(|batch| {
            batch.with_table_meta(TableMeta {
                dataset_name: self.function_name.clone(),
                aliases: self.alias.clone().into_iter().collect(),
                estimated_row_count: None,
            })
        });
        Box::new(std::iter::once(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_named_series_column() {
        let op = FunctionDatasetOperator::new("generate_series", vec!["1".into(), "3".into()], None);
        let batch = op.execute().next().unwrap().unwrap();
        assert_eq!(batch.column_names(), vec!["generate_series".to_string()]);
        assert_eq!(batch.num_rows(), 3);
    }

    #[test]
    fn alias_renames_the_output_column() {
        let op = FunctionDatasetOperator::new("generate_series", vec!["1".into(), "3".into()], Some("n".into()));
        let batch = op.execute().next().unwrap().unwrap();
        assert_eq!(batch.column_names(), vec!["n".to_string()]);
    }

    #[test]
    fn unknown_function_is_an_invalid_plan_error() {
        let op = FunctionDatasetOperator::new("not_a_function", vec![], None);
        assert!(op.execute().next().unwrap().is_err());
    }
}
