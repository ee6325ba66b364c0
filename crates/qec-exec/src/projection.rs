//! The projection operator (§4.9).
//!
//! Each output column is described by `(expression, name, alias?)`. A
//! bare column reference is a zero-copy pick from the input batch;
//! anything else is evaluated into a new array and appended under its
//! name/alias.

use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::{Field, Schema};

use qec_core::{Batch, BatchStream, ColumnMeta, PlanOperator, ProducerArity, Result};

use crate::evaluator::{evaluate, Expr};

/// One projected output column.
#[derive(Debug, Clone)]
pub struct ProjectionColumn {
    pub expr: Expr,
    pub name: String,
    pub alias: Option<String>,
}

impl ProjectionColumn {
    pub fn new(expr: Expr, name: impl Into<String>) -> Self {
        Self { expr, name: name.into(), alias: None }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

pub struct ProjectionOperator {
    columns: Vec<ProjectionColumn>,
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl ProjectionOperator {
    pub fn new(columns: Vec<ProjectionColumn>) -> Self {
        Self { columns, producers: Vec::new() }
    }

    fn project(&self, batch: &Batch) -> Result<Batch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays = Vec::with_capacity(self.columns.len());
        let mut columns_meta = Vec::with_capacity(self.columns.len());

        for column in &self.columns {
            let array = evaluate(&column.expr, batch)?;
            let output_name = column.output_name();
            fields.push(Arc::new(Field::new(output_name, array.data_type().clone(), true)));

            let source_table = if let Expr::Column(name) = &column.expr {
                batch
                    .schema()
                    .index_of(name)
                    .ok()
                    .and_then(|idx| batch.column_meta(idx))
                    .and_then(|meta| meta.source_table.clone())
            } else {
                None
            };

            columns_meta.push(ColumnMeta {
                display_name: output_name.to_string(),
                source_table,
                source_path: None,
            });
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        let record_batch = RecordBatch::try_new(schema, arrays)?;
        Ok(Batch::from_parts(record_batch, columns_meta, batch.table_meta().cloned()))
    }
}

impl PlanOperator for ProjectionOperator {
    fn name(&self) -> &'static str {
        "Projection"
    }

    fn config(&self) -> String {
        self.columns
            .iter()
            .map(|c| match &c.alias {
                Some(alias) => format!("{:?} AS {alias}", c.expr),
                None => format!("{:?}", c.expr),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expected_producers(&self) -> ProducerArity {
        ProducerArity::Exactly(1)
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let producer = self.producers[0].execute();
        let columns = self.columns.clone();
        let this = ProjectionOperator { columns, producers: Vec::new() };
        Box::new(producer.map(move |batch| this.project(&batch?)))
    }
}
