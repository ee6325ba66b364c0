//! The aggregate operator (§4.10).
//!
//! Materializes the producer stream, builds a key vector per row from
//! the group-by expressions, partitions rows into groups, and folds
//! each aggregate expression over its group. With no `GROUP BY`
//! expressions, the whole input is treated as a single group, and a
//! single row is still emitted for empty input.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use arrow_array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt32Array};
use arrow_cast::cast::cast;
use arrow_schema::{DataType, Field, Schema};

use qec_core::{Batch, BatchStream, ColumnMeta, PlanOperator, ProducerArity, QecError, Result, Statistics};

use crate::evaluator::{evaluate, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Sum,
    Min,
    Max,
    Mean,
    Stddev,
    Variance,
    Product,
    ApproximateMedian,
    List,
    One,
}

#[derive(Debug, Clone)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    pub input: Expr,
    pub output_name: String,
}

impl AggregateExpr {
    pub fn new(function: AggregateFunction, input: Expr, output_name: impl Into<String>) -> Self {
        Self { function, input, output_name: output_name.into() }
    }
}

pub struct AggregateOperator {
    group_by: Vec<Expr>,
    aggregates: Vec<AggregateExpr>,
    producers: Vec<Arc<dyn PlanOperator>>,
    statistics: Arc<Statistics>,
}

impl AggregateOperator {
    pub fn new(group_by: Vec<Expr>, aggregates: Vec<AggregateExpr>, statistics: Arc<Statistics>) -> Self {
        Self { group_by, aggregates, producers: Vec::new(), statistics }
    }
}

fn render_key(values: &[ArrayRef], row: usize) -> String {
    use arrow_cast::display::{ArrayFormatter, FormatOptions};
    let options = FormatOptions::default().with_null("\u{0}NULL\u{0}");
    values
        .iter()
        .map(|v| {
            ArrayFormatter::try_new(v.as_ref(), &options)
                .map(|f| f.value(row).to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\u{1}")
}

fn as_f64_array(array: &ArrayRef) -> Result<Float64Array> {
    let casted = cast(array.as_ref(), &DataType::Float64)?;
    Ok(casted.as_any().downcast_ref::<Float64Array>().cloned().expect("cast target is Float64"))
}

fn fold_numeric(function: AggregateFunction, values: &Float64Array, rows: &[u32]) -> f64 {
    let samples: Vec<f64> = rows.iter().filter_map(|&r| values.is_valid(r as usize).then(|| values.value(r as usize))).collect();
    match function {
        AggregateFunction::Sum => samples.iter().sum(),
        AggregateFunction::Min => samples.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregateFunction::Max => samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregateFunction::Mean => {
            if samples.is_empty() { 0.0 } else { samples.iter().sum::<f64>() / samples.len() as f64 }
        }
        AggregateFunction::Product => samples.iter().product(),
        AggregateFunction::Variance => variance(&samples),
        AggregateFunction::Stddev => variance(&samples).sqrt(),
        AggregateFunction::ApproximateMedian => {
            let mut sorted = samples.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            if sorted.is_empty() {
                0.0
            } else {
                sorted[sorted.len() / 2]
            }
        }
        _ => unreachable!("fold_numeric only handles numeric-reducing functions"),
    }
}

fn variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64
}

impl PlanOperator for AggregateOperator {
    fn name(&self) -> &'static str {
        "Aggregate"
    }

    fn config(&self) -> String {
        format!(
            "GROUP BY [{}], AGG [{}]",
            self.group_by.iter().map(|e| format!("{e:?}")).collect::<Vec<_>>().join(", "),
            self.aggregates.iter().map(|a| format!("{:?}({:?})", a.function, a.input)).collect::<Vec<_>>().join(", "),
        )
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        let producer = self.producers[0].execute();
        let group_by = self.group_by.clone();
        let aggregates = self.aggregates.clone();
        let statistics = Arc::clone(&self.statistics);

        Box::new(std::iter::once_with(move || -> Result<Batch> {
            let batches: Vec<Batch> = producer.collect::<Result<Vec<_>>>()?;
            let start = Instant::now();

            let merged = if batches.is_empty() {
                None
            } else {
                Some(Batch::concat(&batches)?)
            };

            let result = aggregate(&group_by, &aggregates, merged.as_ref());
            Statistics::add_time(&statistics.time_aggregating, start.elapsed().as_nanos() as u64);
            result
        }))
    }
}

fn aggregate(group_by: &[Expr], aggregates: &[AggregateExpr], batch: Option<&Batch>) -> Result<Batch> {
    let num_rows = batch.map(|b| b.num_rows()).unwrap_or(0);

    // Group rows. With no GROUP BY, every row (or no rows) is one group.
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<u32>> = HashMap::new();
    let mut group_values: HashMap<String, Vec<ArrayRef>> = HashMap::new();

    if group_by.is_empty() {
        let rows: Vec<u32> = (0..num_rows as u32).collect();
        group_order.push(String::new());
        groups.insert(String::new(), rows);
    } else {
        let batch = batch.expect("group_by non-empty implies a batch exists when num_rows > 0");
        let key_arrays: Vec<ArrayRef> = group_by.iter().map(|e| evaluate(e, batch)).collect::<Result<Vec<_>>>()?;
        for row in 0..num_rows {
            let key = render_key(&key_arrays, row);
            if !groups.contains_key(&key) {
                group_order.push(key.clone());
                let row_values: Vec<ArrayRef> =
                    key_arrays.iter().map(|arr| arrow_select::take::take(arr.as_ref(), &UInt32Array::from(vec![row as u32]), None)).collect::<std::result::Result<_, _>>()?;
                group_values.insert(key.clone(), row_values);
            }
            groups.entry(key).or_default().push(row as u32);
        }
    }

    // Emit one row per group (or the single empty-input group).
    let mut fields: Vec<Arc<Field>> = Vec::new();
    let mut columns_meta: Vec<ColumnMeta> = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for (gi, group_expr) in group_by.iter().enumerate() {
        let mut parts: Vec<ArrayRef> = Vec::with_capacity(group_order.len());
        for key in &group_order {
            parts.push(Arc::clone(&group_values[key][gi]));
        }
        let column = if parts.is_empty() {
            arrow_array::new_empty_array(&DataType::Utf8)
        } else {
            arrow_select::concat::concat(&parts.iter().map(|a| a.as_ref()).collect::<Vec<_>>())?
        };
        let name = match group_expr {
            Expr::Column(n) => n.clone(),
            _ => format!("group_{gi}"),
        };
        fields.push(Arc::new(Field::new(&name, column.data_type().clone(), true)));
        columns_meta.push(ColumnMeta { display_name: name, source_table: None, source_path: None });
        arrays.push(column);
    }

    for agg in aggregates {
        let column = compute_aggregate(agg, batch, &group_order, &groups)?;
        fields.push(Arc::new(Field::new(&agg.output_name, column.data_type().clone(), true)));
        columns_meta.push(ColumnMeta { display_name: agg.output_name.clone(), source_table: None, source_path: None });
        arrays.push(column);
    }

    let schema = Arc::new(Schema::new(fields));
    let rb = arrow_array::RecordBatch::try_new(schema, arrays)?;
    Ok(Batch::from_parts(rb, columns_meta, None))
}

fn compute_aggregate(
    agg: &AggregateExpr,
    batch: Option<&Batch>,
    group_order: &[String],
    groups: &HashMap<String, Vec<u32>>,
) -> Result<ArrayRef> {
    match agg.function {
        AggregateFunction::Count => {
            let counts: Vec<i64> = group_order.iter().map(|k| groups[k].len() as i64).collect();
            Ok(Arc::new(Int64Array::from(counts)))
        }
        AggregateFunction::CountDistinct => {
            let batch = batch.ok_or_else(|| QecError::Evaluation("COUNT_DISTINCT over empty input".into()))?;
            let values = evaluate(&agg.input, batch)?;
            let counts: Vec<i64> = group_order
                .iter()
                .map(|k| {
                    let rows = &groups[k];
                    let mut seen = std::collections::HashSet::new();
                    for &row in rows {
                        seen.insert(render_key(std::slice::from_ref(&values), row as usize));
                    }
                    seen.len() as i64
                })
                .collect();
            Ok(Arc::new(Int64Array::from(counts)))
        }
        AggregateFunction::List => {
            let batch = batch.ok_or_else(|| QecError::Evaluation("LIST over empty input".into()))?;
            let values = evaluate(&agg.input, batch)?;
            let rendered: Vec<String> = group_order
                .iter()
                .map(|k| {
                    groups[k]
                        .iter()
                        .map(|&row| render_key(std::slice::from_ref(&values), row as usize))
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .collect();
            Ok(Arc::new(StringArray::from(rendered)))
        }
        AggregateFunction::One => {
            let batch = batch.ok_or_else(|| QecError::Evaluation("first() over empty input".into()))?;
            let values = evaluate(&agg.input, batch)?;
            let indices: UInt32Array = group_order.iter().map(|k| groups[k][0]).collect();
            Ok(arrow_select::take::take(values.as_ref(), &indices, None)?)
        }
        numeric => {
            let batch = batch.ok_or_else(|| QecError::Evaluation(format!("{numeric:?} over empty input")))?;
            let values = evaluate(&agg.input, batch)?;
            let float_values = as_f64_array(&values)?;
            let results: Vec<f64> = group_order.iter().map(|k| fold_numeric(numeric, &float_values, &groups[k])).collect();
            Ok(Arc::new(Float64Array::from(results)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array as IntArr, RecordBatch, StringArray as StrArr};

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

    fn grouped_batch() -> Batch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("category", DataType::Utf8, false),
            Field::new("amount", DataType::Int64, false),
        ]));
        let rb = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StrArr::from(vec!["a", "b", "a", "b", "a"])),
                Arc::new(IntArr::from(vec![10, 20, 30, 40, 50])),
            ],
        )
        .unwrap();
        Batch::new(rb)
    }

    #[test]
    fn count_with_no_group_by_emits_one_row() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![grouped_batch()]));
        let aggregates = vec![AggregateExpr::new(AggregateFunction::Count, Expr::col("amount"), "n")];
        let mut op = AggregateOperator::new(vec![], aggregates, Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 1);
        let col = out.record_batch().column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(col.value(0), 5);
    }

    #[test]
    fn empty_input_with_no_group_by_still_emits_a_row() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![]));
        let aggregates = vec![AggregateExpr::new(AggregateFunction::Count, Expr::col("amount"), "n")];
        let mut op = AggregateOperator::new(vec![], aggregates, Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 1);
    }

    #[test]
    fn group_by_partitions_rows_and_sums_per_group() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![grouped_batch()]));
        let aggregates = vec![AggregateExpr::new(AggregateFunction::Sum, Expr::col("amount"), "total")];
        let mut op = AggregateOperator::new(vec![Expr::col("category")], aggregates, Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 2);

        let categories = out.record_batch().column(0).as_any().downcast_ref::<StrArr>().unwrap();
        let totals = out.record_batch().column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        let mut by_category: HashMap<String, f64> = HashMap::new();
        for i in 0..out.num_rows() {
            by_category.insert(categories.value(i).to_string(), totals.value(i));
        }
        assert_eq!(by_category["a"], 90.0);
        assert_eq!(by_category["b"], 60.0);
    }

    #[test]
    fn count_distinct_counts_unique_values_per_group() {
        let leaf: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![grouped_batch()]));
        let aggregates = vec![AggregateExpr::new(AggregateFunction::CountDistinct, Expr::col("amount"), "distinct_amounts")];
        let mut op = AggregateOperator::new(vec![Expr::col("category")], aggregates, Arc::new(Statistics::new()));
        op.set_producers(vec![leaf]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        let counts = out.record_batch().column(1).as_any().downcast_ref::<Int64Array>().unwrap();
        assert!(counts.values().iter().all(|&v| v == 3 || v == 2));
    }
}
