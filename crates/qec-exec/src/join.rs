//! Equality join operators (§4.13): cross, inner, and left/right/full
//! outer joins. Both producer streams are materialized; the smaller
//! side (by row count) is used to build a hash table keyed by the
//! join columns' rendered values, and the other side probes it.
//! Outer variants additionally emit unmatched rows from the preserved
//! side(s) with nulls standing in for the other side's columns.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{Array, ArrayRef, ListArray, UInt32Array};
use arrow_schema::{Field, Schema};
use arrow_select::concat::concat;

use qec_core::{Batch, BatchStream, ColumnMeta, PlanOperator, ProducerArity, QecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

/// A resolved `(left_column, right_column)` equality key pair, whether
/// it came from `USING (col)` (same name on both sides) or an explicit
/// `ON left.col = right.col`.
#[derive(Debug, Clone)]
pub struct JoinKey {
    pub left: String,
    pub right: String,
}

impl JoinKey {
    pub fn using(name: impl Into<String>) -> Self {
        let name = name.into();
        Self { left: name.clone(), right: name }
    }

    pub fn on(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self { left: left.into(), right: right.into() }
    }
}

pub struct JoinOperator {
    join_type: JoinType,
    keys: Vec<JoinKey>,
    /// Set for a correlated cross join whose right side is `UNNEST(column)`
    /// (§4.13): the right side isn't a second producer at all, it's the
    /// exploded list column from each left row.
    unnest_column: Option<String>,
    producers: Vec<Arc<dyn PlanOperator>>,
}

impl JoinOperator {
    pub fn new(join_type: JoinType, keys: Vec<JoinKey>) -> Self {
        Self { join_type, keys, unnest_column: None, producers: Vec::new() }
    }

    /// A cross join whose right side is `UNNEST(column)` against the left
    /// producer's rows — a correlated cross join rather than a Cartesian
    /// product against an independent right producer. Takes exactly one
    /// producer (the left side); there is no right plan tree to wire.
    pub fn new_unnest_cross(column: impl Into<String>) -> Self {
        Self { join_type: JoinType::Cross, keys: Vec::new(), unnest_column: Some(column.into()), producers: Vec::new() }
    }
}

/// Explodes `column` (must be a list-typed column) from `left`, pairing
/// each exploded element with the rest of its originating row — the
/// correlated-cross-join half of §4.13.
fn unnest_cross_join(left: &Batch, column: &str) -> Result<Batch> {
    let schema = left.schema();
    let col_idx = schema
        .index_of(column)
        .map_err(|_| QecError::Evaluation(format!("unnest column '{column}' not found")))?;
    let list_array = left
        .record_batch()
        .column(col_idx)
        .as_any()
        .downcast_ref::<ListArray>()
        .ok_or_else(|| QecError::Evaluation(format!("unnest column '{column}' is not a list column")))?;

    let mut left_repeat: Vec<u32> = Vec::new();
    let mut value_slices: Vec<ArrayRef> = Vec::new();
    for row in 0..left.num_rows() {
        let values = list_array.value(row);
        left_repeat.extend(std::iter::repeat(row as u32).take(values.len()));
        value_slices.push(values);
    }

    let exploded: ArrayRef = if value_slices.is_empty() {
        arrow_array::new_empty_array(&list_array.value_type())
    } else {
        let refs: Vec<&dyn Array> = value_slices.iter().map(|a| a.as_ref()).collect();
        concat(&refs)?
    };

    let left_indices = UInt32Array::from(left_repeat);
    let (mut fields, mut metas, mut arrays) = build_side(left, &left_indices, &std::collections::HashSet::new(), "left")?;

    fields.push(Arc::new(Field::new(column, exploded.data_type().clone(), true)));
    metas.push(ColumnMeta { display_name: column.to_string(), source_table: None, source_path: None });
    arrays.push(exploded);

    let schema = Arc::new(Schema::new(fields));
    let rb = arrow_array::RecordBatch::try_new(schema, arrays)?;
    Ok(Batch::from_parts(rb, metas, None))
}

fn render_row(batch: &Batch, indices: &[usize], row: usize) -> String {
    use arrow_cast::display::{ArrayFormatter, FormatOptions};
    let rb = batch.record_batch();
    let options = FormatOptions::default().with_null("\u{0}NULL\u{0}");
    indices
        .iter()
        .map(|&col| {
            ArrayFormatter::try_new(rb.column(col).as_ref(), &options)
                .map(|f| f.value(row).to_string())
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join("\u{1}")
}

fn column_indices(batch: &Batch, names: &[String]) -> Result<Vec<usize>> {
    let schema = batch.schema();
    names
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| QecError::Evaluation(format!("join column '{name}' not found")))
        })
        .collect()
}

/// `(left_row, right_row)` pairs, either side `None` for an unmatched
/// preserved-side row.
fn plan_pairs(
    left: &Batch,
    right: &Batch,
    left_idx: &[usize],
    right_idx: &[usize],
    join_type: JoinType,
) -> Result<Vec<(Option<u32>, Option<u32>)>> {
    if join_type == JoinType::Cross {
        let mut pairs = Vec::with_capacity(left.num_rows() * right.num_rows());
        for l in 0..left.num_rows() {
            for r in 0..right.num_rows() {
                pairs.push((Some(l as u32), Some(r as u32)));
            }
        }
        return Ok(pairs);
    }

    // Build on the smaller side, probe with the other; track which
    // build-side rows were matched so outer joins can emit the rest.
    let build_on_left = left.num_rows() <= right.num_rows();
    let (build, build_idx, probe, probe_idx) =
        if build_on_left { (left, left_idx, right, right_idx) } else { (right, right_idx, left, left_idx) };

    let mut table: HashMap<String, Vec<u32>> = HashMap::new();
    for row in 0..build.num_rows() {
        table.entry(render_row(build, build_idx, row)).or_default().push(row as u32);
    }

    let mut build_matched = vec![false; build.num_rows()];
    let mut pairs: Vec<(Option<u32>, Option<u32>)> = Vec::new();

    for probe_row in 0..probe.num_rows() {
        let key = render_row(probe, probe_idx, probe_row);
        match table.get(&key) {
            Some(build_rows) => {
                for &b in build_rows {
                    build_matched[b as usize] = true;
                    let pair = if build_on_left { (Some(b), Some(probe_row as u32)) } else { (Some(probe_row as u32), Some(b)) };
                    pairs.push(pair);
                }
            }
            None => {
                let preserve_probe = if build_on_left {
                    matches!(join_type, JoinType::Right | JoinType::Full)
                } else {
                    matches!(join_type, JoinType::Left | JoinType::Full)
                };
                if preserve_probe {
                    let pair = if build_on_left { (None, Some(probe_row as u32)) } else { (Some(probe_row as u32), None) };
                    pairs.push(pair);
                }
            }
        }
    }

    let preserve_build = if build_on_left {
        matches!(join_type, JoinType::Left | JoinType::Full)
    } else {
        matches!(join_type, JoinType::Right | JoinType::Full)
    };
    if preserve_build {
        for (row, matched) in build_matched.iter().enumerate() {
            if !matched {
                let pair = if build_on_left { (Some(row as u32), None) } else { (None, Some(row as u32)) };
                pairs.push(pair);
            }
        }
    }

    Ok(pairs)
}

fn option_index_array(pairs: &[(Option<u32>, Option<u32>)], pick_left: bool) -> UInt32Array {
    pairs.iter().map(|(l, r)| if pick_left { *l } else { *r }).collect()
}

/// Renames a field when its name collides with the other side, by
/// prefixing with that side's table alias (falling back to a generic
/// side label when no alias metadata is present).
fn qualified_name(name: &str, collides: bool, column_meta: &ColumnMeta, fallback_alias: &str) -> String {
    if !collides {
        return name.to_string();
    }
    let alias = column_meta.source_table.clone().unwrap_or_else(|| fallback_alias.to_string());
    format!("{alias}.{name}")
}

fn build_side(batch: &Batch, indices: &UInt32Array, other_names: &std::collections::HashSet<String>, fallback_alias: &str) -> Result<(Vec<Arc<Field>>, Vec<ColumnMeta>, Vec<arrow_array::ArrayRef>)> {
    let rb = batch.record_batch();
    let mut fields = Vec::with_capacity(rb.num_columns());
    let mut metas = Vec::with_capacity(rb.num_columns());
    let mut arrays = Vec::with_capacity(rb.num_columns());

    for (i, field) in rb.schema().fields().iter().enumerate() {
        let taken = arrow_select::take::take(rb.column(i).as_ref(), indices, None)?;
        let collides = other_names.contains(field.name());
        let meta = batch.column_meta(i).cloned().unwrap_or_default();
        let name = qualified_name(field.name(), collides, &meta, fallback_alias);
        fields.push(Arc::new(Field::new(&name, taken.data_type().clone(), true)));
        metas.push(ColumnMeta { display_name: name, ..meta });
        arrays.push(taken);
    }
    Ok((fields, metas, arrays))
}

impl PlanOperator for JoinOperator {
    fn name(&self) -> &'static str {
        "Join"
    }

    fn config(&self) -> String {
        format!(
            "{:?} ON [{}]",
            self.join_type,
            self.keys.iter().map(|k| format!("{}={}", k.left, k.right)).collect::<Vec<_>>().join(", ")
        )
    }

    fn expected_producers(&self) -> ProducerArity {
        if self.unnest_column.is_some() {
            ProducerArity::Exactly(1)
        } else {
            ProducerArity::Exactly(2)
        }
    }

    fn producers(&self) -> &[Arc<dyn PlanOperator>] {
        &self.producers
    }

    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>) {
        self.producers = producers;
    }

    fn execute(&self) -> BatchStream {
        if let Some(column) = self.unnest_column.clone() {
            let left_producer = self.producers[0].execute();
            return Box::new(std::iter::once_with(move || -> Result<Batch> {
                let left_batches: Vec<Batch> = left_producer.collect::<Result<Vec<_>>>()?;
                let left = Batch::concat(&left_batches)?;
                unnest_cross_join(&left, &column)
            }));
        }

        let left_producer = self.producers[0].execute();
        let right_producer = self.producers[1].execute();
        let join_type = self.join_type;
        let keys = self.keys.clone();

        Box::new(std::iter::once_with(move || -> Result<Batch> {
            let left_batches: Vec<Batch> = left_producer.collect::<Result<Vec<_>>>()?;
            let right_batches: Vec<Batch> = right_producer.collect::<Result<Vec<_>>>()?;
            let left = Batch::concat(&left_batches)?;
            let right = Batch::concat(&right_batches)?;

            let (left_names, right_names): (Vec<String>, Vec<String>) = if join_type == JoinType::Cross {
                (Vec::new(), Vec::new())
            } else {
                (keys.iter().map(|k| k.left.clone()).collect(), keys.iter().map(|k| k.right.clone()).collect())
            };
            let left_idx = column_indices(&left, &left_names)?;
            let right_idx = column_indices(&right, &right_names)?;

            let pairs = plan_pairs(&left, &right, &left_idx, &right_idx, join_type)?;
            let left_indices = option_index_array(&pairs, true);
            let right_indices = option_index_array(&pairs, false);

            let left_field_names: std::collections::HashSet<String> = left.schema().fields().iter().map(|f| f.name().clone()).collect();
            let right_field_names: std::collections::HashSet<String> = right.schema().fields().iter().map(|f| f.name().clone()).collect();

            let (mut fields, mut metas, mut arrays) = build_side(&left, &left_indices, &right_field_names, "left")?;
            let (r_fields, r_metas, r_arrays) = build_side(&right, &right_indices, &left_field_names, "right")?;
            fields.extend(r_fields);
            metas.extend(r_metas);
            arrays.extend(r_arrays);

            let schema = Arc::new(Schema::new(fields));
            let rb = arrow_array::RecordBatch::try_new(schema, arrays)?;
            Ok(Batch::from_parts(rb, metas, None))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch, StringArray};
    use arrow_schema::DataType;

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

    fn planets() -> Batch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        Batch::new(
            RecordBatch::try_new(
                schema,
                vec![Arc::new(Int64Array::from(vec![1, 2, 3])), Arc::new(StringArray::from(vec!["Mercury", "Venus", "Earth"]))],
            )
            .unwrap(),
        )
    }

    fn satellites() -> Batch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        Batch::new(
            RecordBatch::try_new(
                schema,
                vec![Arc::new(Int64Array::from(vec![3, 3, 9])), Arc::new(StringArray::from(vec!["Moon", "Luna2", "Phobos"]))],
            )
            .unwrap(),
        )
    }

    #[test]
    fn cross_join_is_a_cartesian_product() {
        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![planets()]));
        let right: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![satellites()]));
        let mut op = JoinOperator::new(JoinType::Cross, vec![]);
        op.set_producers(vec![left, right]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        assert_eq!(out.num_rows(), 3 * 3);
    }

    #[test]
    fn inner_join_keeps_only_matching_keys() {
        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![planets()]));
        let right: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![satellites()]));
        let mut op = JoinOperator::new(JoinType::Inner, vec![JoinKey::using("id")]);
        op.set_producers(vec![left, right]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        // id=3 (Earth) matches two satellite rows; everything else drops.
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn left_outer_join_preserves_unmatched_left_rows() {
        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![planets()]));
        let right: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![satellites()]));
        let mut op = JoinOperator::new(JoinType::Left, vec![JoinKey::using("id")]);
        op.set_producers(vec![left, right]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        // Mercury and Venus survive unmatched, plus the two Earth matches.
        assert_eq!(out.num_rows(), 4);
    }

    #[test]
    fn full_outer_join_preserves_rows_from_both_sides() {
        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![planets()]));
        let right: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![satellites()]));
        let mut op = JoinOperator::new(JoinType::Full, vec![JoinKey::using("id")]);
        op.set_producers(vec![left, right]).unwrap();
        let out = op.execute().next().unwrap().unwrap();
        // 2 Earth matches + Mercury + Venus (left-only) + Phobos/id=9 (right-only).
        assert_eq!(out.num_rows(), 5);
    }

    fn planets_with_moons() -> Batch {
        use arrow_array::builder::{ListBuilder, StringBuilder};

        let mut moons_builder = ListBuilder::new(StringBuilder::new());
        moons_builder.values().append_value("Moon");
        moons_builder.append(true);
        moons_builder.values().append_value("Phobos");
        moons_builder.values().append_value("Deimos");
        moons_builder.append(true);
        moons_builder.values().append_value("Luna2");
        moons_builder.append(true);
        let moons = moons_builder.finish();

        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("moons", moons.data_type().clone(), true),
        ]));
        Batch::new(
            RecordBatch::try_new(
                schema,
                vec![
                    Arc::new(Int64Array::from(vec![1, 2, 3])),
                    Arc::new(StringArray::from(vec!["Earth", "Mars", "Jupiter"])),
                    Arc::new(moons),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn unnest_cross_join_explodes_one_row_per_list_element() {
        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![planets_with_moons()]));
        let mut op = JoinOperator::new_unnest_cross("moons");
        op.set_producers(vec![left]).unwrap();
        let out = op.execute().next().unwrap().unwrap();

        // Earth has 1 moon, Mars has 2, Jupiter has 1: 4 exploded rows total.
        assert_eq!(out.num_rows(), 4);
        let names = out.record_batch().column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "Earth");
        assert_eq!(names.value(1), "Mars");
        assert_eq!(names.value(2), "Mars");
        assert_eq!(names.value(3), "Jupiter");
        let moons = out.record_batch().column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(moons.value(0), "Moon");
        assert_eq!(moons.value(1), "Phobos");
        assert_eq!(moons.value(2), "Deimos");
        assert_eq!(moons.value(3), "Luna2");
    }

    #[test]
    fn unnest_cross_join_rejects_non_list_columns() {
        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![planets()]));
        let mut op = JoinOperator::new_unnest_cross("name");
        op.set_producers(vec![left]).unwrap();
        assert!(op.execute().next().unwrap().is_err());
    }

    #[test]
    fn colliding_column_names_are_prefixed_with_table_alias() {
        let mut left_batch = planets();
        left_batch = left_batch.with_table_meta(qec_core::TableMeta {
            dataset_name: "planets".into(),
            aliases: vec!["p".into()],
            estimated_row_count: None,
        });
        let mut right_batch = satellites();
        right_batch = right_batch.with_table_meta(qec_core::TableMeta {
            dataset_name: "satellites".into(),
            aliases: vec!["s".into()],
            estimated_row_count: None,
        });

        let left: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![left_batch]));
        let right: Arc<dyn PlanOperator> = Arc::new(Leaf(vec![right_batch]));
        let mut op = JoinOperator::new(JoinType::Inner, vec![JoinKey::using("id")]);
        op.set_producers(vec![left, right]).unwrap();
        let out = op.execute().next().unwrap().unwrap();

        let names: Vec<String> = out.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert!(names.contains(&"p.name".to_string()));
        assert!(names.contains(&"s.name".to_string()));
    }
}
