//! The scalar expression evaluator (§2 "only its contract ... is
//! specified"; §4.8-4.11 call sites).
//!
//! The SQL planner and its expression compiler are external
//! collaborators. What the operators in this crate need is a narrow
//! contract: evaluate an expression tree against a `Batch` and get back
//! an Arrow array of the same row count. `Expr` is a minimal tree — just
//! enough surface for the operators below and their tests — rather than
//! a full SQL expression grammar.

use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray};
use arrow_ord::cmp;
use arrow_schema::DataType;

use qec_core::{Batch, QecError, Result};

/// A comparison or logical operator usable in a predicate tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// A scalar literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int64(i64),
    Float64(String), // stored as string to keep Expr: Eq-free of float NaN pitfalls in tests
    Utf8(String),
    Bool(bool),
    Null,
}

/// A minimal scalar expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Column(String),
    Literal(Literal),
    Compare { op: CompareOp, left: Box<Expr>, right: Box<Expr> },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// A named call (`COUNT`, `SUM`, ...); arguments are themselves
    /// expressions. Aggregate operators interpret these directly rather
    /// than asking the evaluator to reduce them.
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn lit_i64(v: i64) -> Self {
        Expr::Literal(Literal::Int64(v))
    }

    pub fn lit_str(v: impl Into<String>) -> Self {
        Expr::Literal(Literal::Utf8(v.into()))
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::Compare { op: CompareOp::Eq, left: Box::new(self), right: Box::new(other) }
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::Compare { op: CompareOp::Gt, left: Box::new(self), right: Box::new(other) }
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::Compare { op: CompareOp::Lt, left: Box::new(self), right: Box::new(other) }
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Column names this expression references directly (not through a
    /// `Call`'s arguments, which aggregate operators walk themselves).
    pub fn referenced_columns(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Column(name) => out.push(name.clone()),
            Expr::Literal(_) => {}
            Expr::Compare { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::Not(e) => e.collect_columns(out),
            Expr::Call { args, .. } => {
                for a in args {
                    a.collect_columns(out);
                }
            }
        }
    }
}

/// Evaluate `expr` against `batch`, producing an Arrow array of
/// `batch.num_rows()` length. Predicate expressions evaluate to a
/// `Boolean` array (§4.8); projection expressions may evaluate to any
/// array type (§4.9).
pub fn evaluate(expr: &Expr, batch: &Batch) -> Result<ArrayRef> {
    match expr {
        Expr::Column(name) => {
            let idx = batch
                .schema()
                .index_of(name)
                .map_err(|_| QecError::Evaluation(format!("unknown column: {name}")))?;
            Ok(Arc::clone(batch.record_batch().column(idx)))
        }
        Expr::Literal(lit) => Ok(literal_array(lit, batch.num_rows())),
        Expr::Compare { op, left, right } => {
            let lhs = evaluate(left, batch)?;
            let rhs = evaluate(right, batch)?;
            let result = apply_compare(*op, &lhs, &rhs)?;
            Ok(Arc::new(result))
        }
        Expr::And(l, r) => {
            let lhs = as_boolean(evaluate(l, batch)?)?;
            let rhs = as_boolean(evaluate(r, batch)?)?;
            Ok(Arc::new(arrow_arith::boolean::and(&lhs, &rhs)?))
        }
        Expr::Or(l, r) => {
            let lhs = as_boolean(evaluate(l, batch)?)?;
            let rhs = as_boolean(evaluate(r, batch)?)?;
            Ok(Arc::new(arrow_arith::boolean::or(&lhs, &rhs)?))
        }
        Expr::Not(e) => {
            let v = as_boolean(evaluate(e, batch)?)?;
            Ok(Arc::new(arrow_arith::boolean::not(&v)?))
        }
        Expr::Call { name, .. } => Err(QecError::Evaluation(format!(
            "function {name} has no scalar evaluation; aggregate/window calls are interpreted by their operator"
        ))),
    }
}

/// Evaluate a predicate and return it strictly as a `BooleanArray`, the
/// shape the Selection operator needs (§4.8).
pub fn evaluate_predicate(expr: &Expr, batch: &Batch) -> Result<BooleanArray> {
    as_boolean(evaluate(expr, batch)?)
}

fn as_boolean(array: ArrayRef) -> Result<BooleanArray> {
    array
        .as_any()
        .downcast_ref::<BooleanArray>()
        .cloned()
        .ok_or_else(|| QecError::Evaluation("predicate did not evaluate to a boolean array".into()))
}

fn literal_array(lit: &Literal, len: usize) -> ArrayRef {
    use arrow_array::{BooleanArray, Int64Array, StringArray};
    match lit {
        Literal::Int64(v) => Arc::new(Int64Array::from(vec![*v; len])),
        Literal::Float64(s) => {
            let v: f64 = s.parse().unwrap_or(0.0);
            Arc::new(arrow_array::Float64Array::from(vec![v; len]))
        }
        Literal::Utf8(v) => Arc::new(StringArray::from(vec![v.as_str(); len])),
        Literal::Bool(v) => Arc::new(BooleanArray::from(vec![*v; len])),
        Literal::Null => Arc::new(BooleanArray::from(vec![None; len])),
    }
}

fn apply_compare(op: CompareOp, lhs: &ArrayRef, rhs: &ArrayRef) -> Result<BooleanArray> {
    let result = match op {
        CompareOp::Eq => cmp::eq(lhs, rhs)?,
        CompareOp::NotEq => cmp::neq(lhs, rhs)?,
        CompareOp::Lt => cmp::lt(lhs, rhs)?,
        CompareOp::LtEq => cmp::lt_eq(lhs, rhs)?,
        CompareOp::Gt => cmp::gt(lhs, rhs)?,
        CompareOp::GtEq => cmp::gt_eq(lhs, rhs)?,
    };
    Ok(result)
}

/// `data_type` helper used by the projection operator to name computed
/// columns consistently; kept here because only the evaluator knows an
/// expression's static shape today (no real type inference exists yet).
pub fn literal_data_type(lit: &Literal) -> DataType {
    match lit {
        Literal::Int64(_) => DataType::Int64,
        Literal::Float64(_) => DataType::Float64,
        Literal::Utf8(_) => DataType::Utf8,
        Literal::Bool(_) => DataType::Boolean,
        Literal::Null => DataType::Boolean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Int64Array, RecordBatch, StringArray};
    use arrow_schema::{Field, Schema};

    fn sample_batch() -> Batch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        let rb = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["a", "b", "c"])),
            ],
        )
        .unwrap();
        Batch::new(rb)
    }

    #[test]
    fn column_reference_evaluates_to_the_column() {
        let batch = sample_batch();
        let array = evaluate(&Expr::col("id"), &batch).unwrap();
        let ints = array.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ints.values(), &[1, 2, 3]);
    }

    #[test]
    fn comparison_produces_boolean_array() {
        let batch = sample_batch();
        let predicate = Expr::col("id").gt(Expr::lit_i64(1));
        let result = evaluate_predicate(&predicate, &batch).unwrap();
        assert_eq!(result.value(0), false);
        assert_eq!(result.value(1), true);
        assert_eq!(result.value(2), true);
    }

    #[test]
    fn and_combines_two_predicates() {
        let batch = sample_batch();
        let predicate = Expr::col("id").gt(Expr::lit_i64(1)).and(Expr::col("id").lt(Expr::lit_i64(3)));
        let result = evaluate_predicate(&predicate, &batch).unwrap();
        assert_eq!(result.value(0), false);
        assert_eq!(result.value(1), true);
        assert_eq!(result.value(2), false);
    }

    #[test]
    fn unknown_column_is_an_evaluation_error() {
        let batch = sample_batch();
        assert!(evaluate(&Expr::col("nope"), &batch).is_err());
    }
}
