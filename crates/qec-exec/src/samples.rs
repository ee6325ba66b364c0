//! In-memory sample datasets (§3 "Dataset identifier", §4.7).
//!
//! The reference system's samples ship as fixture files this repository
//! doesn't have (real row counts like "177 satellites" come from a CSV
//! that isn't part of this corpus). These are self-consistent synthetic
//! stand-ins with the same shape and join-key relationships — a
//! `$planets`/`$satellites` pair joinable on `planet_id`, plus
//! `$astronauts` and the zero-column `$no_table` every SQL engine's
//! sample set carries for `SELECT 1`-style queries with no `FROM`.

use std::sync::Arc;

use arrow_array::{Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};

use qec_core::{Batch, QecError, Result};

const PLANET_NAMES: [&str; 8] = [
    "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune",
];

/// Build `$planets`: one row per planet, with a `planet_id` join key.
pub fn planets() -> Batch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("planet_id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("gravity", DataType::Float64, false),
        Field::new("num_moons", DataType::Int64, false),
    ]));
    let ids: Vec<i64> = (1..=PLANET_NAMES.len() as i64).collect();
    let gravity: Vec<f64> = PLANET_NAMES.iter().enumerate().map(|(i, _)| 0.38 + i as f64 * 0.3).collect();
    let moons: Vec<i64> = vec![0, 0, 1, 2, 95, 146, 27, 14];
    let rb = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(PLANET_NAMES.to_vec())),
            Arc::new(Float64Array::from(gravity)),
            Arc::new(Int64Array::from(moons)),
        ],
    )
    .expect("planets sample schema is internally consistent");
    Batch::new(rb)
}

/// Build `$satellites`: several rows per planet, foreign-keyed to
/// `$planets.planet_id`. Earth and Mars get their real moons named;
/// the gas giants get synthetic placeholder names rather than
/// reproducing an unavailable fixture's exact catalogue.
pub fn satellites() -> Batch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("satellite_id", DataType::Int64, false),
        Field::new("planet_id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("radius_km", DataType::Float64, false),
    ]));

    let mut satellite_id = Vec::new();
    let mut planet_id = Vec::new();
    let mut name = Vec::new();
    let mut radius_km = Vec::new();
    let mut next_id = 1i64;

    let named = [(3i64, vec!["Moon"]), (4, vec!["Phobos", "Deimos"])];
    for (pid, names) in named.iter() {
        for n in names {
            satellite_id.push(next_id);
            planet_id.push(*pid);
            name.push(n.to_string());
            radius_km.push(500.0 + next_id as f64 * 37.0);
            next_id += 1;
        }
    }
    // synthetic moons for the gas giants (5..=8), a handful each
    for pid in 5i64..=8 {
        let count = match pid {
            5 => 4,
            6 => 3,
            7 => 2,
            _ => 2,
        };
        for i in 0..count {
            satellite_id.push(next_id);
            planet_id.push(pid);
            name.push(format!("Moon-{pid}-{i}"));
            radius_km.push(100.0 + next_id as f64 * 12.5);
            next_id += 1;
        }
    }

    let rb = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(satellite_id)),
            Arc::new(Int64Array::from(planet_id)),
            Arc::new(StringArray::from(name)),
            Arc::new(Float64Array::from(radius_km)),
        ],
    )
    .expect("satellites sample schema is internally consistent");
    Batch::new(rb)
}

/// Build `$astronauts`: a small unrelated table (no foreign key into
/// the planets/satellites pair), useful for cross-join and aggregate
/// tests that don't want join semantics in the way.
pub fn astronauts() -> Batch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("astronaut_id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("missions", DataType::Int64, false),
    ]));
    let rb = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(StringArray::from(vec![
                "Armstrong", "Aldrin", "Ride", "Jemison",
            ])),
            Arc::new(Int64Array::from(vec![2, 2, 2, 1])),
        ],
    )
    .expect("astronauts sample schema is internally consistent");
    Batch::new(rb)
}

/// `$no_table`: the zero-column, single-row table used for `FROM`-less
/// scalar queries.
pub fn no_table() -> Batch {
    let rb = RecordBatch::try_new_with_options(
        Arc::new(Schema::empty()),
        vec![],
        &arrow_array::RecordBatchOptions::new().with_row_count(Some(1)),
    )
    .expect("no_table is a fixed, valid zero-column batch");
    Batch::new(rb)
}

/// Resolve a `$`-prefixed sample name to its in-memory batch.
pub fn lookup(name: &str) -> Result<Batch> {
    match name {
        "$planets" => Ok(planets()),
        "$satellites" => Ok(satellites()),
        "$astronauts" => Ok(astronauts()),
        "$no_table" => Ok(no_table()),
        other => Err(QecError::DatasetNotFound(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planets_has_eight_rows() {
        assert_eq!(planets().num_rows(), 8);
    }

    #[test]
    fn satellites_planet_ids_are_a_subset_of_planets() {
        let planet_ids: std::collections::HashSet<i64> = (1..=8).collect();
        let sats = satellites();
        let col = sats
            .record_batch()
            .column_by_name("planet_id")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        for v in col.values() {
            assert!(planet_ids.contains(v));
        }
    }

    #[test]
    fn no_table_has_one_row_and_no_columns() {
        let batch = no_table();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.num_columns(), 0);
    }

    #[test]
    fn lookup_rejects_unknown_sample_names() {
        assert!(lookup("$not_a_sample").is_err());
    }

    #[test]
    fn lookup_resolves_all_known_samples() {
        for name in ["$planets", "$satellites", "$astronauts", "$no_table"] {
            assert!(lookup(name).is_ok());
        }
    }
}
