//! # QEC CLI — Demo Query Runner
//!
//! A small driver around the `qec-exec` plan operators. The SQL surface
//! (parser + planner) is an external collaborator and out of scope for
//! this engine, so this binary wires up a handful of canned plan trees
//! by name against the engine's built-in sample datasets and against
//! local-disk blob datasets, runs them to completion, and prints the
//! resulting batches plus the run's statistics snapshot.
//!
//! ## Usage
//!
//! ```bash
//! # Run one of the built-in demo plans over the $planets/$satellites samples
//! qec-cli demo satellites-joined-to-planets
//!
//! # Scan a local-disk dataset directly
//! qec-cli scan --root ./data --dataset events --start 2026-01-01 --end 2026-01-31
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use arrow::util::pretty::print_batches;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qec_core::{Batch, Hints, PartitionSchemeChoice, PlanOperator, QecConfig, Statistics};
use qec_exec::{
    AggregateExpr, AggregateFunction, AggregateOperator, BlobReaderOperator, DistinctOperator,
    Expr, FunctionDatasetOperator, InternalDatasetOperator, JoinKey, JoinOperator, JoinType,
    LimitOperator, SelectionOperator, SortKey, SortOperator,
};
use qec_storage::{DefaultPartitionScheme, InMemoryBlobCache, LocalDiskAdapter, MabelPartitionScheme, PartitionScheme};

#[derive(Parser, Debug)]
#[command(name = "qec-cli")]
#[command(about = "Demo query runner for the QEC physical execution engine")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one of the built-in canned demo plans.
    Demo {
        #[arg(value_enum)]
        name: DemoPlan,
    },
    /// Scan a local-disk dataset and print every row, unfiltered.
    Scan {
        /// Root directory the dataset lives under.
        #[arg(long)]
        root: std::path::PathBuf,
        /// Dataset name (the top-level directory under root).
        #[arg(long)]
        dataset: String,
        /// Inclusive start date for partition rendering (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,
        /// Inclusive end date for partition rendering (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,
        /// Engine config YAML (cache cap, partition scheme, prefixes).
        /// `QEC_MAX_CACHE_ITEM_BYTES`/`QEC_PARTITION_SCHEME` override it.
        #[arg(long)]
        config: Option<std::path::PathBuf>,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum DemoPlan {
    /// `$astronauts` filtered to multi-mission veterans, sorted by name.
    VeteranAstronauts,
    /// `$satellites INNER JOIN $planets USING (planet_id)`.
    SatellitesJoinedToPlanets,
    /// `$satellites` grouped by `planet_id`, counted, top 5 by count.
    SatelliteCountsPerPlanet,
    /// `generate_series(1, 20)` deduplicated and limited to 5 rows.
    GeneratedSeriesSample,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let statistics = Arc::new(Statistics::new());

    let batches = match args.command {
        Command::Demo { name } => run_demo(name, Arc::clone(&statistics))?,
        Command::Scan { root, dataset, start, end, config } => run_scan(root, dataset, start, end, config, Arc::clone(&statistics))?,
    };

    let record_batches: Vec<_> = batches.iter().map(|b| b.record_batch().clone()).collect();
    print_batches(&record_batches)?;

    let snapshot = statistics.snapshot();
    tracing::info!(
        blobs_scanned = snapshot.count_blobs_found,
        rows = record_batches.iter().map(|b| b.num_rows()).sum::<usize>(),
        read_errors = snapshot.read_errors,
        "query complete"
    );

    Ok(())
}

fn run_demo(name: DemoPlan, statistics: Arc<Statistics>) -> Result<Vec<Batch>> {
    let root: Arc<dyn PlanOperator> = match name {
        DemoPlan::VeteranAstronauts => {
            let astronauts: Arc<dyn PlanOperator> = Arc::new(InternalDatasetOperator::new("$astronauts", None));

            let predicate = Expr::col("missions").gt(Expr::lit_i64(1));
            let mut selection = SelectionOperator::new(Some(predicate), Arc::clone(&statistics));
            selection.set_producers(vec![astronauts])?;
            let selection: Arc<dyn PlanOperator> = Arc::new(selection);

            let mut sort = SortOperator::new(vec![SortKey::asc(Expr::col("name"))], Arc::clone(&statistics));
            sort.set_producers(vec![selection])?;
            Arc::new(sort)
        }
        DemoPlan::SatellitesJoinedToPlanets => {
            let satellites: Arc<dyn PlanOperator> = Arc::new(InternalDatasetOperator::new("$satellites", Some("s".into())));
            let planets: Arc<dyn PlanOperator> = Arc::new(InternalDatasetOperator::new("$planets", Some("p".into())));

            let mut join = JoinOperator::new(JoinType::Inner, vec![JoinKey::using("planet_id")]);
            join.set_producers(vec![satellites, planets])?;
            Arc::new(join)
        }
        DemoPlan::SatelliteCountsPerPlanet => {
            let satellites: Arc<dyn PlanOperator> = Arc::new(InternalDatasetOperator::new("$satellites", None));

            let mut aggregate = AggregateOperator::new(
                vec![Expr::col("planet_id")],
                vec![AggregateExpr::new(AggregateFunction::Count, Expr::col("satellite_id"), "satellite_count")],
                Arc::clone(&statistics),
            );
            aggregate.set_producers(vec![satellites])?;
            let aggregate: Arc<dyn PlanOperator> = Arc::new(aggregate);

            let mut sort = SortOperator::new(vec![SortKey::desc(Expr::col("satellite_count"))], Arc::clone(&statistics));
            sort.set_producers(vec![aggregate])?;
            let sort: Arc<dyn PlanOperator> = Arc::new(sort);

            let mut limit = LimitOperator::new(5);
            limit.set_producers(vec![sort])?;
            Arc::new(limit)
        }
        DemoPlan::GeneratedSeriesSample => {
            let series: Arc<dyn PlanOperator> =
                Arc::new(FunctionDatasetOperator::new("generate_series", vec!["1".into(), "20".into()], Some("n".into())));

            let mut distinct = DistinctOperator::new();
            distinct.set_producers(vec![series])?;
            let distinct: Arc<dyn PlanOperator> = Arc::new(distinct);

            let mut limit = LimitOperator::new(5);
            limit.set_producers(vec![distinct])?;
            Arc::new(limit)
        }
    };

    root.execute().collect::<qec_core::Result<Vec<_>>>().map_err(Into::into)
}

fn run_scan(
    root: std::path::PathBuf,
    dataset: String,
    start: Option<String>,
    end: Option<String>,
    config_path: Option<std::path::PathBuf>,
    statistics: Arc<Statistics>,
) -> Result<Vec<Batch>> {
    let start_date = parse_date(start.as_deref(), NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())?;
    let end_date = parse_date(end.as_deref(), chrono::Utc::now().date_naive())?;

    let mut config = match config_path {
        Some(path) => QecConfig::load(&path)?,
        None => QecConfig::default(),
    };
    config.apply_env_overrides();

    let scan_root = config.resolve_prefix(&dataset).map(std::path::PathBuf::from).unwrap_or(root);
    let adapter = Arc::new(LocalDiskAdapter::new(scan_root));
    let cache = Arc::new(InMemoryBlobCache::new());
    let scheme: Arc<dyn PartitionScheme> = match config.partition_scheme {
        PartitionSchemeChoice::Default => Arc::new(DefaultPartitionScheme::new("")),
        PartitionSchemeChoice::Mabel => Arc::new(MabelPartitionScheme::new()),
    };

    let mut reader = BlobReaderOperator::with_cache_limit(
        dataset,
        None,
        Hints::default(),
        start_date,
        end_date,
        None,
        adapter,
        Some(cache),
        config.max_cache_item_bytes,
        scheme,
        Arc::clone(&statistics),
    )?;
    reader.set_producers(vec![])?;

    let root: Arc<dyn PlanOperator> = Arc::new(reader);
    root.execute().collect::<qec_core::Result<Vec<_>>>().map_err(Into::into)
}

fn parse_date(raw: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    match raw {
        None => Ok(default),
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => Ok(date),
            Err(e) => bail!("invalid date '{s}': {e}"),
        },
    }
}
