//! Partition schemes (§4.4 "Partition scheme").
//!
//! A partition scheme renders a dataset path into a set of candidate,
//! date-parameterized partition paths, and filters a partition's blob
//! list down to the "frame" it actually wants to read.

use chrono::NaiveDate;

use qec_core::Statistics;

/// Given a dataset path and a date range, which partition paths exist and
/// which blobs within a partition belong to the current frame.
pub trait PartitionScheme: Send + Sync {
    /// Format string handed to the storage adapter's `get_partitions`.
    fn partition_format(&self) -> Option<&str>;

    /// Candidate partition paths for `dataset` between `start_date` and
    /// `end_date` (inclusive).
    fn render_partitions(&self, dataset: &str, start_date: NaiveDate, end_date: NaiveDate) -> Vec<String>;

    /// Narrow `blobs` to the frame this scheme selects; unmatched blobs
    /// are folded into `count_blobs_ignored_frames` by the caller.
    fn filter_blobs(&self, blobs: Vec<String>, statistics: &Statistics) -> Vec<String>;
}

/// No date expansion, no frame filtering: the dataset path is the only
/// partition, and every surviving blob belongs to its frame. Used when
/// `NO_PARTITION` is set or no partition scheme is configured.
#[derive(Debug, Clone, Default)]
pub struct DefaultPartitionScheme {
    format: Option<String>,
}

impl DefaultPartitionScheme {
    pub fn new(format: impl Into<String>) -> Self {
        let format = format.into();
        Self {
            format: if format.is_empty() { None } else { Some(format) },
        }
    }
}

impl PartitionScheme for DefaultPartitionScheme {
    fn partition_format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    fn render_partitions(&self, dataset: &str, _start_date: NaiveDate, _end_date: NaiveDate) -> Vec<String> {
        vec![dataset.to_string()]
    }

    fn filter_blobs(&self, blobs: Vec<String>, _statistics: &Statistics) -> Vec<String> {
        blobs
    }
}

/// Renders `<dataset>/year_YYYY/month_MM/day_DD/` per day in the range,
/// and filters a partition's blobs to a single "frame" — the data for one
/// logical snapshot of that day, identified by the first path segment
/// after the partition folder (§4.4, REDESIGN FLAGS "Partition frame
/// selection").
#[derive(Debug, Clone, Default)]
pub struct MabelPartitionScheme;

impl MabelPartitionScheme {
    pub fn new() -> Self {
        Self
    }

    fn frame_key(blob: &str, partition: &str) -> Option<String> {
        let rest = blob.strip_prefix(partition)?;
        let rest = rest.trim_start_matches('/');
        rest.split('/').next().map(|s| s.to_string())
    }
}

impl PartitionScheme for MabelPartitionScheme {
    fn partition_format(&self) -> Option<&str> {
        Some("year_{yyyy}/month_{mm}/day_{dd}")
    }

    fn render_partitions(&self, dataset: &str, start_date: NaiveDate, end_date: NaiveDate) -> Vec<String> {
        use chrono::Datelike;
        let mut partitions = Vec::new();
        let mut day = start_date;
        loop {
            partitions.push(format!(
                "{dataset}/year_{:04}/month_{:02}/day_{:02}",
                day.year(),
                day.month(),
                day.day(),
            ));
            if day >= end_date {
                break;
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        partitions
    }

    fn filter_blobs(&self, blobs: Vec<String>, _statistics: &Statistics) -> Vec<String> {
        // Pick the lexicographically-last frame key present; mabel frame
        // folders sort so that the latest snapshot sorts last.
        let partition_prefix = match blobs.first() {
            Some(b) => b.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default(),
            None => return blobs,
        };
        let mut frames: Vec<String> = blobs
            .iter()
            .filter_map(|b| Self::frame_key(b, &partition_prefix))
            .collect();
        frames.sort();
        frames.dedup();
        let chosen = match frames.last() {
            Some(f) => f.clone(),
            None => return blobs,
        };
        blobs
            .into_iter()
            .filter(|b| Self::frame_key(b, &partition_prefix).as_deref() == Some(chosen.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn default_scheme_does_not_expand_dates() {
        let scheme = DefaultPartitionScheme::new("");
        let partitions = scheme.render_partitions(
            "tests.data",
            NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 28).unwrap(),
        );
        assert_eq!(partitions, vec!["tests.data".to_string()]);
    }

    #[test]
    fn default_scheme_passes_blobs_through_unfiltered() {
        let scheme = DefaultPartitionScheme::new("");
        let statistics = Statistics::new();
        let blobs = vec!["a.parquet".to_string(), "b.parquet".to_string()];
        assert_eq!(scheme.filter_blobs(blobs.clone(), &statistics), blobs);
    }

    #[test]
    fn mabel_scheme_renders_one_partition_per_day() {
        let scheme = MabelPartitionScheme::new();
        let start = NaiveDate::from_ymd_opt(2020, 2, 26).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 2, 28).unwrap();
        let partitions = scheme.render_partitions("tests.data", start, end);
        assert_eq!(partitions.len(), 3);
        assert!(partitions[0].ends_with(&format!("year_{:04}/month_02/day_26", start.year())));
        assert!(partitions[2].ends_with("day_28"));
    }

    #[test]
    fn mabel_scheme_selects_the_latest_frame() {
        let scheme = MabelPartitionScheme::new();
        let statistics = Statistics::new();
        let blobs = vec![
            "tests.data/year_2020/month_02/day_26/frame-1/part-0.parquet".to_string(),
            "tests.data/year_2020/month_02/day_26/frame-2/part-0.parquet".to_string(),
        ];
        let filtered = scheme.filter_blobs(blobs, &statistics);
        assert_eq!(filtered, vec!["tests.data/year_2020/month_02/day_26/frame-2/part-0.parquet".to_string()]);
    }
}
