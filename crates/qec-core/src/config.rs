//! Engine-wide configuration (§2): cache sizing, partition scheme choice,
//! and dataset-prefix routing, loadable from YAML and overridable by
//! environment variables — the same split rde's `PipelineSpec` uses
//! between file-based pipeline definition and CLI/env knobs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{QecError, Result};

/// Which `qec_storage::PartitionScheme` implementation a dataset scan uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionSchemeChoice {
    /// No date expansion or frame filtering.
    Default,
    /// `year_YYYY/month_MM/day_DD` date partitioning with latest-frame selection.
    Mabel,
}

impl Default for PartitionSchemeChoice {
    fn default() -> Self {
        PartitionSchemeChoice::Default
    }
}

/// Engine configuration, loaded from a YAML file and then layered with
/// environment overrides (`QEC_MAX_CACHE_ITEM_BYTES`, `QEC_PARTITION_SCHEME`).
///
/// `prefixes` maps a dataset's leading dotted segment (e.g. `"tests"` in
/// `tests.data`) to a storage-adapter root, letting a handful of dataset
/// families live under different roots without the caller threading a
/// root through every scan call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QecConfig {
    /// Cap on a single cached blob's size in bytes; items at or above this
    /// are never written to the cache (`qec_storage::cache::try_admit`).
    pub max_cache_item_bytes: usize,
    /// Which partition scheme `qec-cli` (or any other driver) constructs.
    pub partition_scheme: PartitionSchemeChoice,
    /// Dataset-prefix to storage-root overrides.
    pub prefixes: HashMap<String, String>,
}

impl Default for QecConfig {
    fn default() -> Self {
        Self {
            max_cache_item_bytes: 32 * 1024 * 1024,
            partition_scheme: PartitionSchemeChoice::Default,
            prefixes: HashMap::new(),
        }
    }
}

impl QecConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| QecError::Config(format!("invalid config: {e}")))
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| QecError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_yaml_str(&raw)
    }

    /// Starts from `Default::default()`, then applies environment overrides.
    /// A driver with no config file at all can call this directly.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Layers `QEC_MAX_CACHE_ITEM_BYTES`/`QEC_PARTITION_SCHEME` on top of
    /// whatever was loaded from a config file, if present. Malformed or
    /// unrecognized values are ignored rather than rejected, matching the
    /// "env overrides a file" convenience role these variables play.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("QEC_MAX_CACHE_ITEM_BYTES") {
            if let Ok(bytes) = raw.parse::<usize>() {
                self.max_cache_item_bytes = bytes;
            }
        }
        if let Ok(raw) = std::env::var("QEC_PARTITION_SCHEME") {
            match raw.to_lowercase().as_str() {
                "default" => self.partition_scheme = PartitionSchemeChoice::Default,
                "mabel" => self.partition_scheme = PartitionSchemeChoice::Mabel,
                _ => {}
            }
        }
    }

    /// The storage root for `dataset`, if its leading dotted segment has a
    /// registered prefix override; `None` means the caller's default root
    /// applies unchanged.
    pub fn resolve_prefix(&self, dataset: &str) -> Option<&str> {
        let head = dataset.split('.').next().unwrap_or(dataset);
        self.prefixes.get(head).map(String::as_str)
    }
}
