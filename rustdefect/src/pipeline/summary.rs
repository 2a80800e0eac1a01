use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const SUMMARY_FILE: &str = "run_summary.json";

/// Counters of the preprocessing stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSummary {
    pub particles: usize,
    pub bonds: usize,
    pub event_count: usize,
    pub force_anomalies: usize,
    /// Bonds whose death time moved earlier because an endpoint left the region
    pub corrected_death_times: usize,
    pub reconstructed: usize,
    pub alive_at_end: usize,
    pub unplaceable: usize,
}

/// Counters of the clustering stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub failures: usize,
    pub buckets: usize,
    pub clustered_buckets: usize,
    pub failed_buckets: usize,
    pub failed_chunks: usize,
    pub total_clusters: usize,
    pub statistics_file: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub preprocess: Option<PreprocessSummary>,
    pub cluster: Option<ClusterSummary>,
}

impl RunSummary {
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(SUMMARY_FILE);
        let text = serde_json::to_string_pretty(self)
            .map_err(|source| Error::Json { path: path.display().to_string(), source })?;
        fs::write(&path, text).map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }
}
