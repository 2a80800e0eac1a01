use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dfcore::algorithm::aggregate::AggregationOpts;
use dfcore::algorithm::geometry::GeometryOpts;
use dfcore::algorithm::linkage::ClusterOpts;
use dfcore::algorithm::roi::RoiParams;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Clustering settings as they appear in a config file.
///
/// `chunk_size` has no default and must be given either here or on the
/// command line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    pub distance_threshold: f64,
    pub chunk_size: Option<usize>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            distance_threshold: 0.2,
            chunk_size: None,
        }
    }
}

/// Full configuration of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub particles: Option<PathBuf>,
    pub bonds: Option<PathBuf>,
    /// Preprocessed bond file, input of the clustering stage
    pub preprocessed: Option<PathBuf>,
    /// Time axis sidecar, defaults to `time_points.txt` next to the preprocessed file
    pub time_points: Option<PathBuf>,
    pub output: PathBuf,
    pub roi: RoiParams,
    pub cluster: ClusterSettings,
    pub aggregation: AggregationOpts,
    pub geometry: GeometryOpts,
    /// Worker threads, 0 uses the global rayon pool
    pub threads: usize,
    /// Wall-clock budget per bucket in seconds
    pub bucket_time_budget_secs: Option<f64>,
    /// Write boundary subsamples of the flagged clusters
    pub show: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            particles: None,
            bonds: None,
            preprocessed: None,
            time_points: None,
            output: PathBuf::from("cluster_output"),
            roi: RoiParams::default(),
            cluster: ClusterSettings::default(),
            aggregation: AggregationOpts::default(),
            geometry: GeometryOpts::default(),
            threads: 0,
            bucket_time_budget_secs: None,
            show: false,
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&text).map_err(|source| Error::Json { path: path.display().to_string(), source })
    }

    pub fn cluster_opts(&self) -> Result<ClusterOpts> {
        let chunk_size = self
            .cluster
            .chunk_size
            .ok_or_else(|| Error::Config("chunk size is required (--chunk-size or cluster.chunk_size)".to_string()))?;
        Ok(ClusterOpts::new(self.cluster.distance_threshold, chunk_size)?)
    }

    pub fn bucket_time_budget(&self) -> Result<Option<Duration>> {
        match self.bucket_time_budget_secs {
            None => Ok(None),
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => Err(Error::Config(format!("bucket time budget must be positive, got {}", secs))),
        }
    }

    fn validate_roi(&self) -> Result<()> {
        let roi = &self.roi;
        let valid = [roi.sample_radius, roi.sample_height, roi.bond_length]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !valid {
            return Err(Error::Config(format!("region of interest must be non-negative and finite: {:?}", roi)));
        }
        Ok(())
    }

    /// Checks the settings needed by the preprocessing stage.
    pub fn validate_preprocess(&self) -> Result<()> {
        if self.particles.is_none() || self.bonds.is_none() {
            return Err(Error::Config("particle and bond log paths are required".to_string()));
        }
        self.validate_roi()
    }

    /// Checks the settings needed by the clustering stage.
    pub fn validate_cluster(&self) -> Result<()> {
        self.cluster_opts()?;
        self.aggregation.validate()?;
        self.bucket_time_budget()?;
        Ok(())
    }
}
