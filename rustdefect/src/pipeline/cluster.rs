use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use nalgebra::Point3;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use dfcore::algorithm::aggregate::{aggregate, Bucket};
use dfcore::algorithm::geometry::{describe_clusters, largest_labels, ClusterRecord, GeometryOpts};
use dfcore::algorithm::linkage::{cluster_points, ChunkOutcome, ClusterOpts, TimeBudget};
use dfcore::model::point::BondFailure;
use dfcore::model::time_points::TimePointTable;

use crate::error::{Error, Result};
use crate::io::preprocessed::{read_preprocessed, PREPROCESSED_FILE};
use crate::io::sidecar::{read_time_points, TIME_POINTS_FILE};
use crate::io::writer::{
    write_boundaries, write_cluster_file, write_max_cluster, write_statistics, StatisticsRow,
};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::summary::ClusterSummary;

/// Settings shared by every bucket worker.
struct BucketContext<'a> {
    opts: ClusterOpts,
    geometry: &'a GeometryOpts,
    budget: Option<Duration>,
    output: &'a Path,
    show: bool,
}

/// Clusters of one bucket, merged over its chunks.
#[derive(Clone, Debug)]
pub struct BucketClusters {
    pub records: Vec<ClusterRecord>,
    pub largest: Vec<Point3<f64>>,
    pub failed_chunks: usize,
}

/// Result of one bucket after its files were written.
#[derive(Debug)]
pub enum BucketOutcome {
    Clustered { row: StatisticsRow, clusters: usize, failed_chunks: usize },
    Failed { reason: Error },
}

/// Sorts, chunks and clusters the points of one bucket.
///
/// Failed chunks are logged and skipped. An exhausted time budget fails the
/// whole bucket instead.
///
/// # Arguments
///
/// * `bucket` - Points of one time window.
/// * `opts` - Threshold and chunk size.
/// * `geometry` - Boundary and flagging options.
/// * `budget` - Optional wall-clock limit for this bucket.
///
pub fn cluster_bucket(
    bucket: &Bucket,
    opts: &ClusterOpts,
    geometry: &GeometryOpts,
    budget: Option<Duration>,
) -> Result<BucketClusters> {
    let budget = budget.map(TimeBudget::start);
    let mut points: Vec<Point3<f64>> = bucket.points.iter().map(|p| p.position).collect();

    let mut clusters: Vec<Vec<Point3<f64>>> = Vec::new();
    let mut failed_chunks = 0;
    for outcome in cluster_points(&mut points, opts, budget.as_ref()) {
        match outcome {
            ChunkOutcome::Clustered(chunk) => clusters.extend(chunk.clusters),
            ChunkOutcome::Failed { reason: reason @ dfcore::Error::TimeBudgetExceeded { .. }, .. } => {
                return Err(reason.into());
            }
            ChunkOutcome::Failed { chunk, range, reason } => {
                warn!(
                    "bucket {:.6}: chunk {} (points {}..{}) skipped: {}",
                    bucket.start, chunk, range.start, range.end, reason
                );
                failed_chunks += 1;
            }
        }
    }

    let records = describe_clusters(&clusters, geometry);
    let largest = largest_labels(&records, 1)
        .first()
        .and_then(|label| clusters.get(*label).cloned())
        .unwrap_or_default();

    Ok(BucketClusters { records, largest, failed_chunks })
}

fn process_bucket(bucket: &Bucket, ctx: &BucketContext) -> Result<(StatisticsRow, BucketClusters)> {
    let clusters = cluster_bucket(bucket, &ctx.opts, ctx.geometry, ctx.budget)?;

    write_cluster_file(ctx.output, bucket.start, &clusters.records)?;
    if !clusters.largest.is_empty() {
        write_max_cluster(ctx.output, bucket.start, &clusters.largest)?;
    }
    if ctx.show {
        write_boundaries(ctx.output, bucket.start, &clusters.records)?;
    }

    let row = StatisticsRow {
        bucket_end: bucket.end,
        cluster_count: clusters.records.len(),
        max_size: clusters.records.iter().map(|r| r.size).max().unwrap_or(0),
    };
    Ok((row, clusters))
}

/// Aggregates failures into buckets, clusters every bucket in parallel and
/// writes the per-bucket files and the statistics file.
///
/// A failing bucket is logged and leaves no cluster file and no statistics
/// row; the remaining buckets are unaffected.
///
/// # Arguments
///
/// * `failures` - Reconstructed bond positions with their death times.
/// * `time_points` - Time axis of the simulation.
/// * `config` - Pipeline configuration.
///
/// # Returns
///
/// * counters of the stage.
///
pub fn run_clustering(
    failures: &[BondFailure],
    time_points: &TimePointTable,
    config: &PipelineConfig,
) -> Result<ClusterSummary> {
    config.validate_cluster()?;
    let opts = config.cluster_opts()?;
    let budget = config.bucket_time_budget()?;
    let range = time_points
        .range()
        .ok_or_else(|| Error::Config("time point table is empty".to_string()))?;

    let output: &Path = &config.output;
    fs::create_dir_all(output).map_err(|e| Error::io(output, e))?;

    let buckets = aggregate(failures, range, &config.aggregation)?;
    info!(
        "clustering {} failures in {} buckets (step {}, integral {})",
        failures.len(),
        buckets.len(),
        config.aggregation.step,
        config.aggregation.integral
    );

    let ctx = BucketContext {
        opts,
        geometry: &config.geometry,
        budget,
        output,
        show: config.show,
    };

    let work = || -> Vec<BucketOutcome> {
        buckets
            .par_iter()
            .map(|bucket| match process_bucket(bucket, &ctx) {
                Ok((row, clusters)) => BucketOutcome::Clustered {
                    row,
                    clusters: clusters.records.len(),
                    failed_chunks: clusters.failed_chunks,
                },
                Err(reason) => {
                    warn!("bucket {} [{:.6}, {:.6}) skipped: {}", bucket.index, bucket.start, bucket.end, reason);
                    BucketOutcome::Failed { reason }
                }
            })
            .collect()
    };

    // 0 threads keeps the global pool
    let outcomes = if config.threads == 0 {
        work()
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| Error::Config(format!("cannot build thread pool: {}", e)))?;
        pool.install(work)
    };

    let mut summary = ClusterSummary {
        failures: failures.len(),
        buckets: buckets.len(),
        ..ClusterSummary::default()
    };
    let mut rows = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            BucketOutcome::Clustered { row, clusters, failed_chunks } => {
                summary.clustered_buckets += 1;
                summary.total_clusters += clusters;
                summary.failed_chunks += failed_chunks;
                rows.push(row);
            }
            BucketOutcome::Failed { .. } => summary.failed_buckets += 1,
        }
    }

    if let Some(last) = buckets.last() {
        summary.statistics_file = Some(write_statistics(output, last.start, &rows)?);
    }
    info!(
        "{} of {} buckets clustered, {} clusters, {} chunks skipped",
        summary.clustered_buckets, summary.buckets, summary.total_clusters, summary.failed_chunks
    );
    Ok(summary)
}

/// Location of the time point sidecar when none is configured: next to the
/// preprocessed file.
pub fn default_time_points_path(preprocessed: &Path) -> PathBuf {
    preprocessed
        .parent()
        .map(|dir| dir.join(TIME_POINTS_FILE))
        .unwrap_or_else(|| PathBuf::from(TIME_POINTS_FILE))
}

/// Clustering stage on its own: reads a preprocessed bond file and its time
/// point sidecar, then runs [`run_clustering`].
pub fn run_cluster_stage(config: &PipelineConfig) -> Result<ClusterSummary> {
    config.validate_cluster()?;
    let preprocessed = config
        .preprocessed
        .clone()
        .unwrap_or_else(|| config.output.join(PREPROCESSED_FILE));
    let time_points_path = config
        .time_points
        .clone()
        .unwrap_or_else(|| default_time_points_path(&preprocessed));

    let failures = read_preprocessed(&preprocessed)?;
    let time_points = read_time_points(&time_points_path)?;
    info!(
        "read {} failures from {} and {} time points from {}",
        failures.len(),
        preprocessed.display(),
        time_points.len(),
        time_points_path.display()
    );
    run_clustering(&failures, &time_points, config)
}
