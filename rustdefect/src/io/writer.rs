use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use dfcore::algorithm::geometry::ClusterRecord;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::io::bond_log::ForceAnomaly;

pub const CLUSTER_HEADER: &str = "X,mm Y,mm Z,mm D,mm N";
pub const STATISTICS_HEADER: &str = "Time(end),s ClusterCount MaxSize";
pub const BOUNDARY_HEADER: &str = "Label X,mm Y,mm Z,mm";
pub const FORCE_ANOMALY_FILE: &str = "force_anomalies.log";

/// One aggregate row of the statistics file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRow {
    pub bucket_end: f64,
    pub cluster_count: usize,
    pub max_size: usize,
}

pub fn cluster_file_name(bucket_start: f64) -> String {
    format!("cluster_{:.6}.txt", bucket_start)
}

pub fn statistics_file_name(last_bucket_start: f64) -> String {
    format!("statistics_{:.6}.txt", last_bucket_start)
}

pub fn max_cluster_file_name(bucket_start: f64) -> String {
    format!("max_cluster_{:.6}.txt", bucket_start)
}

pub fn boundary_file_name(bucket_start: f64) -> String {
    format!("boundary_{:.6}.txt", bucket_start)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    Ok(BufWriter::new(file))
}

/// Writes `cluster_<start>.txt`, one row per cluster.
pub fn write_cluster_file(dir: &Path, bucket_start: f64, records: &[ClusterRecord]) -> Result<PathBuf> {
    let path = dir.join(cluster_file_name(bucket_start));
    let mut out = create(&path)?;
    let io = |e| Error::io(&path, e);

    writeln!(out, "{}", CLUSTER_HEADER).map_err(io)?;
    for r in records {
        writeln!(
            out,
            "{} {} {} {} {}",
            r.centroid.x, r.centroid.y, r.centroid.z, r.diameter, r.size
        )
        .map_err(io)?;
    }
    out.flush().map_err(io)?;
    Ok(path)
}

/// Writes the run statistics, one row per bucket in the given order.
pub fn write_statistics(dir: &Path, last_bucket_start: f64, rows: &[StatisticsRow]) -> Result<PathBuf> {
    let path = dir.join(statistics_file_name(last_bucket_start));
    let mut out = create(&path)?;
    let io = |e| Error::io(&path, e);

    writeln!(out, "{}", STATISTICS_HEADER).map_err(io)?;
    for row in rows {
        writeln!(out, "{} {} {}", row.bucket_end, row.cluster_count, row.max_size).map_err(io)?;
    }
    out.flush().map_err(io)?;
    Ok(path)
}

/// Writes the member coordinates of the largest cluster of a bucket.
pub fn write_max_cluster(dir: &Path, bucket_start: f64, members: &[Point3<f64>]) -> Result<PathBuf> {
    let path = dir.join(max_cluster_file_name(bucket_start));
    let mut out = create(&path)?;
    let io = |e| Error::io(&path, e);

    for p in members {
        writeln!(out, "{} {} {}", p.x, p.y, p.z).map_err(io)?;
    }
    out.flush().map_err(io)?;
    Ok(path)
}

/// Writes the boundary subsamples of the flagged clusters for plotting.
pub fn write_boundaries(dir: &Path, bucket_start: f64, records: &[ClusterRecord]) -> Result<PathBuf> {
    let path = dir.join(boundary_file_name(bucket_start));
    let mut out = create(&path)?;
    let io = |e| Error::io(&path, e);

    writeln!(out, "{}", BOUNDARY_HEADER).map_err(io)?;
    for r in records.iter().filter(|r| r.flagged) {
        for p in &r.boundary {
            writeln!(out, "{} {} {} {}", r.label, p.x, p.y, p.z).map_err(io)?;
        }
    }
    out.flush().map_err(io)?;
    Ok(path)
}

/// Writes the force anomaly side log, one line per anomaly.
pub fn write_force_anomalies(path: &Path, anomalies: &[ForceAnomaly]) -> Result<()> {
    let mut out = create(path)?;
    let io = |e| Error::io(path, e);
    for a in anomalies {
        writeln!(
            out,
            "Bond id {} (line {}): expected zero force after death, got {} at time {}",
            a.bond_id, a.line, a.force, a.time
        )
        .map_err(io)?;
    }
    out.flush().map_err(io)?;
    Ok(())
}
