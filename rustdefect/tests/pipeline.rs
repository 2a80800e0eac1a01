use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use dfcore::model::point::BondFailure;
use rustdefect::io::preprocessed::read_preprocessed;
use rustdefect::pipeline::cluster::run_clustering;
use rustdefect::pipeline::config::PipelineConfig;
use rustdefect::pipeline::preprocess::run_preprocess;
use rustdefect::pipeline::summary::RunSummary;
use rustdefect::Error;

// Four particles on a line at z = 1 mm, particle 4 leaves the sample at the
// last time point. Positions are in metres.
const PARTICLES: &str = "\
0 1 5 0.0001 2 0 12 0 0 0.001 2 0.001 12 0 0 0.001 2 0.002 12 0 0 0.001
0 2 5 0.0001 2 0 12 0.0002 0 0.001 2 0.001 12 0.0002 0 0.001 2 0.002 12 0.0002 0 0.001
0 3 5 0.0001 2 0 12 0.0004 0 0.001 2 0.001 12 0.0004 0 0.001 2 0.002 12 0.0004 0 0.001
0 4 5 0.0001 2 0 12 0.0006 0 0.001 2 0.001 12 0.0006 0 0.001 2 0.002 12 0.0006 0 0.05
";

// Bond 1 reports a force after its death, bond 3 survives the run and bond 4
// dies late but its end particle left the region earlier.
const BONDS: &str = "\
0 1 5 1 2 24 0 0.0006 2 0 18 0.5 2 0.001 18 2.0 2 0.002 18 0
0 2 5 2 3 24 0 0.0007 2 0 18 0.5 2 0.001 18 0 2 0.002 18 0
0 3 5 1 3 24 0 1.0 2 0 18 0.5 2 0.001 18 0.5 2 0.002 18 0.5
0 4 5 3 4 24 0 0.0019 2 0 18 0.5 2 0.001 18 0.5 2 0.002 18 0
";

fn write_logs(dir: &Path, particles: &str, bonds: &str) -> (PathBuf, PathBuf) {
    let p = dir.join("particles.txt");
    let b = dir.join("bonds.txt");
    fs::write(&p, particles).unwrap();
    fs::write(&b, bonds).unwrap();
    (p, b)
}

fn config(dir: &Path, integral: bool) -> PipelineConfig {
    let (particles, bonds) = write_logs(dir, PARTICLES, BONDS);
    let mut config = PipelineConfig::default();
    config.particles = Some(particles);
    config.bonds = Some(bonds);
    config.output = dir.join("out");
    config.cluster.distance_threshold = 0.25;
    config.cluster.chunk_size = Some(100);
    config.aggregation.step = 0.001;
    config.aggregation.integral = integral;
    config
}

/// (cluster count, max size) per row of the statistics file.
fn statistics(path: &Path) -> Vec<(usize, usize)> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            (cols[1].parse().unwrap(), cols[2].parse().unwrap())
        })
        .collect()
}

fn member_total(cluster_file: &Path) -> usize {
    fs::read_to_string(cluster_file)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().last().unwrap().parse::<usize>().unwrap())
        .sum()
}

#[test]
fn test_preprocess_then_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), false);

    let pre = run_preprocess(&config).unwrap();
    assert_eq!(pre.summary.particles, 4);
    assert_eq!(pre.summary.bonds, 4);
    assert_eq!(pre.summary.event_count, 3);
    assert_eq!(pre.summary.reconstructed, 3);
    assert_eq!(pre.summary.alive_at_end, 1);
    assert_eq!(pre.summary.corrected_death_times, 1);
    assert_eq!(pre.summary.force_anomalies, 1);
    assert!(config.output.join("force_anomalies.log").exists());

    let bond4 = pre.bonds.iter().find(|b| b.id == 4).unwrap();
    assert!((bond4.death_time - 0.001).abs() < 1e-12);
    assert!((bond4.position.x - 0.5).abs() < 1e-9);
    assert!((bond4.position.z - 1.0).abs() < 1e-9);

    // the preprocessed file carries the same failures as memory
    let from_file = read_preprocessed(&config.output.join("bonds_preprocessed.txt")).unwrap();
    assert_eq!(from_file.len(), 3);

    let failures: Vec<BondFailure> = pre.bonds.iter().map(BondFailure::from).collect();
    let summary = run_clustering(&failures, &pre.time_points, &config).unwrap();
    assert_eq!(summary.buckets, 3);
    assert_eq!(summary.failed_buckets, 0);
    assert_eq!(summary.total_clusters, 2);

    let stats = statistics(&config.output.join("statistics_0.002000.txt"));
    assert_eq!(stats, vec![(1, 2), (1, 1), (0, 0)]);
}

#[test]
fn test_integral_mode_is_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), true);
    let pre = run_preprocess(&config).unwrap();
    let failures: Vec<BondFailure> = pre.bonds.iter().map(BondFailure::from).collect();
    run_clustering(&failures, &pre.time_points, &config).unwrap();

    let totals: Vec<usize> = ["0.000000", "0.001000", "0.002000"]
        .iter()
        .map(|start| member_total(&config.output.join(format!("cluster_{}.txt", start))))
        .collect();
    assert_eq!(totals, vec![2, 3, 3]);
    assert!(totals.windows(2).all(|w| w[0] <= w[1]));

    let stats = statistics(&config.output.join("statistics_0.002000.txt"));
    assert_eq!(stats, vec![(1, 2), (1, 3), (1, 3)]);
}

#[test]
fn test_malformed_particle_log_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), false);
    let bad = PARTICLES.replacen("2 0.001 12 0.0002", "2 0.001 13 0.0002", 1);
    let (particles, _) = write_logs(dir.path(), &bad, BONDS);
    config.particles = Some(particles);

    match run_preprocess(&config) {
        Err(Error::Format { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected a format error, got {:?}", other.map(|o| o.summary)),
    }
    assert!(!config.output.join("bonds_preprocessed.txt").exists());
}

#[test]
fn test_event_count_mismatch_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), false);
    let short_bonds = "0 1 5 1 2 24 0 0.0006 2 0 18 0.5\n";
    let (_, bonds) = write_logs(dir.path(), PARTICLES, short_bonds);
    config.bonds = Some(bonds);

    assert!(matches!(run_preprocess(&config), Err(Error::Consistency { .. })));
}

#[test]
fn test_cli_run_writes_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (particles, bonds) = write_logs(dir.path(), PARTICLES, BONDS);
    let out = dir.path().join("cli_out");

    let status = Command::new(env!("CARGO_BIN_EXE_rustdefect"))
        .arg("run")
        .arg("--particles")
        .arg(&particles)
        .arg("--bonds")
        .arg(&bonds)
        .arg("--output")
        .arg(&out)
        .args(["--distance", "0.25", "--step", "0.001", "--chunk-size", "100", "--show"])
        .status()
        .unwrap();
    assert!(status.success());

    let summary: RunSummary =
        serde_json::from_str(&fs::read_to_string(out.join("run_summary.json")).unwrap()).unwrap();
    assert_eq!(summary.preprocess.unwrap().reconstructed, 3);
    assert_eq!(summary.cluster.unwrap().clustered_buckets, 3);
    assert!(out.join("boundary_0.000000.txt").exists());
}

#[test]
fn test_cli_requires_chunk_size() {
    let dir = tempfile::tempdir().unwrap();
    let (particles, bonds) = write_logs(dir.path(), PARTICLES, BONDS);

    let output = Command::new(env!("CARGO_BIN_EXE_rustdefect"))
        .arg("run")
        .arg("--particles")
        .arg(&particles)
        .arg("--bonds")
        .arg(&bonds)
        .arg("--output")
        .arg(dir.path().join("cli_out"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chunk size"));
}
