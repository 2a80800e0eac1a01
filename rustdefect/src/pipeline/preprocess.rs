use std::fs;
use std::path::Path;

use dfcore::algorithm::death_time::resolve_all;
use dfcore::algorithm::reconstruct::reconstruct_all;
use dfcore::model::bond::ReconstructedBond;
use dfcore::model::time_points::TimePointTable;

use crate::error::{Error, Result};
use crate::io::bond_log::read_bond_log;
use crate::io::particle_log::read_particle_log;
use crate::io::preprocessed::{write_preprocessed, PREPROCESSED_FILE};
use crate::io::sidecar::{write_time_points, TIME_POINTS_FILE};
use crate::io::validate::cross_validate;
use crate::io::writer::{write_force_anomalies, FORCE_ANOMALY_FILE};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::summary::PreprocessSummary;

/// Surviving bonds and the time axis, ready for clustering.
#[derive(Clone, Debug)]
pub struct PreprocessOutput {
    pub bonds: Vec<ReconstructedBond>,
    pub time_points: TimePointTable,
    pub summary: PreprocessSummary,
}

/// Reads both logs, resolves death times and places every failed bond.
///
/// Both logs are parsed concurrently. Any format or consistency error aborts
/// here, before anything is written. Writes `bonds_preprocessed.txt`,
/// `time_points.txt` and, if needed, the force anomaly log into the output
/// directory.
pub fn run_preprocess(config: &PipelineConfig) -> Result<PreprocessOutput> {
    config.validate_preprocess()?;
    let (particle_path, bond_path) = match (&config.particles, &config.bonds) {
        (Some(p), Some(b)) => (p.as_path(), b.as_path()),
        _ => return Err(Error::Config("particle and bond log paths are required".to_string())),
    };

    let (particle_log, bond_log) = rayon::join(
        || read_particle_log(particle_path),
        || read_bond_log(bond_path),
    );
    let particle_log = particle_log?;
    let mut bond_log = bond_log?;
    cross_validate(
        &particle_log,
        &bond_log,
        &particle_path.display().to_string(),
        &bond_path.display().to_string(),
    )?;

    let output: &Path = &config.output;
    fs::create_dir_all(output).map_err(|e| Error::io(output, e))?;

    if !bond_log.anomalies.is_empty() {
        write_force_anomalies(&output.join(FORCE_ANOMALY_FILE), &bond_log.anomalies)?;
    }

    let corrected = resolve_all(&particle_log.particles, &mut bond_log.bonds, &config.roi);
    let reconstruction = reconstruct_all(&bond_log.bonds, &particle_log.particles, &particle_log.time_points);

    write_preprocessed(&output.join(PREPROCESSED_FILE), &reconstruction.bonds)?;
    write_time_points(&output.join(TIME_POINTS_FILE), &particle_log.time_points)?;

    let summary = PreprocessSummary {
        particles: particle_log.particles.len(),
        bonds: bond_log.bonds.len(),
        event_count: particle_log.event_count,
        force_anomalies: bond_log.anomalies.len(),
        corrected_death_times: corrected,
        reconstructed: reconstruction.bonds.len(),
        alive_at_end: reconstruction.alive_at_end,
        unplaceable: reconstruction.unplaceable,
    };

    Ok(PreprocessOutput {
        bonds: reconstruction.bonds,
        time_points: particle_log.time_points,
        summary,
    })
}
