use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::algorithm::roi::RoiParams;
use crate::model::bond::BondRecord;
use crate::model::particle::ParticleRecord;

/// Exit time of a particle that stays inside the region for the whole run.
pub const NEVER_EXITED: f64 = f64::INFINITY;

/// Time at which a particle is last seen inside the region of interest.
///
/// The first sample outside the region sets the exit time to the time of the
/// sample before it. If the very first sample is already outside there is no
/// earlier sample and its own time is used.
///
/// # Arguments
///
/// * `particle` - Particle with a time-ordered trajectory.
/// * `roi` - Region of interest.
///
/// # Returns
///
/// * exit time, or `NEVER_EXITED` if every sample is inside.
///
pub fn particle_exit_time(particle: &ParticleRecord, roi: &RoiParams) -> f64 {
    let trajectory = &particle.trajectory;
    match trajectory.iter().position(|s| !roi.contains(&s.position)) {
        Some(0) => trajectory[0].time,
        Some(i) => trajectory[i - 1].time,
        None => NEVER_EXITED,
    }
}

/// Exit times of all particles, keyed by particle id.
pub fn exit_times(
    particles: &BTreeMap<u64, ParticleRecord>,
    roi: &RoiParams,
) -> BTreeMap<u64, f64> {
    particles
        .par_iter()
        .map(|(&id, p)| (id, particle_exit_time(p, roi)))
        .collect()
}

/// Writes the resolved death time of every bond:
/// `min(raw, exit(begin), exit(end))`.
///
/// Endpoints are expected to be validated; an id missing from `exit_times`
/// counts as never exiting.
///
/// # Returns
///
/// * number of bonds whose death time moved earlier than the logged one.
///
pub fn resolve_death_times(
    bonds: &mut BTreeMap<u64, BondRecord>,
    exit_times: &BTreeMap<u64, f64>,
) -> usize {
    let exit = |id: u64| exit_times.get(&id).copied().unwrap_or(NEVER_EXITED);

    bonds
        .values_mut()
        .map(|bond| {
            let resolved = bond.resolve(exit(bond.begin_particle_id), exit(bond.end_particle_id));
            usize::from(resolved < bond.raw_death_time)
        })
        .sum()
}

/// Runs both steps of the death time resolution.
pub fn resolve_all(
    particles: &BTreeMap<u64, ParticleRecord>,
    bonds: &mut BTreeMap<u64, BondRecord>,
    roi: &RoiParams,
) -> usize {
    let exits = exit_times(particles, roi);
    let corrected = resolve_death_times(bonds, &exits);
    log::info!(
        "resolved death times of {} bonds, {} moved earlier by particles leaving the region",
        bonds.len(),
        corrected
    );
    corrected
}
