use std::collections::BTreeMap;

use nalgebra::Point3;

use crate::model::bond::{BondRecord, ReconstructedBond};
use crate::model::particle::ParticleRecord;
use crate::model::time_points::TimePointTable;

/// Outcome of placing one bond in space.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconstruction {
    Placed(ReconstructedBond),
    /// Death time lies past the last recorded sample, the bond survived the run.
    AliveAtEnd,
    /// An endpoint is missing or has no sample at the located index.
    Unplaceable { particle_id: u64 },
}

/// Result of reconstructing all bonds of a run.
#[derive(Clone, Debug, Default)]
pub struct ReconstructionSummary {
    pub bonds: Vec<ReconstructedBond>,
    pub alive_at_end: usize,
    pub unplaceable: usize,
}

#[inline]
fn midpoint(a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
    Point3::from((a.coords + b.coords) * 0.5)
}

/// Places a bond at the midpoint of its endpoints at its death time.
///
/// # Arguments
///
/// * `bond` - Bond, preferably with a resolved death time.
/// * `particles` - All particles keyed by id.
/// * `table` - Shared time axis.
///
/// # Returns
///
/// * `Reconstruction::Placed` with the midpoint at the sample located by
///   binary search, or `AliveAtEnd` if the death time exceeds the last sample.
///
pub fn reconstruct_bond(
    bond: &BondRecord,
    particles: &BTreeMap<u64, ParticleRecord>,
    table: &TimePointTable,
) -> Reconstruction {
    let death_time = bond.death_time();
    if table.is_past_end(death_time) {
        return Reconstruction::AliveAtEnd;
    }
    let index = match table.locate(death_time) {
        Some(i) => i,
        None => return Reconstruction::AliveAtEnd,
    };

    let endpoint = |id: u64| particles.get(&id).and_then(|p| p.position_at(index)).copied();

    let begin_position = match endpoint(bond.begin_particle_id) {
        Some(p) => p,
        None => return Reconstruction::Unplaceable { particle_id: bond.begin_particle_id },
    };
    let end_position = match endpoint(bond.end_particle_id) {
        Some(p) => p,
        None => return Reconstruction::Unplaceable { particle_id: bond.end_particle_id },
    };

    Reconstruction::Placed(ReconstructedBond {
        id: bond.id,
        position: midpoint(&begin_position, &end_position),
        death_time,
        begin_particle_id: bond.begin_particle_id,
        begin_position,
        end_particle_id: bond.end_particle_id,
        end_position,
    })
}

/// Reconstructs every bond, in ascending bond id order.
pub fn reconstruct_all(
    bonds: &BTreeMap<u64, BondRecord>,
    particles: &BTreeMap<u64, ParticleRecord>,
    table: &TimePointTable,
) -> ReconstructionSummary {
    let mut summary = ReconstructionSummary::default();

    for bond in bonds.values() {
        match reconstruct_bond(bond, particles, table) {
            Reconstruction::Placed(b) => summary.bonds.push(b),
            Reconstruction::AliveAtEnd => summary.alive_at_end += 1,
            Reconstruction::Unplaceable { particle_id } => {
                log::warn!("bond {}: no position for particle {}, skipped", bond.id, particle_id);
                summary.unplaceable += 1;
            }
        }
    }

    log::info!(
        "reconstructed {} bonds, {} still alive at simulation end",
        summary.bonds.len(),
        summary.alive_at_end
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::death_time::resolve_all;
    use crate::algorithm::roi::RoiParams;
    use crate::model::particle::TrajectorySample;

    fn particle(id: u64, positions: &[[f64; 3]]) -> ParticleRecord {
        let trajectory = positions
            .iter()
            .enumerate()
            .map(|(i, p)| TrajectorySample::new(i as f64, Point3::new(p[0], p[1], p[2])))
            .collect();
        ParticleRecord::new(id, 1.0, trajectory)
    }

    fn scenario() -> (BTreeMap<u64, ParticleRecord>, BTreeMap<u64, BondRecord>, TimePointTable) {
        let mut particles = BTreeMap::new();
        particles.insert(1, particle(1, &[[0.0, 0.0, 0.0], [0.2, 0.0, 1.0], [0.4, 0.0, 2.0]]));
        particles.insert(2, particle(2, &[[0.0, 0.5, 0.0], [0.0, 0.6, 3.0], [0.0, 0.7, 12.0]]));
        let table = TimePointTable::from_particle(&particles[&1]);

        let mut bonds = BTreeMap::new();
        bonds.insert(1, BondRecord::new(1, 1, 2, 5.0));
        (particles, bonds, table)
    }

    #[test]
    fn test_scenario_midpoint_at_exit_sample() {
        let (particles, mut bonds, table) = scenario();
        resolve_all(&particles, &mut bonds, &RoiParams::new(1.0, 10.0, 0.0));

        match reconstruct_bond(&bonds[&1], &particles, &table) {
            Reconstruction::Placed(b) => {
                assert_eq!(b.death_time, 1.0);
                assert!((b.position - Point3::new(0.1, 0.3, 2.0)).norm() < 1e-12);
                assert_eq!(b.begin_position, Point3::new(0.2, 0.0, 1.0));
                assert_eq!(b.end_position, Point3::new(0.0, 0.6, 3.0));
            }
            other => panic!("expected placed bond, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_bond_past_end_is_dropped() {
        let (particles, bonds, table) = scenario();
        let summary = reconstruct_all(&bonds, &particles, &table);
        assert_eq!(summary.alive_at_end, 1);
        assert!(summary.bonds.is_empty());
    }

    #[test]
    fn test_missing_endpoint_is_unplaceable() {
        let (particles, _, table) = scenario();
        let bond = BondRecord::new(9, 1, 42, 1.0);
        assert_eq!(
            reconstruct_bond(&bond, &particles, &table),
            Reconstruction::Unplaceable { particle_id: 42 }
        );
    }

    #[test]
    fn test_reconstruction_is_idempotent() {
        let (particles, mut bonds, table) = scenario();
        bonds.insert(2, BondRecord::new(2, 2, 1, 0.0));
        bonds.insert(3, BondRecord::new(3, 1, 2, 2.0));
        let roi = RoiParams::new(1.0, 10.0, 0.0);

        resolve_all(&particles, &mut bonds, &roi);
        let first = reconstruct_all(&bonds, &particles, &table);
        resolve_all(&particles, &mut bonds, &roi);
        let second = reconstruct_all(&bonds, &particles, &table);

        assert_eq!(first.bonds, second.bonds);
        assert_eq!(first.bonds.len(), 3);
    }
}
