use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A bond between two particles as read from the bond log.
///
/// `resolved_death_time` is unset until the death time resolver has run.
/// Once set it never exceeds `raw_death_time`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BondRecord {
    pub id: u64,
    pub begin_particle_id: u64,
    pub end_particle_id: u64,
    pub raw_death_time: f64,
    resolved_death_time: Option<f64>,
}

impl BondRecord {
    pub fn new(id: u64, begin_particle_id: u64, end_particle_id: u64, raw_death_time: f64) -> Self {
        BondRecord {
            id,
            begin_particle_id,
            end_particle_id,
            raw_death_time,
            resolved_death_time: None,
        }
    }

    pub fn resolved_death_time(&self) -> Option<f64> {
        self.resolved_death_time
    }

    /// Resolved death time if available, the logged one otherwise.
    pub fn death_time(&self) -> f64 {
        self.resolved_death_time.unwrap_or(self.raw_death_time)
    }

    /// Derives the resolved death time from the logged one and the exit times
    /// of both endpoints. Always recomputed from `raw_death_time`, so calling
    /// it again with the same exit times gives the same value.
    pub(crate) fn resolve(&mut self, begin_exit: f64, end_exit: f64) -> f64 {
        let resolved = self.raw_death_time.min(begin_exit).min(end_exit);
        self.resolved_death_time = Some(resolved);
        resolved
    }
}

/// A bond placed in space at its resolved death time.
///
/// One row of the preprocessed bond file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedBond {
    pub id: u64,
    /// Midpoint of both endpoints, mm.
    pub position: Point3<f64>,
    pub death_time: f64,
    pub begin_particle_id: u64,
    pub begin_position: Point3<f64>,
    pub end_particle_id: u64,
    pub end_position: Point3<f64>,
}
