use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// A single recorded sample of a particle trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub time: f64,
    /// Position in millimeters.
    pub position: Point3<f64>,
}

impl TrajectorySample {
    pub fn new(time: f64, position: Point3<f64>) -> Self {
        TrajectorySample { time, position }
    }
}

/// Represents a particle of the bonded-particle model.
///
/// # Description
///
/// The trajectory is ordered by simulation time. Every particle of one log
/// carries the same number of samples, so a sample index addresses the same
/// simulation time for all particles.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub id: u64,
    pub radius: f64,
    pub trajectory: Vec<TrajectorySample>,
}

impl ParticleRecord {
    /// Constructs a new `ParticleRecord`.
    ///
    /// # Arguments
    ///
    /// * `id` - Unique particle id as logged.
    /// * `radius` - Particle radius, positive.
    /// * `trajectory` - Samples in ascending time order.
    ///
    pub fn new(id: u64, radius: f64, trajectory: Vec<TrajectorySample>) -> Self {
        ParticleRecord { id, radius, trajectory }
    }

    /// Number of trajectory samples, the "event count" of the particle log.
    pub fn event_count(&self) -> usize {
        self.trajectory.len()
    }

    pub fn position_at(&self, index: usize) -> Option<&Point3<f64>> {
        self.trajectory.get(index).map(|s| &s.position)
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.trajectory.iter().map(|s| s.time)
    }
}
