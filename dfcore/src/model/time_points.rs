use serde::{Deserialize, Serialize};

use crate::model::particle::ParticleRecord;

/// Tolerance used when comparing a death time to the end of the time axis.
pub const TIME_TOLERANCE: f64 = 1e-9;

/// Index of `value` in an ascending slice, or of the largest element below it.
///
/// Values below the first element map to index 0, values past the last
/// element map to the last index. Returns `None` only for an empty slice.
pub fn floor_index(sorted: &[f64], value: f64) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }
    let upper = sorted.partition_point(|&t| t <= value);
    Some(upper.saturating_sub(1))
}

/// The ascending simulation time samples shared by every particle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePointTable {
    times: Vec<f64>,
}

impl TimePointTable {
    pub fn new(times: Vec<f64>) -> Self {
        debug_assert!(times.windows(2).all(|w| w[0] < w[1]), "time points must ascend");
        TimePointTable { times }
    }

    /// Derives the table from the trajectory of a particle.
    pub fn from_particle(particle: &ParticleRecord) -> Self {
        TimePointTable::new(particle.times().collect())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }

    pub fn first(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// `(first, last)` of the table.
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((self.first()?, self.last()?))
    }

    /// Sample index for `time` by binary search: exact for recorded values,
    /// floor otherwise.
    pub fn locate(&self, time: f64) -> Option<usize> {
        floor_index(&self.times, time)
    }

    /// True if `time` lies after the last recorded sample.
    pub fn is_past_end(&self, time: f64) -> bool {
        match self.last() {
            Some(last) => time > last + TIME_TOLERANCE,
            None => true,
        }
    }
}
