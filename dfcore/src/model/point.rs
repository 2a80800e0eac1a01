use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::model::bond::ReconstructedBond;

/// Position and resolved death time of one failed bond, the input of the
/// time window aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BondFailure {
    pub position: Point3<f64>,
    pub time: f64,
}

impl BondFailure {
    pub fn new(position: Point3<f64>, time: f64) -> Self {
        BondFailure { position, time }
    }
}

impl From<&ReconstructedBond> for BondFailure {
    fn from(bond: &ReconstructedBond) -> Self {
        BondFailure::new(bond.position, bond.death_time)
    }
}

/// A failure position tagged with the bucket its bond resolved into.
///
/// In integral aggregation a point keeps the tag of the bucket it was
/// assigned to, even when later buckets carry a copy of it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpatialPoint {
    pub position: Point3<f64>,
    pub bucket: usize,
}
