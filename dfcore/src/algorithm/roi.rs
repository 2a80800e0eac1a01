use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Cylindrical region of interest around the sample, axis along z.
///
/// All lengths are in millimeters, the unit of parsed particle positions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiParams {
    /// Sample radius R
    pub sample_radius: f64,
    /// Sample half height H, the cylinder spans [-(H+L), H+L)
    pub sample_height: f64,
    /// Average bond length L, added to both R and H
    pub bond_length: f64,
}

impl Default for RoiParams {
    fn default() -> Self {
        Self {
            sample_radius: 5.0,
            sample_height: 20.0,
            bond_length: 0.3,
        }
    }
}

impl RoiParams {
    pub fn new(sample_radius: f64, sample_height: f64, bond_length: f64) -> Self {
        RoiParams { sample_radius, sample_height, bond_length }
    }

    /// Checks whether a point lies inside the region.
    ///
    /// # Arguments
    ///
    /// * `p` - Point in millimeters.
    ///
    /// # Returns
    ///
    /// * `true` iff `-(H+L) <= z < H+L` and `x² + y² <= (R+L)²`.
    ///
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        let half_height = self.sample_height + self.bond_length;
        if !(-half_height <= p.z && p.z < half_height) {
            return false;
        }
        let radius = self.sample_radius + self.bond_length;
        p.x * p.x + p.y * p.y <= radius * radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_bounds_are_half_open() {
        let roi = RoiParams::new(1.0, 10.0, 0.5);
        assert!(roi.contains(&Point3::new(0.0, 0.0, -10.5)));
        assert!(!roi.contains(&Point3::new(0.0, 0.0, 10.5)));
        assert!(roi.contains(&Point3::new(0.0, 0.0, 10.49)));
        assert!(!roi.contains(&Point3::new(0.0, 0.0, -10.51)));
    }

    #[test]
    fn test_radius_uses_squared_distance() {
        let roi = RoiParams::new(1.0, 10.0, 0.0);
        assert!(roi.contains(&Point3::new(1.0, 0.0, 0.0)));
        assert!(roi.contains(&Point3::new(0.6, 0.8, 0.0)));
        assert!(!roi.contains(&Point3::new(0.8, 0.8, 0.0)));
    }
}
