use std::cmp::Ordering;

use nalgebra::Point3;
use ordered_float::OrderedFloat;

/// Resolution at which z and cylindrical radius are considered equal.
pub const ORDERING_TOLERANCE: f64 = 1e-6;

/// Sort key of a point: z, then cylindrical radius, both on a
/// `ORDERING_TOLERANCE` grid, then azimuth.
pub type OrderKey = (i64, i64, OrderedFloat<f64>);

#[inline]
fn quantize(value: f64) -> i64 {
    (value / ORDERING_TOLERANCE).round() as i64
}

pub fn order_key(p: &Point3<f64>) -> OrderKey {
    let radius = (p.x * p.x + p.y * p.y).sqrt();
    let azimuth = p.y.atan2(p.x);
    (quantize(p.z), quantize(radius), OrderedFloat(azimuth))
}

/// Total order on points used for chunk membership and boundary sampling.
pub fn compare_points(a: &Point3<f64>, b: &Point3<f64>) -> Ordering {
    order_key(a).cmp(&order_key(b))
}

/// Sorts points in place by `order_key`. Stable, so exact duplicates keep
/// their input order.
pub fn sort_points(points: &mut [Point3<f64>]) {
    points.sort_by_cached_key(order_key);
}
