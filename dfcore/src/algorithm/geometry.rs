use itertools::Itertools;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::algorithm::hull::convex_hull;
use crate::algorithm::ordering::sort_points;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryOpts {
    /// Upper bound of the boundary subsample handed to a renderer
    pub max_boundary_points: usize,
    /// Number of largest clusters per bucket flagged for visualization
    pub top_clusters: usize,
    /// Hull face tolerance in mm
    pub hull_epsilon: f64,
}

impl Default for GeometryOpts {
    fn default() -> Self {
        Self {
            max_boundary_points: 300,
            top_clusters: 10,
            hull_epsilon: 1e-9,
        }
    }
}

/// Geometry of one cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Label in bucket order (chunk by chunk)
    pub label: usize,
    pub size: usize,
    pub centroid: Point3<f64>,
    /// Largest centroid-to-member distance, see `diameter`
    pub diameter: f64,
    /// Ordered boundary subsample, only filled for flagged clusters
    pub boundary: Vec<Point3<f64>>,
    pub boundary_from_hull: bool,
    pub flagged: bool,
}

/// Componentwise mean of the members, `None` for an empty set.
pub fn centroid(members: &[Point3<f64>]) -> Option<Point3<f64>> {
    if members.is_empty() {
        return None;
    }
    let sum = members.iter().fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / members.len() as f64))
}

/// Largest distance from the centroid to any member.
///
/// This is what the downstream statistics call the cluster diameter. It is
/// not the maximum pairwise distance (for two points it is half of it).
pub fn diameter(members: &[Point3<f64>], centroid: &Point3<f64>) -> f64 {
    members
        .iter()
        .map(|p| (p - centroid).norm())
        .fold(0.0, f64::max)
}

/// Every `ceil(len / max)`-th element, so at most `max` elements remain.
pub fn stride_downsample<T: Clone>(items: &[T], max: usize) -> Vec<T> {
    if max == 0 {
        return Vec::new();
    }
    let stride = items.len().div_ceil(max).max(1);
    items.iter().step_by(stride).cloned().collect()
}

/// Ordered, downsampled boundary of a cluster.
///
/// Uses the convex hull vertices when the cluster has more than 3 members and
/// a hull exists; otherwise all members. Either set is ordered like chunk
/// membership and then stride-downsampled.
///
/// # Returns
///
/// * `(boundary, from_hull)`
///
pub fn boundary_subsample(members: &[Point3<f64>], opts: &GeometryOpts) -> (Vec<Point3<f64>>, bool) {
    let hull = if members.len() > 3 {
        convex_hull(members, opts.hull_epsilon).ok()
    } else {
        None
    };

    let (mut chosen, from_hull) = match hull {
        Some(vertices) => (vertices.into_iter().map(|i| members[i]).collect::<Vec<_>>(), true),
        None => (members.to_vec(), false),
    };
    sort_points(&mut chosen);
    (stride_downsample(&chosen, opts.max_boundary_points), from_hull)
}

/// Labels of the `n` largest clusters, size descending, ties by label.
pub fn largest_labels(records: &[ClusterRecord], n: usize) -> Vec<usize> {
    records
        .iter()
        .sorted_by(|a, b| b.size.cmp(&a.size).then(a.label.cmp(&b.label)))
        .take(n)
        .map(|r| r.label)
        .collect()
}

/// Computes geometry for the clusters of one bucket.
///
/// # Arguments
///
/// * `clusters` - Member sets in label order.
/// * `opts` - Boundary and flagging options.
///
/// # Returns
///
/// * one record per non-empty cluster; the `top_clusters` largest are flagged
///   and carry a boundary subsample.
///
pub fn describe_clusters(clusters: &[Vec<Point3<f64>>], opts: &GeometryOpts) -> Vec<ClusterRecord> {
    let mut records: Vec<ClusterRecord> = clusters
        .iter()
        .enumerate()
        .filter_map(|(label, members)| {
            let c = centroid(members)?;
            Some(ClusterRecord {
                label,
                size: members.len(),
                centroid: c,
                diameter: diameter(members, &c),
                boundary: Vec::new(),
                boundary_from_hull: false,
                flagged: false,
            })
        })
        .collect();

    for label in largest_labels(&records, opts.top_clusters) {
        if let Some(record) = records.iter_mut().find(|r| r.label == label) {
            let (boundary, from_hull) = boundary_subsample(&clusters[label], opts);
            record.boundary = boundary;
            record.boundary_from_hull = from_hull;
            record.flagged = true;
        }
    }
    records
}
