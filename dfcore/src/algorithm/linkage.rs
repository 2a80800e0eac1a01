use std::ops::Range;
use std::time::{Duration, Instant};

use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::ordering::sort_points;
use crate::error::{Error, Result};

/// Options of the chunked single-linkage clustering.
///
/// There is no default chunk size: it trades accuracy for run time and has
/// to be chosen for the data at hand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterOpts {
    /// Two clusters merge iff their closest members are strictly nearer than this (mm)
    pub distance_threshold: f64,
    /// Number of consecutive sorted points clustered together
    pub chunk_size: usize,
}

impl ClusterOpts {
    pub fn new(distance_threshold: f64, chunk_size: usize) -> Result<Self> {
        let opts = ClusterOpts { distance_threshold, chunk_size };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.distance_threshold.is_nan() || self.distance_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "distance threshold must be non-negative, got {}",
                self.distance_threshold
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Wall-clock budget shared by all chunks of one bucket.
#[derive(Clone, Copy, Debug)]
pub struct TimeBudget {
    started: Instant,
    budget: Duration,
}

impl TimeBudget {
    pub fn start(budget: Duration) -> Self {
        TimeBudget { started: Instant::now(), budget }
    }

    pub fn check(&self) -> Result<()> {
        if self.started.elapsed() > self.budget {
            return Err(Error::TimeBudgetExceeded { budget_secs: self.budget.as_secs_f64() });
        }
        Ok(())
    }
}

/// Flat cluster assignment of one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkLabels {
    /// Label per point, numbered by first occurrence
    pub labels: Vec<usize>,
    pub n_clusters: usize,
}

/// Clusters of one chunk, members grouped by label.
#[derive(Clone, Debug)]
pub struct ChunkClustering {
    pub chunk: usize,
    pub range: Range<usize>,
    pub labels: ChunkLabels,
    pub clusters: Vec<Vec<Point3<f64>>>,
}

/// Per-chunk result: clustered, or failed with the reason.
#[derive(Debug)]
pub enum ChunkOutcome {
    Clustered(ChunkClustering),
    Failed { chunk: usize, range: Range<usize>, reason: Error },
}

impl ChunkOutcome {
    pub fn chunk(&self) -> usize {
        match self {
            ChunkOutcome::Clustered(c) => c.chunk,
            ChunkOutcome::Failed { chunk, .. } => *chunk,
        }
    }
}

/// Contiguous index ranges of at most `chunk_size` elements covering `0..len`.
pub fn partition_chunks(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..len)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(len))
        .collect()
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        DisjointSet { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // smaller root wins so the result does not depend on merge order
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Minimum spanning tree edges `(weight, a, b)` by Prim's algorithm on the
/// complete Euclidean graph. O(n²) time, O(n) memory.
fn minimum_spanning_tree(
    points: &[Point3<f64>],
    budget: Option<&TimeBudget>,
) -> Result<Vec<(f64, usize, usize)>> {
    let n = points.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut parent = vec![usize::MAX; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    best[0] = 0.0;
    for _ in 0..n {
        if let Some(b) = budget {
            b.check()?;
        }

        let mut u = usize::MAX;
        let mut u_dist = f64::INFINITY;
        for v in 0..n {
            if !in_tree[v] && (u == usize::MAX || best[v] < u_dist) {
                u = v;
                u_dist = best[v];
            }
        }

        in_tree[u] = true;
        if parent[u] != usize::MAX {
            edges.push((u_dist, parent[u], u));
        }

        let pu = points[u];
        for v in 0..n {
            if in_tree[v] {
                continue;
            }
            let d = (points[v] - pu).norm();
            if d < best[v] {
                best[v] = d;
                parent[v] = u;
            }
        }
    }
    Ok(edges)
}

/// Single-linkage agglomerative clustering stopped at a distance threshold.
///
/// Merging the closest pair of clusters until the closest pair is at least
/// `threshold` apart yields the same partition as cutting the minimum
/// spanning tree at `threshold`, which is what is computed here. The number of
/// clusters is an output.
///
/// # Arguments
///
/// * `chunk` - Chunk index, used in error reports.
/// * `points` - Points of the chunk, in their deterministic order.
/// * `threshold` - Merge distance, `f64::INFINITY` merges everything.
/// * `budget` - Optional deadline checked once per MST step.
///
/// # Returns
///
/// * labels numbered by first occurrence in `points`.
///
pub fn single_linkage(
    chunk: usize,
    points: &[Point3<f64>],
    threshold: f64,
    budget: Option<&TimeBudget>,
) -> Result<ChunkLabels> {
    if points.is_empty() {
        return Ok(ChunkLabels { labels: Vec::new(), n_clusters: 0 });
    }
    if let Some(i) = points.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
        return Err(Error::ClusteringFailure {
            chunk,
            size: points.len(),
            detail: format!("non-finite coordinate at point {}", i),
        });
    }
    if threshold.is_nan() {
        return Err(Error::ClusteringFailure {
            chunk,
            size: points.len(),
            detail: "distance threshold is NaN".to_string(),
        });
    }

    let edges = minimum_spanning_tree(points, budget)?;

    let mut sets = DisjointSet::new(points.len());
    for &(w, a, b) in &edges {
        if w < threshold {
            sets.union(a, b);
        }
    }

    let mut label_of_root = vec![usize::MAX; points.len()];
    let mut labels = Vec::with_capacity(points.len());
    let mut n_clusters = 0;
    for i in 0..points.len() {
        let root = sets.find(i);
        if label_of_root[root] == usize::MAX {
            label_of_root[root] = n_clusters;
            n_clusters += 1;
        }
        labels.push(label_of_root[root]);
    }

    Ok(ChunkLabels { labels, n_clusters })
}

fn group_by_label(points: &[Point3<f64>], labels: &ChunkLabels) -> Vec<Vec<Point3<f64>>> {
    let mut clusters = vec![Vec::new(); labels.n_clusters];
    for (p, &l) in points.iter().zip(&labels.labels) {
        clusters[l].push(*p);
    }
    clusters
}

/// Clusters already sorted points chunk by chunk.
///
/// Chunks are independent and run in parallel; a failing chunk yields
/// `ChunkOutcome::Failed` and does not affect the others. Points near a chunk
/// border are never merged with points of the neighbouring chunk, which is
/// the accuracy given up for bounded cost.
pub fn cluster_sorted(
    points: &[Point3<f64>],
    opts: &ClusterOpts,
    budget: Option<&TimeBudget>,
) -> Vec<ChunkOutcome> {
    partition_chunks(points.len(), opts.chunk_size)
        .into_par_iter()
        .enumerate()
        .map(|(chunk, range)| {
            let slice = &points[range.clone()];
            match single_linkage(chunk, slice, opts.distance_threshold, budget) {
                Ok(labels) => {
                    log::debug!("chunk {}: {} points, {} clusters", chunk, slice.len(), labels.n_clusters);
                    let clusters = group_by_label(slice, &labels);
                    ChunkOutcome::Clustered(ChunkClustering { chunk, range, labels, clusters })
                }
                Err(reason) => ChunkOutcome::Failed { chunk, range, reason },
            }
        })
        .collect()
}

/// Sorts a bucket's points with the deterministic ordering, then clusters.
pub fn cluster_points(
    points: &mut [Point3<f64>],
    opts: &ClusterOpts,
    budget: Option<&TimeBudget>,
) -> Vec<ChunkOutcome> {
    sort_points(points);
    cluster_sorted(points, opts, budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn colinear(n: usize, spacing: f64) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64 * spacing, 0.0, 0.0)).collect()
    }

    fn clustered(outcomes: &[ChunkOutcome]) -> Vec<&ChunkClustering> {
        outcomes
            .iter()
            .filter_map(|o| match o {
                ChunkOutcome::Clustered(c) => Some(c),
                ChunkOutcome::Failed { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_infinite_threshold_gives_one_cluster() {
        let points = colinear(7, 3.0);
        let labels = single_linkage(0, &points, f64::INFINITY, None).unwrap();
        assert_eq!(labels.n_clusters, 1);
        assert!(labels.labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_zero_threshold_gives_singletons() {
        let points = colinear(5, 0.01);
        let labels = single_linkage(0, &points, 0.0, None).unwrap();
        assert_eq!(labels.n_clusters, 5);
        assert_eq!(labels.labels, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_colinear_spacing_scenario() {
        let close = single_linkage(0, &colinear(3, 0.3), 0.5, None).unwrap();
        assert_eq!(close.n_clusters, 1);

        let far = single_linkage(0, &colinear(3, 0.6), 0.5, None).unwrap();
        assert_eq!(far.n_clusters, 3);
    }

    #[test]
    fn test_chaining_merges_through_intermediate_points() {
        // single linkage: a-b and b-c close, a-c far, all one cluster
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.4, 0.0, 0.0),
            Point3::new(0.8, 0.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
        ];
        let labels = single_linkage(0, &points, 0.5, None).unwrap();
        assert_eq!(labels.labels, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_chunk_boundary_splits_close_pairs() {
        // 1-2 and 3-4 are close, 2-3 far: chunks {1,2} and {3,4}
        let mut points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.1),
            Point3::new(0.0, 0.0, 5.1),
            Point3::new(0.0, 0.0, 5.2),
        ];
        let opts = ClusterOpts::new(0.5, 2).unwrap();
        let outcomes = cluster_points(&mut points, &opts, None);
        let total: usize = clustered(&outcomes).iter().map(|c| c.labels.n_clusters).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_chunk_boundary_approximation_is_known() {
        // one tight line split over two chunks stays two clusters
        let mut points: Vec<Point3<f64>> = (0..4).map(|i| Point3::new(0.0, 0.0, i as f64 * 0.1)).collect();
        let opts = ClusterOpts::new(0.5, 2).unwrap();
        let outcomes = cluster_points(&mut points, &opts, None);
        let total: usize = clustered(&outcomes).iter().map(|c| c.labels.n_clusters).sum();
        assert_eq!(total, 2);

        let whole = ClusterOpts::new(0.5, 4).unwrap();
        let outcomes = cluster_points(&mut points, &whole, None);
        let total: usize = clustered(&outcomes).iter().map(|c| c.labels.n_clusters).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_non_finite_chunk_fails_alone() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.1),
            Point3::new(f64::NAN, 0.0, 1.0),
            Point3::new(0.0, 0.0, 2.0),
        ];
        let opts = ClusterOpts::new(0.5, 2).unwrap();
        let outcomes = cluster_sorted(&points, &opts, None);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], ChunkOutcome::Clustered(_)));
        assert!(matches!(
            outcomes[1],
            ChunkOutcome::Failed { chunk: 1, reason: Error::ClusteringFailure { .. }, .. }
        ));
    }

    #[test]
    fn test_exhausted_budget_fails_chunk() {
        let budget = TimeBudget::start(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        let result = single_linkage(0, &colinear(3, 0.1), 0.5, Some(&budget));
        assert!(matches!(result, Err(Error::TimeBudgetExceeded { .. })));
    }

    #[test]
    fn test_same_input_same_labels() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<Point3<f64>> = (0..400)
            .map(|_| Point3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(0.0..10.0)))
            .collect();
        let opts = ClusterOpts::new(0.4, 64).unwrap();

        let mut a = points.clone();
        let mut b: Vec<_> = points.iter().rev().copied().collect();
        let la: Vec<ChunkLabels> = clustered(&cluster_points(&mut a, &opts, None)).iter().map(|c| c.labels.clone()).collect();
        let lb: Vec<ChunkLabels> = clustered(&cluster_points(&mut b, &opts, None)).iter().map(|c| c.labels.clone()).collect();

        assert_eq!(a, b);
        assert_eq!(la, lb);
    }

    #[test]
    fn test_partition_chunks() {
        assert_eq!(partition_chunks(5, 2), vec![0..2, 2..4, 4..5]);
        assert_eq!(partition_chunks(0, 3), Vec::<Range<usize>>::new());
        assert_eq!(partition_chunks(3, 10), vec![0..3]);
    }

    #[test]
    fn test_opts_validation() {
        assert!(ClusterOpts::new(0.2, 0).is_err());
        assert!(ClusterOpts::new(-1.0, 10).is_err());
        assert!(ClusterOpts::new(f64::NAN, 10).is_err());
        assert!(ClusterOpts::new(f64::INFINITY, 10).is_ok());
    }
}
