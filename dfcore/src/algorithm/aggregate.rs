use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::point::{BondFailure, SpatialPoint};
use crate::model::time_points::floor_index;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationOpts {
    /// Bucket width in seconds
    pub step: f64,
    /// Each bucket also carries every point of the earlier buckets
    pub integral: bool,
}

impl Default for AggregationOpts {
    fn default() -> Self {
        Self {
            step: 0.0005,
            integral: false,
        }
    }
}

impl AggregationOpts {
    pub fn validate(&self) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "time step must be positive and finite, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// A half-open time window `[start, end)` and the failures that resolved into it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bucket {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub points: Vec<SpatialPoint>,
}

impl Bucket {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Ascending bucket edges `t0, t0 + step, ...` covering `[t0, t_last]`.
///
/// Edges are computed as `t0 + k * step` so rounding does not accumulate.
///
/// # Arguments
///
/// * `t0` - First recorded time.
/// * `t_last` - Last recorded time, `>= t0`.
/// * `step` - Bucket width, positive.
///
pub fn bucket_edges(t0: f64, t_last: f64, step: f64) -> Result<Vec<f64>> {
    if !(t0.is_finite() && t_last.is_finite()) || t_last < t0 {
        return Err(Error::InvalidConfig(format!(
            "invalid time range [{}, {}]",
            t0, t_last
        )));
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "time step must be positive and finite, got {}",
            step
        )));
    }
    let count = ((t_last - t0) / step).floor() as usize + 1;
    Ok((0..count).map(|k| t0 + k as f64 * step).collect())
}

/// Buckets failure positions by their resolved death time.
///
/// Each failure goes to the bucket whose edge is the floor of its time,
/// clamped to the first and last bucket. In integral mode a single
/// left-to-right pass adds the (already cumulative) content of bucket `k - 1`
/// to bucket `k`.
///
/// # Arguments
///
/// * `failures` - Failures that survived reconstruction.
/// * `range` - `(first, last)` of the time axis.
/// * `opts` - Step and integral mode.
///
/// # Returns
///
/// * all buckets in ascending time order, empty ones included.
///
pub fn aggregate(
    failures: &[BondFailure],
    range: (f64, f64),
    opts: &AggregationOpts,
) -> Result<Vec<Bucket>> {
    opts.validate()?;
    let edges = bucket_edges(range.0, range.1, opts.step)?;

    let mut buckets: Vec<Bucket> = edges
        .iter()
        .enumerate()
        .map(|(index, &start)| Bucket {
            index,
            start,
            end: start + opts.step,
            points: Vec::new(),
        })
        .collect();

    for failure in failures {
        // edges is non-empty, bucket_edges always yields at least t0
        let index = floor_index(&edges, failure.time).unwrap_or(0);
        buckets[index].points.push(SpatialPoint {
            position: failure.position,
            bucket: index,
        });
    }

    if opts.integral {
        for k in 1..buckets.len() {
            let (done, rest) = buckets.split_at_mut(k);
            let earlier = &done[k - 1].points;
            let own = std::mem::take(&mut rest[0].points);
            rest[0].points.reserve(earlier.len() + own.len());
            rest[0].points.extend_from_slice(earlier);
            rest[0].points.extend(own);
        }
    }

    log::info!(
        "aggregated {} failures into {} buckets of {}s{}",
        failures.len(),
        buckets.len(),
        opts.step,
        if opts.integral { " (integral)" } else { "" }
    );
    Ok(buckets)
}
