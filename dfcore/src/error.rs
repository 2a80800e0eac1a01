use thiserror::Error;

/// Errors raised by the computational stages.
///
/// None of these abort a run on their own: the caller decides whether a
/// failure skips a chunk, a bucket, or falls back to another code path.
#[derive(Debug, Error)]
pub enum Error {
    /// Single-linkage clustering could not run on a chunk.
    #[error("clustering failed on chunk {chunk} ({size} points): {detail}")]
    ClusteringFailure {
        chunk: usize,
        size: usize,
        detail: String,
    },

    /// Convex hull is undefined for the given point set.
    #[error("convex hull undefined: {0}")]
    GeometryDegenerate(String),

    /// A bucket did not finish inside its time budget.
    #[error("time budget of {budget_secs:.3}s exceeded")]
    TimeBudgetExceeded { budget_secs: f64 },

    /// Option values that make a stage meaningless.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
