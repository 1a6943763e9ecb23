//! Filter run errors.

use thiserror::Error;

/// Why a filter run was abandoned.
///
/// A run either produces a posterior for every step or fails at the first offending step; there
/// is no partial result, since each step depends on the validity of the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A per-step matrix or vector disagrees with the run's state or observation dimensions.
    #[error("step {step}: {object} is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    Dimensions {
        step: usize,
        object: &'static str,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    /// The ensemble needs at least two members to carry a sample covariance.
    #[error("ensemble of {found} members is too small, need at least 2")]
    EnsembleSize { found: usize },
    /// A numerical operation failed, abandoning the run. Never retried.
    #[error("step {step}: {reason}")]
    Numerical { step: usize, reason: &'static str },
}
