#![allow(non_snake_case)]

//! Additive noise models.

use na::{allocator::Allocator, DefaultAllocator, Dim, MatrixN, RealField};
use nalgebra as na;

use crate::linalg;

/// Additive noise.
///
/// Noise represented as a the noise covariance matrix.
pub struct CorrelatedNoise<N: RealField, D: Dim>
where
    DefaultAllocator: Allocator<N, D, D>,
{
    /// Noise covariance
    pub Q: MatrixN<N, D>,
}

impl<N: RealField, D: Dim> CorrelatedNoise<N, D>
where
    DefaultAllocator: Allocator<N, D, D>,
{
    /// Upper triangular factor of the covariance, for sampling. Q must be PSD.
    pub fn factor(&self) -> Result<MatrixN<N, D>, &'static str> {
        linalg::ucfactor(&self.Q)
    }
}
