#![allow(non_snake_case)]

//! Supplements to the nalgebra backend.
//!
//! Matrix multiply, transpose, inverse and identity construction come from nalgebra directly.
//! This module adds the two operations the filters need in a form nalgebra does not export: an
//! upper triangular Cholesky factorisation that accepts positive semi-definite matrices, and
//! multivariate normal sampling built on such a factor.

use na::storage::Storage;
use na::{allocator::Allocator, DefaultAllocator, Dim, MatrixN, RealField, VectorN, U1};
use nalgebra as na;
use rand_core::RngCore;
use rand_distr::{Distribution, StandardNormal};

/// Upper triangular Cholesky factor of a positive definite or semi-definite matrix M.
///
/// Returns UC with `M = UC.UC'`. The strict lower triangle of M is ignored.
/// A semi-definite M factorises only while every deficient column is identically zero;
/// anything negative fails.
///
/// Reference: A+G p.218
pub fn ucfactor<N: RealField, D: Dim>(M: &MatrixN<N, D>) -> Result<MatrixN<N, D>, &'static str>
where
    DefaultAllocator: Allocator<N, D, D>,
{
    let mut UC = M.upper_triangle();
    let n = UC.nrows();

    for j in (0..n).rev() {
        let d = UC[(j, j)];
        if d > N::zero() {
            // Positive definite column
            let ds = d.sqrt();
            UC[(j, j)] = ds;
            let di = N::one() / ds;

            for i in 0..j {
                let e = di * UC[(i, j)];
                UC[(i, j)] = e;
                for k in 0..=i {
                    let t = e * UC[(k, j)];
                    UC[(k, i)] -= t;
                }
            }
        } else if d == N::zero() {
            // Possibly semi-definite, check not negative
            for i in 0..j {
                if UC[(i, j)] != N::zero() {
                    return Err("matrix not PSD");
                }
            }
        } else {
            // Negative
            return Err("matrix not PSD");
        }
    }

    Ok(UC)
}

/// A draw from the multivariate normal distribution with the given mean and covariance `UC.UC'`.
///
/// UC is an upper triangular factor as produced by [`ucfactor`].
pub fn sample_gaussian<N: RealField, D: Dim>(
    mean: &VectorN<N, D>,
    UC: &MatrixN<N, D>,
    rng: &mut dyn RngCore,
) -> VectorN<N, D>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    let d = mean.data.shape().0;
    let e = VectorN::from_fn_generic(d, U1, |_, _| {
        let standard: f64 = StandardNormal.sample(rng);
        N::from_f64(standard).unwrap()
    });

    mean + UC * e
}
