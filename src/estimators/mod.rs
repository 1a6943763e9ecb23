#![allow(non_snake_case)]

//! Discrete filter step engines.
//!
//! Both engines drive the same predict, gain, correct cycle over a slice of time-indexed steps,
//! threading each step's posterior mean and covariance into the next step and collecting every
//! posterior into the returned sequence. [`kalman`] propagates covariance in closed form,
//! [`ensemble`] approximates it by sampling.
//!
//! The cycle is strictly sequential along the time axis. A run either completes every step or
//! fails at the first offending step with a [`FilterError`]; nothing is retried.

use na::storage::Storage;
use na::{allocator::Allocator, DefaultAllocator, Dim, MatrixMN, MatrixN, RealField, VectorN};
use nalgebra as na;

use crate::error::FilterError;
use crate::models::{KalmanState, LinearObserveModel};
use crate::noise::CorrelatedNoise;

pub mod ensemble;
pub mod kalman;

/// One step's observation: the linear map into observation space, the observation noise
/// covariance and the measurement to fuse.
pub struct Observation<N: RealField, D: Dim, ZD: Dim>
where
    DefaultAllocator: Allocator<N, ZD, D> + Allocator<N, ZD, ZD> + Allocator<N, ZD>,
{
    /// Observation model
    pub model: LinearObserveModel<N, D, ZD>,
    /// Observation noise covariance
    pub noise: CorrelatedNoise<N, ZD>,
    /// The measurement fused at this step
    pub z: VectorN<N, ZD>,
}

/// Kalman gain from the prior covariance, observation matrix and observation noise.
///
/// The innovation covariance `S = Hx.X.Hx' + R` must be invertible; the gain is
/// `W = X.Hx'.S⁻¹`. A singular S fails, nothing substitutes a pseudo-inverse.
pub fn kalman_gain<N: RealField, D: Dim, ZD: Dim>(
    X: &MatrixN<N, D>,
    obs: &LinearObserveModel<N, D, ZD>,
    noise: &CorrelatedNoise<N, ZD>,
) -> Result<MatrixMN<N, D, ZD>, &'static str>
where
    DefaultAllocator: Allocator<N, D, D>
        + Allocator<N, ZD, D>
        + Allocator<N, D, ZD>
        + Allocator<N, ZD, ZD>
        + Allocator<N, ZD>,
{
    let XHt = X * obs.Hx.transpose();
    // S = Hx.X.Hx' + R
    let S = &obs.Hx * &XHt + &noise.Q;

    // Inverse innovation covariance
    let SI = S.cholesky().ok_or("S not PD in observe")?.inverse();

    // Kalman gain, X.Hx'.SI
    Ok(XHt * SI)
}

impl<N: RealField, D: Dim> KalmanState<N, D>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    /// Fuses one observation into the current (prior) state.
    ///
    /// `x += W.(z - Hx.x)`; `X = (I - W.Hx).X`.
    pub fn observe<ZD: Dim>(&mut self, obs: &Observation<N, D, ZD>) -> Result<(), &'static str>
    where
        DefaultAllocator: Allocator<N, ZD, D>
            + Allocator<N, D, ZD>
            + Allocator<N, ZD, ZD>
            + Allocator<N, ZD>,
    {
        let W = kalman_gain(&self.X, &obs.model, &obs.noise)?;

        // Innovation
        let s = &obs.z - obs.model.predict(&self.x);

        // State update
        self.x += &W * s;
        // X = (I - W.Hx).X
        let d = self.x.data.shape().0;
        self.X = (MatrixN::identity_generic(d, d) - &W * &obs.model.Hx) * &self.X;

        Ok(())
    }
}

/// Checks one step's matrices and vectors against the run's state dimension n and observation
/// dimension m. A mismatch is a configuration error, surfaced before any numerics run.
pub(crate) fn check_step<N: RealField, D: Dim, ZD: Dim>(
    step: usize,
    n: usize,
    m: usize,
    Q: &MatrixN<N, D>,
    obs: &Observation<N, D, ZD>,
) -> Result<(), FilterError>
where
    DefaultAllocator:
        Allocator<N, D, D> + Allocator<N, ZD, D> + Allocator<N, ZD, ZD> + Allocator<N, ZD>,
{
    check_shape(step, "transition noise covariance", Q.nrows(), Q.ncols(), n, n)?;
    check_shape(step, "observation matrix", obs.model.Hx.nrows(), obs.model.Hx.ncols(), m, n)?;
    check_shape(step, "observation noise covariance", obs.noise.Q.nrows(), obs.noise.Q.ncols(), m, m)?;
    check_shape(step, "observation vector", obs.z.nrows(), 1, m, 1)?;

    Ok(())
}

pub(crate) fn check_shape(
    step: usize,
    object: &'static str,
    rows: usize,
    cols: usize,
    expected_rows: usize,
    expected_cols: usize,
) -> Result<(), FilterError> {
    if rows != expected_rows || cols != expected_cols {
        return Err(FilterError::Dimensions {
            step,
            object,
            rows,
            cols,
            expected_rows,
            expected_cols,
        });
    }

    Ok(())
}
