#![allow(non_snake_case)]

//! Kalman filter step engine.
//!
//! The closed-form predict/update recursion over a Kalman state representation [`KalmanState`].
//! Each step's transition specification yields an effective transition matrix, fixed or
//! recomputed from the previous posterior mean, and that matrix propagates both the mean and the
//! covariance before one observation is fused.
//!
//! [`KalmanState`]: ../../models/struct.KalmanState.html

use log::debug;
use na::{allocator::Allocator, DefaultAllocator, Dim, MatrixN, RealField, VectorN};
use nalgebra as na;

use super::{check_shape, check_step, Observation};
use crate::error::FilterError;
use crate::models::{Forcing, KalmanState, Transition};
use crate::noise::CorrelatedNoise;

/// One step's prediction inputs: the transition specification, the additive transition noise and
/// an optional control term.
pub struct Prediction<N: RealField, D: Dim, UD: Dim>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D> + Allocator<N, D, UD> + Allocator<N, UD>,
{
    /// Transition specification
    pub transition: Transition<N, D>,
    /// Transition noise covariance
    pub noise: CorrelatedNoise<N, D>,
    /// Control term, zero contribution when absent
    pub forcing: Option<Forcing<N, D, UD>>,
}

/// Time-indexed inputs for one filter step.
pub struct Step<N: RealField, D: Dim, ZD: Dim, UD: Dim>
where
    DefaultAllocator: Allocator<N, D, D>
        + Allocator<N, D>
        + Allocator<N, D, UD>
        + Allocator<N, UD>
        + Allocator<N, ZD, D>
        + Allocator<N, ZD, ZD>
        + Allocator<N, ZD>,
{
    pub predict: Prediction<N, D, UD>,
    pub observe: Observation<N, D, ZD>,
}

impl<N: RealField, D: Dim> KalmanState<N, D>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    /// State prediction with a linear prediction model and additive noise.
    pub fn predict(&mut self, Fx: &MatrixN<N, D>, x_pred: VectorN<N, D>, noise: &CorrelatedNoise<N, D>) {
        self.x = x_pred;
        // X = Fx.X.Fx' + Q
        self.X.quadform_tr(N::one(), Fx, &self.X.clone(), N::zero());
        self.X += &noise.Q;
    }
}

/// Drives the deterministic predict, gain, correct cycle across every step.
///
/// The initial state is the step 0 prior; each step's posterior seeds the next step's
/// prediction. Returns the posterior of every step in order, as one batch. The first
/// configuration or numerical failure abandons the run with no partial result.
pub fn filter<N: RealField, D: Dim, ZD: Dim, UD: Dim>(
    initial: &KalmanState<N, D>,
    steps: &[Step<N, D, ZD, UD>],
) -> Result<Vec<KalmanState<N, D>>, FilterError>
where
    DefaultAllocator: Allocator<N, D, D>
        + Allocator<N, D>
        + Allocator<N, D, UD>
        + Allocator<N, UD>
        + Allocator<N, ZD, D>
        + Allocator<N, D, ZD>
        + Allocator<N, ZD, ZD>
        + Allocator<N, ZD>,
{
    let n = initial.x.nrows();
    check_shape(0, "initial covariance", initial.X.nrows(), initial.X.ncols(), n, n)?;
    let m = match steps.first() {
        Some(step) => step.observe.z.nrows(),
        None => return Ok(Vec::new()),
    };
    debug!("kalman run: {} steps, state dim {}, observation dim {}", steps.len(), n, m);

    let mut state = initial.clone();
    let mut posteriors = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        check_step(i, n, m, &step.predict.noise.Q, &step.observe)?;
        if let Some(forcing) = &step.predict.forcing {
            check_shape(i, "control matrix", forcing.Fu.nrows(), forcing.Fu.ncols(), n, forcing.u.nrows())?;
        }

        // Effective transition matrix for this step
        let Fx = step.predict.transition.matrix_for(&state.x);
        check_shape(i, "transition matrix", Fx.nrows(), Fx.ncols(), n, n)?;

        let mut x_pred = &Fx * &state.x;
        if let Some(forcing) = &step.predict.forcing {
            x_pred += forcing.effect();
        }
        state.predict(&Fx, x_pred, &step.predict.noise);

        state
            .observe(&step.observe)
            .map_err(|reason| FilterError::Numerical { step: i, reason })?;

        posteriors.push(state.clone());
    }

    Ok(posteriors)
}
