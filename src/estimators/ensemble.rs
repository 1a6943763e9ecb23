#![allow(non_snake_case)]

//! Ensemble (Monte-Carlo) filter step engine.
//!
//! For transitions evaluated only as a black-box function of state, covariance propagation is
//! approximated by the empirical moments of an ensemble of particles. Each step redraws its
//! ensemble from the previous step's posterior distribution; only the first two moments survive
//! between steps, not the particles themselves.

use log::debug;
use na::storage::Storage;
use na::{allocator::Allocator, DefaultAllocator, Dim, MatrixN, RealField, VectorN, U1};
use nalgebra as na;
use rand_core::RngCore;

use super::{check_shape, check_step, Observation};
use crate::error::FilterError;
use crate::linalg;
use crate::models::KalmanState;
use crate::noise::CorrelatedNoise;

/// Time-indexed inputs for one ensemble filter step. The transition is always a function; there
/// is no linear matrix path.
pub struct EnsembleStep<N: RealField, D: Dim, ZD: Dim>
where
    DefaultAllocator: Allocator<N, D, D>
        + Allocator<N, D>
        + Allocator<N, ZD, D>
        + Allocator<N, ZD, ZD>
        + Allocator<N, ZD>,
{
    /// Propagates one particle through the system dynamics
    pub f: fn(&VectorN<N, D>) -> VectorN<N, D>,
    /// Transition noise covariance
    pub noise: CorrelatedNoise<N, D>,
    pub observe: Observation<N, D, ZD>,
}

/// Drives the sampling-based predict, gain, correct cycle across every step.
///
/// `members` is the ensemble size. The generator is caller-supplied and exclusively borrowed for
/// the run, so a seeded generator reproduces the run exactly.
pub fn filter<N: RealField, D: Dim, ZD: Dim>(
    initial: &KalmanState<N, D>,
    steps: &[EnsembleStep<N, D, ZD>],
    members: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<KalmanState<N, D>>, FilterError>
where
    DefaultAllocator: Allocator<N, D, D>
        + Allocator<N, D>
        + Allocator<N, ZD, D>
        + Allocator<N, D, ZD>
        + Allocator<N, ZD, ZD>
        + Allocator<N, ZD>,
{
    if members < 2 {
        return Err(FilterError::EnsembleSize { found: members });
    }
    let n = initial.x.nrows();
    check_shape(0, "initial covariance", initial.X.nrows(), initial.X.ncols(), n, n)?;
    let m = match steps.first() {
        Some(step) => step.observe.z.nrows(),
        None => return Ok(Vec::new()),
    };
    debug!(
        "ensemble run: {} steps, {} members, state dim {}, observation dim {}",
        steps.len(), members, n, m
    );

    let zero = VectorN::zeros_generic(initial.x.data.shape().0, U1);
    let mut state = initial.clone();
    let mut posteriors = Vec::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
        check_step(i, n, m, &step.noise.Q, &step.observe)?;

        // Factor the previous posterior and this step's transition noise for sampling
        let UCx = linalg::ucfactor(&state.X)
            .map_err(|reason| FilterError::Numerical { step: i, reason })?;
        let UCq = step.noise.factor()
            .map_err(|reason| FilterError::Numerical { step: i, reason })?;

        // Prior ensemble: redraw from the posterior, propagate, perturb
        let mut ensemble: Vec<VectorN<N, D>> = Vec::with_capacity(members);
        for j in 0..members {
            let drawn = linalg::sample_gaussian(&state.x, &UCx, rng);
            let mut propagated = (step.f)(&drawn);
            if j == 0 {
                check_shape(i, "transition function output", propagated.nrows(), 1, n, 1)?;
            }
            propagated += linalg::sample_gaussian(&zero, &UCq, rng);
            ensemble.push(propagated);
        }

        // Empirical prior moments stand in for the closed-form prediction
        let (x_prior, X_prior) = moments(&ensemble);
        state.x = x_prior;
        state.X = X_prior;

        state
            .observe(&step.observe)
            .map_err(|reason| FilterError::Numerical { step: i, reason })?;

        posteriors.push(state.clone());
    }

    Ok(posteriors)
}

/// Sample mean and sample covariance of the ensemble, with the n-1 covariance divisor.
fn moments<N: RealField, D: Dim>(ensemble: &[VectorN<N, D>]) -> (VectorN<N, D>, MatrixN<N, D>)
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    let d = ensemble[0].data.shape().0;

    let mut mean = VectorN::zeros_generic(d, U1);
    for member in ensemble {
        mean += member;
    }
    mean /= N::from_usize(ensemble.len()).unwrap();

    let mut X = MatrixN::zeros_generic(d, d);
    let weight = N::one() / N::from_usize(ensemble.len() - 1).unwrap();
    for member in ensemble {
        let deviation = member - &mean;
        // X += weight.deviation.deviation'
        X.ger(weight, &deviation, &deviation, N::one());
    }

    (mean, X)
}
