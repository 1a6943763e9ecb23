#![allow(non_snake_case)]

//! State estimation models.
//!
//! The state representation is modeled as a struct, transition and observation models as structs
//! and a tagged transition variant. All are generic in the scalar type and the state,
//! observation and control dimensions.

use na::{allocator::Allocator, DefaultAllocator, Dim, MatrixMN, MatrixN, VectorN, U1};
use na::RealField;
use nalgebra as na;

/// Kalman state.
///
/// Linear representation as a state vector and the state covariance (symmetric positive
/// semi-definite) matrix.
#[derive(PartialEq, Clone)]
pub struct KalmanState<N: RealField, D: Dim>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    /// State vector
    pub x: VectorN<N, D>,
    /// State covariance matrix (symmetric positive semi-definite)
    pub X: MatrixN<N, D>,
}

impl<N: RealField, D: Dim> KalmanState<N, D>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    pub fn new_zero(d: D) -> KalmanState<N, D> {
        KalmanState {
            x: VectorN::zeros_generic(d, U1),
            X: MatrixN::zeros_generic(d, d),
        }
    }
}

/// State transition specification.
///
/// Either a fixed transition matrix, or a function that computes the matrix from the previous
/// posterior mean for linearisation-style use. Both variants answer [`matrix_for`]; the fixed
/// variant ignores its argument.
///
/// [`matrix_for`]: Transition::matrix_for
pub enum Transition<N: RealField, D: Dim>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    /// Fixed state transition matrix
    Linear(MatrixN<N, D>),
    /// State transition matrix recomputed from the previous posterior mean
    Linearized(fn(&VectorN<N, D>) -> MatrixN<N, D>),
}

impl<N: RealField, D: Dim> Transition<N, D>
where
    DefaultAllocator: Allocator<N, D, D> + Allocator<N, D>,
{
    /// The effective transition matrix for a step starting at mean `x`.
    pub fn matrix_for(&self, x: &VectorN<N, D>) -> MatrixN<N, D> {
        match self {
            Transition::Linear(Fx) => Fx.clone(),
            Transition::Linearized(f) => f(x),
        }
    }
}

/// Additive control term.
///
/// A forcing coupling matrix and control vector whose product is added to the predicted mean.
/// Steps without a control term omit the Forcing and contribute zero.
pub struct Forcing<N: RealField, D: Dim, UD: Dim>
where
    DefaultAllocator: Allocator<N, D, UD> + Allocator<N, UD>,
{
    /// Forcing coupling matrix
    pub Fu: MatrixMN<N, D, UD>,
    /// Control vector
    pub u: VectorN<N, UD>,
}

impl<N: RealField, D: Dim, UD: Dim> Forcing<N, D, UD>
where
    DefaultAllocator: Allocator<N, D, UD> + Allocator<N, UD>,
{
    /// The mean contribution `Fu.u`.
    pub fn effect(&self) -> VectorN<N, D>
    where
        DefaultAllocator: Allocator<N, D>,
    {
        &self.Fu * &self.u
    }
}

/// Linear observation model.
///
/// Observation is represented by an observation matrix.
pub struct LinearObserveModel<N: RealField, D: Dim, ZD: Dim>
where
    DefaultAllocator: Allocator<N, ZD, D>,
{
    /// Observation matrix
    pub Hx: MatrixMN<N, ZD, D>,
}

impl<N: RealField, D: Dim, ZD: Dim> LinearObserveModel<N, D, ZD>
where
    DefaultAllocator: Allocator<N, ZD, D>,
{
    /// The predicted observation `Hx.x` of a state mean.
    pub fn predict(&self, x: &VectorN<N, D>) -> VectorN<N, ZD>
    where
        DefaultAllocator: Allocator<N, D> + Allocator<N, ZD>,
    {
        &self.Hx * x
    }
}
