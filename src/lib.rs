//! Recursive Bayesian state estimation over linear-Gaussian state-space models.
//!
//! Probabilities are used to represent the state of a system: a state estimate is a mean vector
//! together with its covariance matrix. Fusing a dynamic model of the system with noisy
//! observations of it gives a naturally iterative estimation solution, the discrete filter.
//!
//! Two filter recursions are implemented, both driven one step at a time from time-indexed model
//! matrices and threading each step's posterior into the next step's prior:
//!
//! * [`estimators::kalman`] - the closed-form Kalman predict/update recursion for linear (or
//!   linearised) transition models.
//! * [`estimators::ensemble`] - a Monte-Carlo recursion that approximates covariance propagation
//!   by sampling an ensemble of particles through a black-box transition function.
//!
//! Prediction and observation models are structs, generic in the scalar type and the state and
//! observation dimensions. The linear-algebra operations are provided by nalgebra; the small
//! [`linalg`] module supplements it with a factorisation of positive semi-definite matrices and
//! multivariate normal sampling.

pub mod models;
pub mod noise;
pub mod linalg;
#[cfg(feature = "std")]
pub mod error;
#[cfg(feature = "std")]
pub mod estimators;
