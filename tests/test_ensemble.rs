//! Test the ensemble step engine.
//!
//! The sampled recursion is checked for agreement with the closed-form Kalman engine on linear
//! systems, for seeded reproducibility, and for its configuration and numerical error surfacing.

use approx::assert_abs_diff_eq;
use na::{DMatrix, DVector, Dynamic};
use na::{Matrix1, Matrix1x2, Matrix2, Vector1, Vector2, U1, U2};
use nalgebra as na;
use rand::rngs::StdRng;
use rand::SeedableRng;

use kalman_estimate::error::FilterError;
use kalman_estimate::estimators::ensemble::{self, EnsembleStep};
use kalman_estimate::estimators::kalman::{self, Prediction, Step};
use kalman_estimate::estimators::Observation;
use kalman_estimate::models::{KalmanState, LinearObserveModel, Transition};
use kalman_estimate::noise::CorrelatedNoise;

fn random_walk(x: &Vector1<f64>) -> Vector1<f64> {
    x.clone()
}

fn constant_velocity(x: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(x[0] + 0.1 * x[1], x[1])
}

fn scalar_ensemble_steps(obs: &[f64], q: f64, r: f64) -> Vec<EnsembleStep<f64, U1, U1>> {
    obs.iter()
        .map(|&z| EnsembleStep {
            f: random_walk,
            noise: CorrelatedNoise { Q: Matrix1::new(q) },
            observe: Observation {
                model: LinearObserveModel { Hx: Matrix1::new(1.0) },
                noise: CorrelatedNoise { Q: Matrix1::new(r) },
                z: Vector1::new(z),
            },
        })
        .collect()
}

#[test]
fn agrees_with_kalman_for_linear_scalar_system() {
    let obs = [1.0, 1.9, 3.05];
    let initial = KalmanState { x: Vector1::new(0.0), X: Matrix1::new(1.0) };

    let kalman_steps: Vec<Step<f64, U1, U1, U1>> = obs
        .iter()
        .map(|&z| Step {
            predict: Prediction {
                transition: Transition::Linear(Matrix1::new(1.0)),
                noise: CorrelatedNoise { Q: Matrix1::new(0.01) },
                forcing: None,
            },
            observe: Observation {
                model: LinearObserveModel { Hx: Matrix1::new(1.0) },
                noise: CorrelatedNoise { Q: Matrix1::new(1.0) },
                z: Vector1::new(z),
            },
        })
        .collect();
    let closed_form = kalman::filter(&initial, &kalman_steps).unwrap();

    let mut rng: StdRng = SeedableRng::seed_from_u64(7);
    let sampled = ensemble::filter(
        &initial,
        &scalar_ensemble_steps(&obs, 0.01, 1.0),
        20_000,
        &mut rng,
    )
    .unwrap();

    assert_eq!(sampled.len(), closed_form.len());
    for (s, c) in sampled.iter().zip(closed_form.iter()) {
        assert_abs_diff_eq!(s.x[0], c.x[0], epsilon = 0.05);
        assert_abs_diff_eq!(s.X[(0, 0)], c.X[(0, 0)], epsilon = 0.05);
        assert!(s.X[(0, 0)] > 0.0);
    }
}

#[test]
fn agrees_with_kalman_for_linear_two_state_system() {
    let obs = [0.5, 1.0, 1.5];
    let initial = KalmanState { x: Vector2::zeros(), X: Matrix2::identity() };
    let transition = Matrix2::new(1.0, 0.1, 0.0, 1.0);

    let kalman_steps: Vec<Step<f64, U2, U1, U1>> = obs
        .iter()
        .map(|&z| Step {
            predict: Prediction {
                transition: Transition::Linear(transition),
                noise: CorrelatedNoise { Q: Matrix2::new(0.01, 0.0, 0.0, 0.01) },
                forcing: None,
            },
            observe: Observation {
                model: LinearObserveModel { Hx: Matrix1x2::new(1.0, 0.0) },
                noise: CorrelatedNoise { Q: Matrix1::new(1.0) },
                z: Vector1::new(z),
            },
        })
        .collect();
    let closed_form = kalman::filter(&initial, &kalman_steps).unwrap();

    let ensemble_steps: Vec<EnsembleStep<f64, U2, U1>> = obs
        .iter()
        .map(|&z| EnsembleStep {
            f: constant_velocity,
            noise: CorrelatedNoise { Q: Matrix2::new(0.01, 0.0, 0.0, 0.01) },
            observe: Observation {
                model: LinearObserveModel { Hx: Matrix1x2::new(1.0, 0.0) },
                noise: CorrelatedNoise { Q: Matrix1::new(1.0) },
                z: Vector1::new(z),
            },
        })
        .collect();
    let mut rng: StdRng = SeedableRng::seed_from_u64(13);
    let sampled = ensemble::filter(&initial, &ensemble_steps, 40_000, &mut rng).unwrap();

    for (s, c) in sampled.iter().zip(closed_form.iter()) {
        assert_abs_diff_eq!(s.x, c.x, epsilon = 0.05);
        assert_abs_diff_eq!(s.X, c.X, epsilon = 0.05);
        // Symmetric to floating point tolerance, like the closed form
        assert_abs_diff_eq!(s.X, s.X.transpose(), epsilon = 1e-9);
    }
}

#[test]
fn same_seed_reproduces_the_run() {
    let obs = [1.0, 1.9, 3.05];
    let initial = KalmanState { x: Vector1::new(0.0), X: Matrix1::new(1.0) };
    let steps = scalar_ensemble_steps(&obs, 0.01, 1.0);

    let mut rng_a: StdRng = SeedableRng::seed_from_u64(42);
    let mut rng_b: StdRng = SeedableRng::seed_from_u64(42);
    let run_a = ensemble::filter(&initial, &steps, 500, &mut rng_a).unwrap();
    let run_b = ensemble::filter(&initial, &steps, 500, &mut rng_b).unwrap();

    for (a, b) in run_a.iter().zip(run_b.iter()) {
        assert_eq!(a.x, b.x);
        assert_eq!(a.X, b.X);
    }
}

#[test]
fn nonlinear_transition_stays_stable() {
    fn saturating(x: &Vector1<f64>) -> Vector1<f64> {
        Vector1::new(x[0].tanh())
    }

    let obs = [0.5, 0.5, 0.5, 0.5, 0.5];
    let steps: Vec<EnsembleStep<f64, U1, U1>> = obs
        .iter()
        .map(|&z| EnsembleStep {
            f: saturating,
            noise: CorrelatedNoise { Q: Matrix1::new(0.01) },
            observe: Observation {
                model: LinearObserveModel { Hx: Matrix1::new(1.0) },
                noise: CorrelatedNoise { Q: Matrix1::new(0.5) },
                z: Vector1::new(z),
            },
        })
        .collect();

    let initial = KalmanState { x: Vector1::new(0.0), X: Matrix1::new(1.0) };
    let mut rng: StdRng = SeedableRng::seed_from_u64(3);
    let posteriors = ensemble::filter(&initial, &steps, 5_000, &mut rng).unwrap();

    for posterior in &posteriors {
        assert!(posterior.x[0].is_finite());
        assert!(posterior.x[0].abs() < 2.0);
        assert!(posterior.X[(0, 0)].is_finite());
        assert!(posterior.X[(0, 0)] > 0.0);
    }
}

#[test]
fn semi_definite_transition_noise_is_sampled() {
    // No noise on the velocity component: the covariance factor is rank deficient
    let steps: Vec<EnsembleStep<f64, U2, U1>> = [0.5, 1.0]
        .iter()
        .map(|&z| EnsembleStep {
            f: constant_velocity,
            noise: CorrelatedNoise { Q: Matrix2::new(0.01, 0.0, 0.0, 0.0) },
            observe: Observation {
                model: LinearObserveModel { Hx: Matrix1x2::new(1.0, 0.0) },
                noise: CorrelatedNoise { Q: Matrix1::new(1.0) },
                z: Vector1::new(z),
            },
        })
        .collect();

    let initial = KalmanState { x: Vector2::zeros(), X: Matrix2::identity() };
    let mut rng: StdRng = SeedableRng::seed_from_u64(11);
    let posteriors = ensemble::filter(&initial, &steps, 1_000, &mut rng).unwrap();
    assert_eq!(posteriors.len(), 2);
}

#[test]
fn rejects_degenerate_ensembles() {
    let initial = KalmanState { x: Vector1::new(0.0), X: Matrix1::new(1.0) };
    let steps = scalar_ensemble_steps(&[1.0], 0.01, 1.0);

    let mut rng: StdRng = SeedableRng::seed_from_u64(1);
    match ensemble::filter(&initial, &steps, 0, &mut rng) {
        Err(FilterError::EnsembleSize { found: 0 }) => {}
        other => panic!("expected ensemble size error, got {:?}", other.map(|p| p.len())),
    }
    match ensemble::filter(&initial, &steps, 1, &mut rng) {
        Err(FilterError::EnsembleSize { found: 1 }) => {}
        other => panic!("expected ensemble size error, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn non_psd_initial_covariance_is_a_numerical_error() {
    let initial = KalmanState { x: Vector1::new(0.0), X: Matrix1::new(-1.0) };
    let steps = scalar_ensemble_steps(&[1.0], 0.01, 1.0);

    let mut rng: StdRng = SeedableRng::seed_from_u64(1);
    match ensemble::filter(&initial, &steps, 100, &mut rng) {
        Err(FilterError::Numerical { step: 0, reason }) => assert_eq!(reason, "matrix not PSD"),
        other => panic!("expected numerical error, got {:?}", other.map(|p| p.len())),
    }
}

#[test]
fn mismatched_dimensions_are_configuration_errors() {
    fn dynamic_walk(x: &DVector<f64>) -> DVector<f64> {
        x.clone()
    }
    fn wrong_order(_x: &DVector<f64>) -> DVector<f64> {
        DVector::zeros(3)
    }

    let mut initial = KalmanState::new_zero(Dynamic::new(2));
    initial.X = DMatrix::identity(2, 2);

    let step = |f: fn(&DVector<f64>) -> DVector<f64>, q: DMatrix<f64>| EnsembleStep::<f64, Dynamic, Dynamic> {
        f,
        noise: CorrelatedNoise { Q: q },
        observe: Observation {
            model: LinearObserveModel { Hx: DMatrix::from_row_slice(1, 2, &[1.0, 0.0]) },
            noise: CorrelatedNoise { Q: DMatrix::from_element(1, 1, 1.0) },
            z: DVector::from_element(1, 1.0),
        },
    };

    // Transition noise of the wrong order
    let steps = vec![step(dynamic_walk, DMatrix::from_element(1, 1, 0.01))];
    let mut rng: StdRng = SeedableRng::seed_from_u64(1);
    match ensemble::filter(&initial, &steps, 100, &mut rng) {
        Err(FilterError::Dimensions { step: 0, object: "transition noise covariance", .. }) => {}
        other => panic!("expected dimension error, got {:?}", other.map(|p| p.len())),
    }

    // Transition function that produces the wrong state dimension
    let steps = vec![step(wrong_order, DMatrix::identity(2, 2) * 0.01)];
    let mut rng: StdRng = SeedableRng::seed_from_u64(1);
    match ensemble::filter(&initial, &steps, 100, &mut rng) {
        Err(FilterError::Dimensions { step: 0, object: "transition function output", .. }) => {}
        other => panic!("expected dimension error, got {:?}", other.map(|p| p.len())),
    }
}
