//! Symmetric fixed-point rotation (FastICA, parallel update)
//!
//! All component rows are updated at once and the whole rotation is then
//! re-orthonormalised, so no component is favoured by extraction order.
//!
//! ```text
//! W⁺ = E[g(W z) zᵀ] − diag(E[g'(W z)]) W
//! W  = (W⁺ W⁺ᵀ)^(-1/2) W⁺
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use megica_core::config::Nonlinearity;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::trace;

use crate::error::{DecompositionError, DecompositionResult};

/// Result of a rotation run
#[derive(Clone, Debug)]
pub struct RotationOutcome {
    /// Orthonormal rotation (k × k)
    pub rotation: DMatrix<f64>,
    /// Whether the tolerance was met
    pub converged: bool,
    /// Iterations performed
    pub iterations: usize,
    /// Convergence measure at the last iteration
    pub final_change: f64,
}

/// Fixed-point rotation settings
#[derive(Clone, Debug)]
pub struct FixedPointRotation {
    nonlinearity: Nonlinearity,
    max_iterations: usize,
    tolerance: f64,
    cancel: Option<Arc<AtomicBool>>,
}

impl FixedPointRotation {
    /// Create a rotation with the given contrast and stopping rule
    #[must_use]
    pub fn new(nonlinearity: Nonlinearity, max_iterations: usize, tolerance: f64) -> Self {
        Self { nonlinearity, max_iterations, tolerance, cancel: None }
    }

    /// Check `flag` before every iteration and abort when it is set
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Rotate whitened data (k × samples) towards maximal non-Gaussianity.
    ///
    /// The starting point is drawn from `rng`, so the outcome is fully
    /// determined by the data and the generator state.
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::Cancelled`] if the cancellation flag is
    /// observed.
    pub fn run<R: Rng>(&self, whitened: &DMatrix<f64>, rng: &mut R) -> DecompositionResult<RotationOutcome> {
        let k = whitened.nrows();
        let n = whitened.ncols() as f64;
        let whitened_t = whitened.transpose();

        let mut w = initial_rotation(k, rng);
        let mut change = f64::INFINITY;

        for iteration in 1..=self.max_iterations {
            if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(DecompositionError::Cancelled { iteration });
            }

            let projected = &w * whitened;
            let (g, g_prime_mean) = contrast(self.nonlinearity, &projected);

            let update = (g * &whitened_t) / n - DMatrix::from_diagonal(&g_prime_mean) * &w;
            let next = symmetric_decorrelation(&update);

            // Rows match up to sign when |<w_new, w_old>| = 1
            change = (&next * w.transpose())
                .diagonal()
                .iter()
                .map(|d| (d.abs() - 1.0).abs())
                .fold(0.0, f64::max);
            w = next;

            trace!(iteration, change, "Rotation step");

            if change < self.tolerance {
                return Ok(RotationOutcome { rotation: w, converged: true, iterations: iteration, final_change: change });
            }
        }

        Ok(RotationOutcome {
            rotation: w,
            converged: false,
            iterations: self.max_iterations,
            final_change: change,
        })
    }
}

/// Random orthonormal k × k starting rotation
pub fn initial_rotation<R: Rng>(k: usize, rng: &mut R) -> DMatrix<f64> {
    let mut draw = DMatrix::zeros(k, k);
    for i in 0..k {
        for j in 0..k {
            draw[(i, j)] = rng.sample::<f64, _>(StandardNormal);
        }
    }
    symmetric_decorrelation(&draw)
}

/// `(W Wᵀ)^(-1/2) W`, the orthonormal matrix closest to `W`
#[must_use]
pub fn symmetric_decorrelation(w: &DMatrix<f64>) -> DMatrix<f64> {
    let eigen = SymmetricEigen::new(w * w.transpose());
    let inv_sqrt = eigen.eigenvalues.map(|s| 1.0 / s.max(f64::EPSILON).sqrt());
    &eigen.eigenvectors * DMatrix::from_diagonal(&inv_sqrt) * eigen.eigenvectors.transpose() * w
}

/// Contrast derivative `g` applied elementwise, and the per-row mean of `g'`
fn contrast(nonlinearity: Nonlinearity, projected: &DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let n = projected.ncols() as f64;
    let mut g = projected.clone();
    let mut g_prime_mean = DVector::zeros(projected.nrows());

    for (i, mut row) in g.row_iter_mut().enumerate() {
        let mut acc = 0.0;
        for u in row.iter_mut() {
            let x = *u;
            let (value, derivative) = match nonlinearity {
                Nonlinearity::LogCosh => {
                    let t = x.tanh();
                    (t, 1.0 - t * t)
                }
                Nonlinearity::Exp => {
                    let e = (-0.5 * x * x).exp();
                    (x * e, (1.0 - x * x) * e)
                }
                Nonlinearity::Cube => (x * x * x, 3.0 * x * x),
            };
            *u = value;
            acc += derivative;
        }
        g_prime_mean[i] = acc / n;
    }

    (g, g_prime_mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn is_orthonormal(w: &DMatrix<f64>) -> bool {
        let k = w.nrows();
        (w * w.transpose() - DMatrix::identity(k, k)).amax() < 1e-9
    }

    /// Whitened mixture of a uniform and a Laplacian-like source
    fn whitened_pair(n: usize) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(11);
        let s = DMatrix::from_fn(2, n, |i, _| {
            if i == 0 {
                rng.gen_range(-3.0_f64.sqrt()..3.0_f64.sqrt())
            } else {
                let e: f64 = rng.sample(rand_distr::Exp1);
                if rng.gen::<bool>() { e / 2.0_f64.sqrt() } else { -e / 2.0_f64.sqrt() }
            }
        });
        let theta = 0.6_f64;
        let rot = DMatrix::from_row_slice(2, 2, &[theta.cos(), -theta.sin(), theta.sin(), theta.cos()]);
        rot * s
    }

    #[test]
    fn test_initial_rotation_orthonormal() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(is_orthonormal(&initial_rotation(5, &mut rng)));
    }

    #[test]
    fn test_symmetric_decorrelation_orthonormal() {
        let w = DMatrix::from_row_slice(3, 3, &[2.0, 0.5, 0.1, 0.3, 1.0, 0.2, 0.0, 0.4, 3.0]);
        assert!(is_orthonormal(&symmetric_decorrelation(&w)));
    }

    #[test]
    fn test_rotation_converges_and_separates() {
        let z = whitened_pair(4000);
        for nonlinearity in [Nonlinearity::LogCosh, Nonlinearity::Exp, Nonlinearity::Cube] {
            let mut rng = StdRng::seed_from_u64(97);
            let outcome = FixedPointRotation::new(nonlinearity, 500, 1e-6).run(&z, &mut rng).unwrap();

            assert!(outcome.converged, "{nonlinearity:?} did not converge");
            assert!(outcome.iterations <= 500);
            assert!(is_orthonormal(&outcome.rotation));

            // Recovered rotation undoes the 0.6 rad mixing up to sign/permutation
            let theta = 0.6_f64;
            let undo = outcome.rotation[(0, 0)].abs().max(outcome.rotation[(0, 1)].abs());
            assert!((undo - theta.cos().max(theta.sin())).abs() < 0.05, "{nonlinearity:?}: {undo}");
        }
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let z = whitened_pair(2000);
        let mut rng = StdRng::seed_from_u64(97);
        let outcome = FixedPointRotation::new(Nonlinearity::LogCosh, 1, 1e-15).run(&z, &mut rng).unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 1);
        assert!(is_orthonormal(&outcome.rotation));
    }

    #[test]
    fn test_cancel_flag_aborts() {
        let z = whitened_pair(500);
        let flag = Arc::new(AtomicBool::new(true));
        let mut rng = StdRng::seed_from_u64(1);
        let result = FixedPointRotation::new(Nonlinearity::LogCosh, 100, 1e-4)
            .with_cancel_flag(flag)
            .run(&z, &mut rng);
        assert!(matches!(result, Err(DecompositionError::Cancelled { iteration: 1 })));
    }
}
