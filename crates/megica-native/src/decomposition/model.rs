//! Fitted ICA model and the engine that produces it

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use megica_core::config::{DecompositionConfig, Nonlinearity};
use megica_core::types::MultichannelSignal;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::rotation::FixedPointRotation;
use super::whitening::{center, fit_whitening};
use crate::error::{DecompositionError, DecompositionResult};

// ============================================================================
// Source Signals
// ============================================================================

/// Component time courses, one row per component (k × samples)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourceSignals {
    matrix: DMatrix<f64>,
}

impl SourceSignals {
    /// Wrap a k × samples matrix
    #[must_use]
    pub fn new(matrix: DMatrix<f64>) -> Self {
        Self { matrix }
    }

    /// Number of components
    #[inline]
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of samples per component
    #[inline]
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.matrix.ncols()
    }

    /// Time course of component `i`
    ///
    /// # Panics
    ///
    /// Panics if `i >= row_count()`.
    #[must_use]
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.matrix.row(i).iter().copied().collect()
    }

    /// Underlying matrix
    #[inline]
    #[must_use]
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }
}

// ============================================================================
// Decomposition Model
// ============================================================================

/// A fitted ICA decomposition.
///
/// Components are identifiable only up to permutation and sign: two fits with
/// different seeds may return the same components in another order or with
/// flipped polarity. Consumers that need a stable order must match
/// components against their own reference.
///
/// The model is immutable once fitted.
#[derive(Clone, Debug, Serialize)]
pub struct DecompositionModel {
    n_components: usize,
    n_channels: usize,
    mixing_matrix: DMatrix<f64>,
    unmixing_matrix: DMatrix<f64>,
    whitening_matrix: DMatrix<f64>,
    rotation_matrix: DMatrix<f64>,
    mean_vector: DVector<f64>,
    pca_explained_variance: Vec<f64>,
    nonlinearity: Nonlinearity,
    random_seed: u64,
    converged: bool,
    iterations_used: usize,
    final_change: f64,
}

impl DecompositionModel {
    /// Number of components
    #[inline]
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Number of channels the model was fitted on
    #[inline]
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.n_channels
    }

    /// Mixing matrix (channels × k); column `i` is component `i`'s topography
    #[must_use]
    pub fn mixing_matrix(&self) -> &DMatrix<f64> {
        &self.mixing_matrix
    }

    /// Unmixing matrix (k × channels), rotation ∘ whitening
    #[must_use]
    pub fn unmixing_matrix(&self) -> &DMatrix<f64> {
        &self.unmixing_matrix
    }

    /// Whitening matrix (k × channels)
    #[must_use]
    pub fn whitening_matrix(&self) -> &DMatrix<f64> {
        &self.whitening_matrix
    }

    /// Orthonormal rotation found by the fixed-point iteration (k × k)
    #[must_use]
    pub fn rotation_matrix(&self) -> &DMatrix<f64> {
        &self.rotation_matrix
    }

    /// Per-channel means removed before whitening
    #[must_use]
    pub fn mean_vector(&self) -> &DVector<f64> {
        &self.mean_vector
    }

    /// Variance of each retained principal component, descending
    #[must_use]
    pub fn pca_explained_variance(&self) -> &[f64] {
        &self.pca_explained_variance
    }

    /// Contrast function used for the fit
    #[must_use]
    pub fn nonlinearity(&self) -> Nonlinearity {
        self.nonlinearity
    }

    /// Seed of the initial rotation
    #[must_use]
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Whether the rotation met its tolerance before the iteration cap
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Rotation iterations performed
    #[must_use]
    pub fn iterations_used(&self) -> usize {
        self.iterations_used
    }

    /// Convergence measure at the last iteration
    #[must_use]
    pub fn final_change(&self) -> f64 {
        self.final_change
    }

    /// Center `signal` with the fitted means (channels × samples)
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::ChannelCountMismatch`] if the signal does
    /// not have the fitted channel count.
    pub fn center(&self, signal: &MultichannelSignal) -> DecompositionResult<DMatrix<f64>> {
        if signal.n_channels() != self.n_channels {
            return Err(DecompositionError::ChannelCountMismatch {
                expected: self.n_channels,
                got: signal.n_channels(),
            });
        }
        let mut data = signal_matrix(signal);
        for (i, mut row) in data.row_iter_mut().enumerate() {
            row.add_scalar_mut(-self.mean_vector[i]);
        }
        Ok(data)
    }

    /// Whitened signal (k × samples)
    ///
    /// # Errors
    ///
    /// See [`DecompositionModel::center`].
    pub fn whiten(&self, signal: &MultichannelSignal) -> DecompositionResult<DMatrix<f64>> {
        Ok(&self.whitening_matrix * self.center(signal)?)
    }

    /// Component time courses of `signal`
    ///
    /// # Errors
    ///
    /// See [`DecompositionModel::center`].
    pub fn sources(&self, signal: &MultichannelSignal) -> DecompositionResult<SourceSignals> {
        Ok(SourceSignals::new(&self.unmixing_matrix * self.center(signal)?))
    }

    /// Back-project sources to channel space (mixing × sources + mean)
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::ComponentCountMismatch`] if `sources`
    /// does not have one row per component.
    pub fn inverse_transform(&self, sources: &SourceSignals) -> DecompositionResult<Vec<Vec<f64>>> {
        if sources.row_count() != self.n_components {
            return Err(DecompositionError::ComponentCountMismatch {
                expected: self.n_components,
                got: sources.row_count(),
            });
        }
        let mut data = &self.mixing_matrix * sources.as_matrix();
        for (i, mut row) in data.row_iter_mut().enumerate() {
            row.add_scalar_mut(self.mean_vector[i]);
        }
        Ok(matrix_rows(&data))
    }

    /// Remove the `exclude`d components from `signal` and return the cleaned
    /// recording.
    ///
    /// Only the excluded components' contribution is subtracted, so variance
    /// outside the retained subspace is kept.
    ///
    /// # Errors
    ///
    /// - [`DecompositionError::ChannelCountMismatch`] for a signal of the wrong
    ///   width
    /// - [`DecompositionError::InvalidParameter`] for an out-of-range index
    /// - [`DecompositionError::Signal`] if the cleaned data is not a valid signal
    pub fn reconstruct_without(
        &self,
        signal: &MultichannelSignal,
        exclude: &[usize],
    ) -> DecompositionResult<MultichannelSignal> {
        if let Some(&bad) = exclude.iter().find(|&&i| i >= self.n_components) {
            return Err(DecompositionError::InvalidParameter {
                parameter: "exclude",
                reason: format!("component {bad} out of range (0..{})", self.n_components),
            });
        }

        let sources = self.sources(signal)?;
        let mut cleaned = signal_matrix(signal);
        for &i in exclude {
            let contribution = self.mixing_matrix.column(i) * sources.as_matrix().row(i);
            cleaned -= contribution;
        }

        debug!("Removed {} of {} components", exclude.len(), self.n_components);

        Ok(signal.with_data(matrix_rows(&cleaned), signal.sampling_rate())?)
    }
}

// ============================================================================
// Decomposition Engine
// ============================================================================

/// Fits [`DecompositionModel`]s
#[derive(Clone, Debug, Default)]
pub struct DecompositionEngine {
    config: DecompositionConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl DecompositionEngine {
    /// Create an engine with the given parameters
    #[must_use]
    pub fn new(config: DecompositionConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Abort the rotation when `flag` becomes true
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Parameters in use
    #[must_use]
    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    /// Center, whiten and rotate `signal`.
    ///
    /// Deterministic: the same signal and parameters always give the same
    /// model. A fit that hits the iteration cap is still returned, with
    /// `converged() == false`.
    ///
    /// # Errors
    ///
    /// - [`DecompositionError::InvalidParameter`] for a zero iteration cap or
    ///   non-positive tolerance
    /// - [`DecompositionError::TooManyComponents`],
    ///   [`DecompositionError::InsufficientSamples`],
    ///   [`DecompositionError::SingularCovariance`] from whitening
    /// - [`DecompositionError::Signal`] if the signal contains NaN or infinity
    /// - [`DecompositionError::Cancelled`] if the cancellation flag is set
    pub fn fit(&self, signal: &MultichannelSignal) -> DecompositionResult<DecompositionModel> {
        let cfg = &self.config;
        if cfg.max_iterations == 0 {
            return Err(DecompositionError::InvalidParameter {
                parameter: "max_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if !(cfg.tolerance.is_finite() && cfg.tolerance > 0.0) {
            return Err(DecompositionError::InvalidParameter {
                parameter: "tolerance",
                reason: format!("must be positive and finite, got {}", cfg.tolerance),
            });
        }

        debug!(
            channels = signal.n_channels(),
            samples = signal.n_samples(),
            n_components = cfg.n_components,
            "Fitting decomposition"
        );

        signal.ensure_finite()?;
        let (centered, mean_vector) = center(&signal_matrix(signal));
        let whitening = fit_whitening(&centered, cfg.n_components)?;
        let whitened = &whitening.matrix * &centered;

        let mut rotation = FixedPointRotation::new(cfg.nonlinearity, cfg.max_iterations, cfg.tolerance);
        if let Some(flag) = &self.cancel {
            rotation = rotation.with_cancel_flag(Arc::clone(flag));
        }
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let outcome = rotation.run(&whitened, &mut rng)?;

        if outcome.converged {
            info!(
                "Decomposition converged: {} components in {} iterations",
                cfg.n_components, outcome.iterations
            );
        } else {
            warn!(
                "Decomposition did not converge after {} iterations (change {:.3e}, tolerance {:.1e})",
                outcome.iterations, outcome.final_change, cfg.tolerance
            );
        }

        let unmixing_matrix = &outcome.rotation * &whitening.matrix;
        let mixing_matrix = &whitening.dewhitening * outcome.rotation.transpose();

        Ok(DecompositionModel {
            n_components: cfg.n_components,
            n_channels: signal.n_channels(),
            mixing_matrix,
            unmixing_matrix,
            whitening_matrix: whitening.matrix,
            rotation_matrix: outcome.rotation,
            mean_vector,
            pca_explained_variance: whitening.eigenvalues,
            nonlinearity: cfg.nonlinearity,
            random_seed: cfg.seed,
            converged: outcome.converged,
            iterations_used: outcome.iterations,
            final_change: outcome.final_change,
        })
    }
}

/// Fit with the default contrast function.
///
/// # Errors
///
/// See [`DecompositionEngine::fit`].
pub fn fit(
    signal: &MultichannelSignal,
    n_components: usize,
    seed: u64,
    max_iterations: usize,
    tolerance: f64,
) -> DecompositionResult<DecompositionModel> {
    DecompositionEngine::new(DecompositionConfig {
        n_components,
        seed,
        max_iterations,
        tolerance,
        ..DecompositionConfig::default()
    })
    .fit(signal)
}

/// Channels × samples matrix of a signal
#[must_use]
pub fn signal_matrix(signal: &MultichannelSignal) -> DMatrix<f64> {
    let channels = signal.channels();
    DMatrix::from_fn(signal.n_channels(), signal.n_samples(), |i, j| channels[i][j])
}

fn matrix_rows(matrix: &DMatrix<f64>) -> Vec<Vec<f64>> {
    matrix.row_iter().map(|row| row.iter().copied().collect()).collect()
}
