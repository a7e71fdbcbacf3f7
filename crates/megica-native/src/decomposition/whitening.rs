//! Centering and PCA whitening

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::debug;

use crate::error::{DecompositionError, DecompositionResult};

/// Smallest retained eigenvalue allowed, relative to the largest
pub const RANK_TOLERANCE: f64 = 1e-10;

/// Fitted whitening transform
#[derive(Clone, Debug)]
pub struct Whitening {
    /// Maps centered channels to unit-variance components (k × channels)
    pub matrix: DMatrix<f64>,
    /// Inverse map on the retained subspace (channels × k)
    pub dewhitening: DMatrix<f64>,
    /// Retained covariance eigenvalues, descending
    pub eigenvalues: Vec<f64>,
}

/// Subtract each row's mean, returning the centered data and the means
#[must_use]
pub fn center(data: &DMatrix<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let means = DVector::from_iterator(data.nrows(), data.row_iter().map(|row| row.mean()));
    let mut centered = data.clone();
    for (i, mut row) in centered.row_iter_mut().enumerate() {
        row.add_scalar_mut(-means[i]);
    }
    (centered, means)
}

/// Channel covariance of centered data (unbiased)
#[must_use]
pub fn covariance(centered: &DMatrix<f64>) -> DMatrix<f64> {
    let n = centered.ncols().max(2) as f64;
    (centered * centered.transpose()) / (n - 1.0)
}

/// Fit a whitening transform keeping the `n_components` strongest directions.
///
/// Eigenvector signs are fixed so the largest-magnitude entry of each is
/// positive.
///
/// # Errors
///
/// - [`DecompositionError::InsufficientSamples`] with fewer than two samples
/// - [`DecompositionError::TooManyComponents`] if `n_components` exceeds the
///   channel count
/// - [`DecompositionError::SingularCovariance`] if the smallest retained
///   eigenvalue is below [`RANK_TOLERANCE`] times the largest
pub fn fit_whitening(centered: &DMatrix<f64>, n_components: usize) -> DecompositionResult<Whitening> {
    let channels = centered.nrows();
    if centered.ncols() < 2 {
        return Err(DecompositionError::InsufficientSamples { got: centered.ncols(), need: 2 });
    }
    if n_components == 0 || n_components > channels {
        return Err(DecompositionError::TooManyComponents { requested: n_components, channels });
    }

    let eigen = SymmetricEigen::new(covariance(centered));
    let mut order: Vec<usize> = (0..channels).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let largest = eigen.eigenvalues[order[0]];
    let rank = if largest.is_finite() && largest > 0.0 {
        order.iter().filter(|&&i| eigen.eigenvalues[i] > RANK_TOLERANCE * largest).count()
    } else {
        0
    };
    let smallest = eigen.eigenvalues[order[n_components - 1]];
    let ratio = if largest > 0.0 { smallest / largest } else { 0.0 };
    if rank < n_components || ratio.is_nan() || ratio < RANK_TOLERANCE {
        return Err(DecompositionError::SingularCovariance { requested: n_components, rank, ratio });
    }

    let mut matrix = DMatrix::zeros(n_components, channels);
    let mut dewhitening = DMatrix::zeros(channels, n_components);
    let mut eigenvalues = Vec::with_capacity(n_components);

    for (k, &idx) in order.iter().take(n_components).enumerate() {
        let value = eigen.eigenvalues[idx];
        let mut vector = eigen.eigenvectors.column(idx).clone_owned();
        let pivot = vector.iter().copied().fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            vector.neg_mut();
        }

        let scale = value.sqrt();
        matrix.row_mut(k).copy_from(&(vector.transpose() / scale));
        dewhitening.column_mut(k).copy_from(&(&vector * scale));
        eigenvalues.push(value);
    }

    debug!(
        channels,
        n_components,
        rank,
        ratio,
        "Whitening retains {:.2}% of variance",
        100.0 * eigenvalues.iter().sum::<f64>() / eigen.eigenvalues.iter().filter(|v| **v > 0.0).sum::<f64>()
    );

    Ok(Whitening { matrix, dewhitening, eigenvalues })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::StandardNormal;

    fn noise(rows: usize, cols: usize, seed: u64) -> DMatrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        DMatrix::from_fn(rows, cols, |_, _| rng.sample(StandardNormal))
    }

    #[test]
    fn test_center_removes_mean() {
        let data = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 10.0, 10.0, 40.0]);
        let (centered, means) = center(&data);
        assert!((means[0] - 2.0).abs() < 1e-12);
        assert!((means[1] - 20.0).abs() < 1e-12);
        assert!(centered.row(0).sum().abs() < 1e-12);
        assert!(centered.row(1).sum().abs() < 1e-12);
    }

    #[test]
    fn test_whitened_covariance_is_identity() {
        let mixing = noise(6, 6, 1);
        let (centered, _) = center(&(mixing * noise(6, 1000, 2)));
        let whitening = fit_whitening(&centered, 4).unwrap();

        let z = &whitening.matrix * &centered;
        let cov = covariance(&z);
        assert!((cov - DMatrix::identity(4, 4)).amax() < 1e-9);
        assert!(whitening.eigenvalues.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_dewhitening_inverts_on_subspace() {
        let (centered, _) = center(&noise(5, 500, 3));
        let whitening = fit_whitening(&centered, 5).unwrap();
        let product = &whitening.matrix * &whitening.dewhitening;
        assert!((product - DMatrix::identity(5, 5)).amax() < 1e-9);
    }

    #[test]
    fn test_duplicate_channel_is_singular() {
        let mut data = noise(5, 400, 4);
        let copy = data.row(1).clone_owned();
        data.row_mut(3).copy_from(&copy);
        let (centered, _) = center(&data);

        let err = fit_whitening(&centered, 5).unwrap_err();
        assert!(matches!(err, DecompositionError::SingularCovariance { requested: 5, rank: 4, .. }));

        // Dropping one component makes it feasible
        assert!(fit_whitening(&centered, 4).is_ok());
    }

    #[test]
    fn test_too_many_components() {
        let (centered, _) = center(&noise(3, 100, 5));
        assert!(matches!(
            fit_whitening(&centered, 4),
            Err(DecompositionError::TooManyComponents { requested: 4, channels: 3 })
        ));
    }
}
