//! Component feature pairs
//!
//! Slices a fitted model and its sources into one temporal/spatial pair per
//! component.

use serde::{Deserialize, Serialize};

use crate::decomposition::{DecompositionModel, SourceSignals};
use crate::error::{ExtractionError, ExtractionResult};

/// Temporal trace and spatial map of one component
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentFeature {
    /// Component index in the model
    pub index: usize,
    /// Time course (length = samples)
    pub temporal: Vec<f64>,
    /// Topography, the mixing-matrix column (length = channels)
    pub spatial: Vec<f64>,
}

impl ComponentFeature {
    /// Root-mean-square amplitude of the time course
    #[must_use]
    pub fn temporal_rms(&self) -> f64 {
        if self.temporal.is_empty() {
            return 0.0;
        }
        (self.temporal.iter().map(|v| v * v).sum::<f64>() / self.temporal.len() as f64).sqrt()
    }

    /// Index of the channel with the largest absolute weight
    #[must_use]
    pub fn peak_channel(&self) -> Option<usize> {
        self.spatial
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
    }
}

/// Build one [`ComponentFeature`] per component, in component order.
///
/// # Errors
///
/// Returns [`ExtractionError::ShapeMismatch`] if `sources` does not have one
/// row per component, or the model's mixing matrix does not have one column
/// per component.
pub fn extract(model: &DecompositionModel, sources: &SourceSignals) -> ExtractionResult<Vec<ComponentFeature>> {
    let n_components = model.n_components();
    if sources.row_count() != n_components {
        return Err(ExtractionError::ShapeMismatch {
            what: "source rows",
            expected: n_components,
            got: sources.row_count(),
        });
    }
    let mixing = model.mixing_matrix();
    if mixing.ncols() != n_components {
        return Err(ExtractionError::ShapeMismatch {
            what: "mixing matrix columns",
            expected: n_components,
            got: mixing.ncols(),
        });
    }

    Ok((0..n_components)
        .map(|index| ComponentFeature {
            index,
            temporal: sources.row(index),
            spatial: mixing.column(index).iter().copied().collect(),
        })
        .collect())
}
