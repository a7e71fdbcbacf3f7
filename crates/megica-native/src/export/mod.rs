//! Export sinks for component features
//!
//! Exporters receive the feature pairs together with the channel layout of
//! the decomposed signal. Rendering of traces and topographic maps is left
//! to downstream tools.
//!
//! - [`json`]: Features and layout as one JSON document
//! - [`npy`]: NumPy arrays (`ica_temporal.npy`, `ica_spatial.npy`)

pub mod json;
pub mod npy;

use megica_core::types::ChannelLayout;

use crate::error::{ExportError, ExportResult};
use crate::features::ComponentFeature;

pub use json::JsonExporter;
pub use npy::NpyExporter;

/// A consumer of extracted component features
pub trait FeatureExporter {
    /// Export `features` recorded on `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on I/O failure or inconsistent shapes.
    fn export(&mut self, features: &[ComponentFeature], layout: &ChannelLayout) -> ExportResult<()>;
}

/// Check that every feature has the same trace length and one weight per
/// layout channel. Returns `(n_samples, n_channels)`.
///
/// # Errors
///
/// Returns [`ExportError::ShapeMismatch`] at the first inconsistent feature.
pub fn check_shapes(features: &[ComponentFeature], layout: &ChannelLayout) -> ExportResult<(usize, usize)> {
    let n_samples = features.first().map_or(0, |f| f.temporal.len());
    for feature in features {
        if feature.spatial.len() != layout.len() {
            return Err(ExportError::ShapeMismatch {
                what: "spatial weights",
                expected: layout.len(),
                got: feature.spatial.len(),
            });
        }
        if feature.temporal.len() != n_samples {
            return Err(ExportError::ShapeMismatch {
                what: "temporal samples",
                expected: n_samples,
                got: feature.temporal.len(),
            });
        }
    }
    Ok((n_samples, layout.len()))
}
