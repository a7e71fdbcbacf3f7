//! NumPy `.npy` export
//!
//! One array per file: component time courses and topographies.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use megica_core::types::ChannelLayout;
use ndarray::Array2;
use ndarray_npy::WriteNpyExt;
use tracing::info;

use super::{check_shapes, FeatureExporter};
use crate::error::ExportResult;
use crate::features::ComponentFeature;

/// File name of the component time courses (components × samples)
pub const TEMPORAL_FILE: &str = "ica_temporal.npy";
/// File name of the topographies (channels × components)
pub const SPATIAL_FILE: &str = "ica_spatial.npy";

/// Component time courses as a components × samples array
///
/// # Errors
///
/// Returns [`ExportError::Shape`](crate::error::ExportError::Shape) if the
/// traces differ in length.
pub fn temporal_array(features: &[ComponentFeature], n_samples: usize) -> ExportResult<Array2<f64>> {
    let values: Vec<f64> = features.iter().flat_map(|f| f.temporal.iter().copied()).collect();
    Ok(Array2::from_shape_vec((features.len(), n_samples), values)?)
}

/// Topographies as a channels × components array
///
/// Callers must have checked every feature has `n_channels` weights.
#[must_use]
pub fn spatial_array(features: &[ComponentFeature], n_channels: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_channels, features.len()), |(ch, i)| features[i].spatial[ch])
}

/// Writes `ica_temporal.npy` and `ica_spatial.npy` into a directory
pub struct NpyExporter {
    dir: PathBuf,
}

impl NpyExporter {
    /// Export into `dir`, which is created if missing
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FeatureExporter for NpyExporter {
    fn export(&mut self, features: &[ComponentFeature], layout: &ChannelLayout) -> ExportResult<()> {
        let (n_samples, n_channels) = check_shapes(features, layout)?;
        std::fs::create_dir_all(&self.dir)?;

        let temporal_path = self.dir.join(TEMPORAL_FILE);
        temporal_array(features, n_samples)?.write_npy(BufWriter::new(File::create(&temporal_path)?))?;

        let spatial_path = self.dir.join(SPATIAL_FILE);
        spatial_array(features, n_channels).write_npy(BufWriter::new(File::create(&spatial_path)?))?;

        info!("Wrote {} and {}", temporal_path.display(), spatial_path.display());
        Ok(())
    }
}
