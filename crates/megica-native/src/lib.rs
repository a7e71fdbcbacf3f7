//! Megica Native - ICA feature extraction for multichannel MEG
//!
//! This crate turns a raw multichannel recording into per-component
//! features for a downstream component classifier:
//! - Preprocessing (channel selection, band-pass, notch, resampling)
//! - ICA decomposition (whitening + symmetric fixed-point rotation)
//! - Component feature pairs (time course + topography)
//! - Export to JSON or NumPy arrays
//!
//! # Modules
//!
//! - [`processing`]: Filters, resampling and the preprocessing stage
//! - [`decomposition`]: Whitening, rotation and the fitted model
//! - [`features`]: Component feature extraction
//! - [`export`]: Feature sinks
//! - [`pipeline`]: The full preprocess → decompose → extract chain
//! - [`simulation`]: Synthetic mixtures with known ground truth
//!
//! # Example
//!
//! ```rust
//! use megica_native::decomposition::fit;
//! use megica_native::features::extract;
//! use megica_native::simulation::SimulationConfig;
//!
//! let mixture = SimulationConfig::default().generate().unwrap();
//! let model = fit(&mixture.signal, 3, 97, 1000, 1e-4).unwrap();
//! let sources = model.sources(&mixture.signal).unwrap();
//! let features = extract(&model, &sources).unwrap();
//!
//! assert_eq!(features.len(), 3);
//! assert_eq!(features[0].spatial.len(), mixture.signal.n_channels());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]

pub mod decomposition;
pub mod error;
pub mod export;
pub mod features;
pub mod pipeline;
pub mod processing;
pub mod simulation;

// Re-export key types
pub use decomposition::{DecompositionEngine, DecompositionModel, SourceSignals};
pub use error::{
    DecompositionError, ExportError, ExtractionError, PipelineError, PreprocessError,
};
pub use features::ComponentFeature;
pub use pipeline::{FeaturePipeline, PipelineOutput};
pub use processing::Preprocessor;
