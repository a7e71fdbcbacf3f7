//! Signal processing pipelines
//!
//! This module conditions raw recordings before decomposition:
//! - [`filters`]: Biquad band-pass and notch filters, zero-phase application
//! - [`resample`]: FFT-based rate reduction
//! - [`preprocess`]: Channel selection and the full preprocessing stage

pub mod filters;
pub mod preprocess;
pub mod resample;

pub use preprocess::{preprocess, Preprocessor};
