//! Error types for the native pipeline
//!
//! One `thiserror` enum per stage, plus [`PipelineError`] for callers that
//! drive the whole chain. Non-convergence of the rotation is reported on the
//! model, not here.

use megica_core::{ConfigError, SignalError};
use thiserror::Error;

/// Preprocessing error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    /// No channel of the requested kinds remains
    #[error("No channels left after selection ({available} channels available)")]
    InvalidChannelSet {
        /// Number of channels in the input
        available: usize,
    },

    /// Band-pass cutoffs are inverted, non-positive, or above Nyquist
    #[error("Invalid filter range [{low_cut}, {high_cut}] Hz (Nyquist {nyquist} Hz)")]
    InvalidFilterRange {
        /// Lower cutoff
        low_cut: f64,
        /// Upper cutoff
        high_cut: f64,
        /// Nyquist frequency of the input
        nyquist: f64,
    },

    /// Notch frequency is not a positive finite number
    #[error("Invalid notch frequency: {line_freq} Hz")]
    InvalidNotchFrequency {
        /// Requested line frequency
        line_freq: f64,
    },

    /// Target rate is non-positive or above the input rate
    #[error("Invalid resample rate: {target_rate} Hz (input {sampling_rate} Hz)")]
    InvalidResampleRate {
        /// Requested output rate
        target_rate: f64,
        /// Input sampling rate
        sampling_rate: f64,
    },

    /// Signal construction or finiteness check failed
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),
}

/// Decomposition error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompositionError {
    /// More components than channels
    #[error("Requested {requested} components from {channels} channels")]
    TooManyComponents {
        /// Requested component count
        requested: usize,
        /// Available channels
        channels: usize,
    },

    /// Not enough samples to estimate a covariance
    #[error("Insufficient samples: got {got}, need {need}")]
    InsufficientSamples {
        /// Number of samples received
        got: usize,
        /// Number of samples needed
        need: usize,
    },

    /// Covariance cannot support the requested component count
    #[error(
        "Singular covariance: {requested} components requested but effective rank is {rank} \
         (eigenvalue ratio {ratio:e})"
    )]
    SingularCovariance {
        /// Requested component count
        requested: usize,
        /// Number of eigenvalues above the rank threshold
        rank: usize,
        /// Smallest retained eigenvalue divided by the largest
        ratio: f64,
    },

    /// Invalid fit parameter
    #[error("Invalid decomposition parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Reason
        reason: String,
    },

    /// Signal does not match the fitted model
    #[error("Model was fitted on {expected} channels, signal has {got}")]
    ChannelCountMismatch {
        /// Channels the model expects
        expected: usize,
        /// Channels supplied
        got: usize,
    },

    /// Sources do not match the model's component count
    #[error("Model has {expected} components, sources have {got} rows")]
    ComponentCountMismatch {
        /// Components the model has
        expected: usize,
        /// Rows supplied
        got: usize,
    },

    /// Input signal is unusable (e.g. contains NaN or infinity)
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    /// Fit was cancelled through its cancellation flag
    #[error("Decomposition cancelled at iteration {iteration}")]
    Cancelled {
        /// Iteration at which the flag was observed
        iteration: usize,
    },
}

/// Feature extraction error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Model and sources disagree on a dimension
    #[error("Shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which dimension disagreed
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },
}

/// Export error types
#[derive(Error, Debug)]
pub enum ExportError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// NumPy encoding failure
    #[error("NPY write error: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    /// Feature values do not fill the array shape
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Features are inconsistent with each other or with the layout
    #[error("Cannot export {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which dimension disagreed
        what: &'static str,
        /// Expected size
        expected: usize,
        /// Actual size
        got: usize,
    },
}

/// Error for a full pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration rejected before processing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Preprocessing failed
    #[error("Preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    /// Decomposition failed
    #[error("Decomposition error: {0}")]
    Decomposition(#[from] DecompositionError),

    /// Feature extraction failed
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Export failed
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Result type for preprocessing operations
pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// Result type for decomposition operations
pub type DecompositionResult<T> = Result<T, DecompositionError>;

/// Result type for feature extraction
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline runs
pub type PipelineResult<T> = Result<T, PipelineError>;
