//! Error types for the Megica data model
//!
//! Signal construction and configuration errors. Stage-specific errors
//! (preprocessing, decomposition, extraction) live in `megica-native`.

use thiserror::Error;

/// Errors from building or validating a [`MultichannelSignal`](crate::types::MultichannelSignal).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// Signal has no channels or no samples
    #[error("Signal is empty")]
    EmptySignal,

    /// Channels differ in length
    #[error("Channel {channel} has {got} samples, expected {expected}")]
    RaggedChannels {
        /// Offending channel index
        channel: usize,
        /// Length of the first channel
        expected: usize,
        /// Length of the offending channel
        got: usize,
    },

    /// Layout does not describe the stored channels
    #[error("Layout describes {layout} channels but signal has {channels}")]
    LayoutMismatch {
        /// Number of data channels
        channels: usize,
        /// Number of layout entries
        layout: usize,
    },

    /// Sampling rate is not a positive finite number
    #[error("Invalid sampling rate: {rate} Hz")]
    InvalidSamplingRate {
        /// Rejected rate
        rate: f64,
    },

    /// NaN or infinite sample
    #[error("Non-finite value in channel {channel} at sample {sample}")]
    NonFiniteSample {
        /// Channel index
        channel: usize,
        /// Sample index
        sample: usize,
    },
}

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter is out of range
    #[error("Invalid configuration parameter {parameter}: {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Reason
        reason: String,
    },
}

/// Result type for signal operations
pub type SignalResult<T> = Result<T, SignalError>;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;
