//! Megica Core - shared data model for ICA feature extraction
//!
//! This crate provides the types every stage of the pipeline agrees on:
//! the multichannel recording, its channel layout, the pipeline
//! configuration and the signal-level error types.
//!
//! # Modules
//!
//! - [`types`]: Channel kinds, sensor positions, layouts and signals
//! - [`error`]: Signal and configuration errors
//! - [`config`]: Pipeline configuration with defaults and validation
//!
//! # Example
//!
//! ```rust
//! use megica_core::types::{ChannelInfo, ChannelKind, ChannelLayout, MultichannelSignal};
//!
//! let layout = ChannelLayout::new(vec![
//!     ChannelInfo::new("MEG0111", ChannelKind::Magnetometer),
//!     ChannelInfo::new("EOG061", ChannelKind::Eog),
//! ]);
//! let signal = MultichannelSignal::new(vec![vec![0.0; 4], vec![1.0; 4]], 1000.0, layout).unwrap();
//!
//! assert_eq!(signal.n_channels(), 2);
//! assert_eq!(signal.n_samples(), 4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use config::{DecompositionConfig, Nonlinearity, PipelineConfig, PreprocessConfig};
pub use error::{ConfigError, SignalError};
pub use types::{ChannelInfo, ChannelKind, ChannelLayout, MultichannelSignal, SensorPosition};
