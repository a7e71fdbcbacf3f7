//! ICA decomposition
//!
//! Centering, PCA whitening and a symmetric fixed-point rotation produce a
//! [`DecompositionModel`]:
//!
//! ```text
//! x ─center─▶ x̄ ─whitening (k × ch)─▶ z ─rotation (k × k)─▶ s
//!
//! unmixing = rotation · whitening        (k × ch)
//! mixing   = dewhitening · rotationᵀ     (ch × k), unmixing · mixing = I
//! ```
//!
//! - [`whitening`]: Centering, covariance and whitening transform
//! - [`rotation`]: Fixed-point rotation and symmetric decorrelation
//! - [`model`]: The fitted model, source signals and the fitting engine

pub mod model;
pub mod rotation;
pub mod whitening;

pub use model::{fit, DecompositionEngine, DecompositionModel, SourceSignals};
