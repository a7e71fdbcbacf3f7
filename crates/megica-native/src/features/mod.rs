//! Per-component feature extraction
//!
//! Pairs each component's time course with its sensor topography, the inputs
//! a downstream component classifier consumes.

pub mod component;

pub use component::{extract, ComponentFeature};
