//! Pipeline configuration
//!
//! Pass-through parameters for preprocessing and decomposition. Defaults
//! reproduce the reference MEG workflow: MEG channels only, 1–40 Hz band,
//! 50 Hz notch, 200 Hz output rate, 30 components, seed 97.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::ChannelKind;

// ============================================================================
// Preprocessing
// ============================================================================

/// Preprocessing parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Band-pass lower cutoff (Hz)
    pub low_cut: f64,
    /// Band-pass upper cutoff (Hz)
    pub high_cut: f64,
    /// Power-line frequency to notch out (Hz)
    pub line_freq: f64,
    /// Also notch every harmonic of `line_freq` below Nyquist
    pub notch_harmonics: bool,
    /// Notch quality factor
    pub notch_q: f64,
    /// Output sampling rate (Hz)
    pub target_rate: f64,
    /// Channel kinds kept for decomposition
    pub channel_kinds: Vec<ChannelKind>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            low_cut: 1.0,
            high_cut: 40.0,
            line_freq: 50.0,
            notch_harmonics: false,
            notch_q: 30.0,
            target_rate: 200.0,
            channel_kinds: ChannelKind::MEG.to_vec(),
        }
    }
}

// ============================================================================
// Decomposition
// ============================================================================

/// Contrast function used by the fixed-point rotation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nonlinearity {
    /// G(u) = log cosh(u), g(u) = tanh(u). General purpose.
    #[default]
    LogCosh,
    /// G(u) = -exp(-u²/2). Robust for super-Gaussian sources.
    Exp,
    /// G(u) = u⁴/4. Kurtosis based.
    Cube,
}

/// Decomposition parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Number of independent components to estimate
    pub n_components: usize,
    /// Seed for the initial rotation
    pub seed: u64,
    /// Iteration cap for the fixed-point rotation
    pub max_iterations: usize,
    /// Convergence tolerance on the per-row change
    pub tolerance: f64,
    /// Contrast function
    pub nonlinearity: Nonlinearity,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            n_components: 30,
            seed: 97,
            max_iterations: 1000,
            tolerance: 1e-4,
            nonlinearity: Nonlinearity::LogCosh,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Full pipeline configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Preprocessing stage
    pub preprocess: PreprocessConfig,
    /// Decomposition stage
    pub decomposition: DecompositionConfig,
}

impl PipelineConfig {
    /// Check parameter ranges that do not depend on the input signal.
    ///
    /// Signal-dependent limits (Nyquist, channel count) are checked by the
    /// stages themselves.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidParameter`] naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        let p = &self.preprocess;
        positive("low_cut", p.low_cut)?;
        positive("high_cut", p.high_cut)?;
        positive("line_freq", p.line_freq)?;
        positive("notch_q", p.notch_q)?;
        positive("target_rate", p.target_rate)?;
        if p.low_cut >= p.high_cut {
            return Err(invalid(
                "high_cut",
                format!("must exceed low_cut ({} >= {})", p.low_cut, p.high_cut),
            ));
        }
        if p.channel_kinds.is_empty() {
            return Err(invalid("channel_kinds", "at least one channel kind is required".into()));
        }

        let d = &self.decomposition;
        if d.n_components == 0 {
            return Err(invalid("n_components", "must be at least 1".into()));
        }
        if d.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1".into()));
        }
        positive("tolerance", d.tolerance)?;

        Ok(())
    }
}

fn positive(parameter: &'static str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, format!("must be positive and finite, got {value}")))
    }
}

fn invalid(parameter: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidParameter { parameter, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.decomposition.n_components, 30);
        assert_eq!(config.decomposition.seed, 97);
        assert_eq!(config.preprocess.channel_kinds, ChannelKind::MEG.to_vec());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut config = PipelineConfig::default();
        config.preprocess.low_cut = 50.0;
        config.preprocess.high_cut = 10.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { parameter: "high_cut", .. })
        ));
    }

    #[test]
    fn test_zero_components_rejected() {
        let mut config = PipelineConfig::default();
        config.decomposition.n_components = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"decomposition": {"n_components": 12, "nonlinearity": "cube"}}"#)
                .unwrap();
        assert_eq!(config.decomposition.n_components, 12);
        assert_eq!(config.decomposition.nonlinearity, Nonlinearity::Cube);
        assert!((config.preprocess.high_cut - 40.0).abs() < f64::EPSILON);
    }
}
