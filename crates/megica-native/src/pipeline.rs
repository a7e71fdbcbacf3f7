//! End-to-end feature pipeline
//!
//! ```text
//! raw signal → Preprocessor → DecompositionEngine → sources → extract → exporter
//! ```
//!
//! Stages run strictly in sequence; nothing calls back into an earlier stage.
//! Independent signals can be processed in parallel with separate pipelines
//! or by sharing one `FeaturePipeline` (it holds no mutable state).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use megica_core::config::PipelineConfig;
use megica_core::types::MultichannelSignal;
use tracing::{info, warn};

use crate::decomposition::{DecompositionEngine, DecompositionModel, SourceSignals};
use crate::error::PipelineResult;
use crate::export::FeatureExporter;
use crate::features::{extract, ComponentFeature};
use crate::processing::Preprocessor;

/// Everything one pipeline run produces
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    /// Signal after selection, filtering and resampling
    pub preprocessed: MultichannelSignal,
    /// Fitted decomposition
    pub model: DecompositionModel,
    /// Component time courses of the preprocessed signal
    pub sources: SourceSignals,
    /// One feature pair per component
    pub features: Vec<ComponentFeature>,
}

impl PipelineOutput {
    /// Hand the features and channel layout to `exporter`
    ///
    /// # Errors
    ///
    /// Propagates the exporter's error.
    pub fn export(&self, exporter: &mut dyn FeatureExporter) -> PipelineResult<()> {
        exporter.export(&self.features, self.preprocessed.layout())?;
        Ok(())
    }
}

/// Preprocess → decompose → extract
#[derive(Clone, Debug, Default)]
pub struct FeaturePipeline {
    config: PipelineConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl FeaturePipeline {
    /// Create a pipeline with the given configuration
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Abort the decomposition when `flag` becomes true
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `signal`.
    ///
    /// A non-converged decomposition is returned with a warning; check
    /// `output.model.converged()` before trusting it.
    ///
    /// # Errors
    ///
    /// Returns the first stage error; see [`PipelineError`](crate::error::PipelineError).
    pub fn run(&self, signal: &MultichannelSignal) -> PipelineResult<PipelineOutput> {
        self.config.validate()?;

        info!(
            "Running pipeline on {} channels × {} samples at {} Hz",
            signal.n_channels(),
            signal.n_samples(),
            signal.sampling_rate()
        );

        let preprocessed = Preprocessor::new(self.config.preprocess.clone()).process(signal)?;

        let mut engine = DecompositionEngine::new(self.config.decomposition.clone());
        if let Some(flag) = &self.cancel {
            engine = engine.with_cancel_flag(Arc::clone(flag));
        }
        let model = engine.fit(&preprocessed)?;
        if !model.converged() {
            warn!("Features extracted from a non-converged decomposition");
        }

        let sources = model.sources(&preprocessed)?;
        let features = extract(&model, &sources)?;

        info!("Extracted {} component features", features.len());

        Ok(PipelineOutput { preprocessed, model, sources, features })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::fit;
    use crate::error::{PipelineError, PreprocessError};
    use crate::export::JsonExporter;
    use crate::simulation::{pearson_correlation, recovery_scores, SimulationConfig, SourceWaveform};
    use megica_core::config::{DecompositionConfig, PreprocessConfig};

    #[test]
    fn test_recovers_known_mixing() {
        // 10 channels, 2000 samples at 500 Hz, 3 non-Gaussian sources + noise
        let mixture = SimulationConfig::default().generate().unwrap();
        let model = fit(&mixture.signal, 3, 97, 1000, 1e-4).unwrap();
        assert!(model.converged());

        let scores = recovery_scores(model.mixing_matrix(), &mixture.mixing);
        assert!(scores.iter().all(|&s| s > 0.9), "mixing recovery {scores:?}");

        let sources = model.sources(&mixture.signal).unwrap();
        for truth in mixture.sources.row_iter() {
            let truth: Vec<f64> = truth.iter().copied().collect();
            let best = (0..3)
                .map(|i| pearson_correlation(&sources.row(i), &truth).abs())
                .fold(0.0, f64::max);
            assert!(best > 0.9, "source recovery {best}");
        }
    }

    #[test]
    fn test_full_pipeline() {
        let mixture = SimulationConfig {
            waveforms: vec![
                SourceWaveform::Sine { freq: 7.0 },
                SourceWaveform::Sawtooth { freq: 3.3 },
                SourceWaveform::Square { freq: 2.1 },
            ],
            ..SimulationConfig::default()
        }
        .generate()
        .unwrap();

        let config = PipelineConfig {
            preprocess: PreprocessConfig { target_rate: 250.0, ..PreprocessConfig::default() },
            decomposition: DecompositionConfig { n_components: 3, ..DecompositionConfig::default() },
        };
        let output = FeaturePipeline::new(config).run(&mixture.signal).unwrap();

        assert_eq!(output.preprocessed.n_samples(), 1000);
        assert_eq!(output.features.len(), 3);
        assert!(output.features.iter().all(|f| f.temporal.len() == 1000 && f.spatial.len() == 10));

        // Filtering acts per channel, so the mixing matrix is unchanged
        let scores = recovery_scores(output.model.mixing_matrix(), &mixture.mixing);
        assert!(scores.iter().all(|&s| s > 0.9), "mixing recovery {scores:?}");

        let mut exporter = JsonExporter::new(Vec::new());
        output.export(&mut exporter).unwrap();
        assert!(!exporter.into_inner().is_empty());
    }

    #[test]
    fn test_pipeline_surfaces_stage_errors() {
        let mixture = SimulationConfig::default().generate().unwrap();
        let config = PipelineConfig {
            preprocess: PreprocessConfig { high_cut: 300.0, ..PreprocessConfig::default() },
            decomposition: DecompositionConfig { n_components: 3, ..DecompositionConfig::default() },
        };
        assert!(matches!(
            FeaturePipeline::new(config).run(&mixture.signal),
            Err(PipelineError::Preprocess(PreprocessError::InvalidFilterRange { .. }))
        ));
    }

    #[test]
    fn test_pipeline_rejects_bad_config() {
        let mixture = SimulationConfig::default().generate().unwrap();
        let mut config = PipelineConfig::default();
        config.preprocess.low_cut = 50.0;
        config.preprocess.high_cut = 10.0;
        assert!(matches!(FeaturePipeline::new(config).run(&mixture.signal), Err(PipelineError::Config(_))));
    }
}
