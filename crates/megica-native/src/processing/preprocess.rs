//! Signal conditioning ahead of decomposition
//!
//! Channel selection, zero-phase band-pass, line-noise notch and FFT rate
//! reduction. The input signal is never modified; a new signal is returned.

use megica_core::config::PreprocessConfig;
use megica_core::types::MultichannelSignal;
use tracing::{debug, info, warn};

use super::filters::{exceeds_harmonic_limit, FilterChain};
use super::resample::{resampled_len, FftResampler};
use crate::error::{PreprocessError, PreprocessResult};

/// Padding used for zero-phase filtering, in periods of the lowest cutoff
const PAD_PERIODS: f64 = 3.0;

/// Preprocessing stage
#[derive(Clone, Debug)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor with the given parameters
    #[must_use]
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Parameters in use
    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run selection, filtering and resampling on `signal`.
    ///
    /// # Errors
    ///
    /// - [`PreprocessError::InvalidChannelSet`] if no channel of the configured
    ///   kinds is present
    /// - [`PreprocessError::InvalidFilterRange`] if the band is inverted,
    ///   non-positive or reaches the input Nyquist frequency
    /// - [`PreprocessError::InvalidNotchFrequency`] if the line frequency is
    ///   not positive, or so low that harmonic notching would need more than
    ///   [`MAX_NOTCH_HARMONICS`](super::filters::MAX_NOTCH_HARMONICS) sections
    /// - [`PreprocessError::InvalidResampleRate`] if the target rate is not in
    ///   `(0, sampling_rate]`
    /// - [`PreprocessError::Signal`] if the output contains NaN or infinity
    pub fn process(&self, signal: &MultichannelSignal) -> PreprocessResult<MultichannelSignal> {
        let cfg = &self.config;
        let selected = self.select_channels(signal)?;

        let sampling_rate = selected.sampling_rate();
        let nyquist = selected.nyquist();
        validate_band(cfg.low_cut, cfg.high_cut, nyquist)?;
        if !(cfg.line_freq.is_finite() && cfg.line_freq > 0.0)
            || (cfg.notch_harmonics && exceeds_harmonic_limit(sampling_rate, cfg.line_freq))
        {
            return Err(PreprocessError::InvalidNotchFrequency { line_freq: cfg.line_freq });
        }
        if !(cfg.target_rate.is_finite() && cfg.target_rate > 0.0 && cfg.target_rate <= sampling_rate) {
            return Err(PreprocessError::InvalidResampleRate {
                target_rate: cfg.target_rate,
                sampling_rate,
            });
        }

        let bandpass = FilterChain::bandpass(sampling_rate, cfg.low_cut, cfg.high_cut);
        let notch = FilterChain::notch(sampling_rate, cfg.line_freq, cfg.notch_q, cfg.notch_harmonics);
        if notch.is_empty() {
            warn!(
                "Line frequency {} Hz is at or above Nyquist ({} Hz), skipping notch",
                cfg.line_freq, nyquist
            );
        }
        let pad_len = (PAD_PERIODS * sampling_rate / cfg.low_cut).ceil() as usize;

        let n_out = if cfg.target_rate < sampling_rate {
            resampled_len(selected.n_samples(), sampling_rate, cfg.target_rate)
        } else {
            selected.n_samples()
        };
        let mut resampler = FftResampler::new();

        debug!(
            channels = selected.n_channels(),
            samples_in = selected.n_samples(),
            samples_out = n_out,
            notch_sections = notch.len(),
            "Filtering channels"
        );

        let data: Vec<Vec<f64>> = selected
            .channels()
            .iter()
            .map(|channel| {
                let mean = channel.iter().sum::<f64>() / channel.len() as f64;
                let centered: Vec<f64> = channel.iter().map(|v| v - mean).collect();
                let filtered = bandpass.apply_zero_phase(&centered, pad_len);
                let cleaned = notch.apply_zero_phase(&filtered, pad_len);
                resampler.resample(&cleaned, n_out)
            })
            .collect();

        let out_rate = if n_out == selected.n_samples() { sampling_rate } else { cfg.target_rate };
        let output = selected.with_data(data, out_rate)?;
        output.ensure_finite()?;

        info!(
            "Preprocessed {} channels: {}-{} Hz band, {} Hz notch, {} Hz → {} Hz ({} samples)",
            output.n_channels(),
            cfg.low_cut,
            cfg.high_cut,
            cfg.line_freq,
            sampling_rate,
            out_rate,
            output.n_samples()
        );

        Ok(output)
    }

    fn select_channels(&self, signal: &MultichannelSignal) -> PreprocessResult<MultichannelSignal> {
        let indices = signal.layout().indices_of(&self.config.channel_kinds);
        if indices.is_empty() {
            return Err(PreprocessError::InvalidChannelSet { available: signal.n_channels() });
        }

        let dropped = signal.n_channels() - indices.len();
        if dropped > 0 {
            let kinds: Vec<&str> = self.config.channel_kinds.iter().map(|k| k.name()).collect();
            warn!("Dropping {} channels not of kind {:?}", dropped, kinds);
        }

        Ok(signal.select(&indices)?)
    }
}

/// Preprocess with the default channel selection and notch settings.
///
/// # Errors
///
/// See [`Preprocessor::process`].
pub fn preprocess(
    signal: &MultichannelSignal,
    low_cut: f64,
    high_cut: f64,
    line_freq: f64,
    target_rate: f64,
) -> PreprocessResult<MultichannelSignal> {
    Preprocessor::new(PreprocessConfig {
        low_cut,
        high_cut,
        line_freq,
        target_rate,
        ..PreprocessConfig::default()
    })
    .process(signal)
}

fn validate_band(low_cut: f64, high_cut: f64, nyquist: f64) -> PreprocessResult<()> {
    let valid = low_cut.is_finite()
        && high_cut.is_finite()
        && low_cut > 0.0
        && high_cut > 0.0
        && low_cut < high_cut
        && high_cut < nyquist;

    if valid {
        Ok(())
    } else {
        Err(PreprocessError::InvalidFilterRange { low_cut, high_cut, nyquist })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megica_core::types::{ChannelInfo, ChannelKind, ChannelLayout};
    use std::f64::consts::PI;

    /// Two magnetometers carrying 10 Hz + 50 Hz, plus an EOG channel
    fn recording(sampling_rate: f64, n: usize) -> MultichannelSignal {
        let wave = |phase: f64| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    let t = i as f64 / sampling_rate;
                    (2.0 * PI * 10.0 * t + phase).sin() + 0.8 * (2.0 * PI * 50.0 * t).sin() + 3.0
                })
                .collect()
        };
        let layout = ChannelLayout::new(vec![
            ChannelInfo::new("MEG0111", ChannelKind::Magnetometer),
            ChannelInfo::new("EOG061", ChannelKind::Eog),
            ChannelInfo::new("MEG0112", ChannelKind::Gradiometer),
        ]);
        MultichannelSignal::new(vec![wave(0.0), wave(1.0), wave(2.0)], sampling_rate, layout).unwrap()
    }

    fn amplitude_at(x: &[f64], freq: f64, sampling_rate: f64) -> f64 {
        let mid = &x[x.len() / 4..3 * x.len() / 4];
        let (mut re, mut im) = (0.0, 0.0);
        for (i, v) in mid.iter().enumerate() {
            let w = 2.0 * PI * freq * i as f64 / sampling_rate;
            re += v * w.cos();
            im += v * w.sin();
        }
        2.0 * (re * re + im * im).sqrt() / mid.len() as f64
    }

    #[test]
    fn test_selects_meg_and_cleans() {
        let signal = recording(1000.0, 8000);
        let out = preprocess(&signal, 1.0, 40.0, 50.0, 200.0).unwrap();

        assert_eq!(out.n_channels(), 2);
        assert_eq!(out.n_samples(), 1600);
        assert!((out.sampling_rate() - 200.0).abs() < f64::EPSILON);
        assert!(out.layout().iter().all(|c| c.kind.is_meg()));

        let ch = out.channel(0).unwrap();
        assert!(amplitude_at(ch, 10.0, 200.0) > 0.9);
        assert!(amplitude_at(ch, 50.0, 200.0) < 0.05);
        let mean = ch.iter().sum::<f64>() / ch.len() as f64;
        assert!(mean.abs() < 0.05, "DC should be removed, mean {mean}");
    }

    #[test]
    fn test_input_not_mutated() {
        let signal = recording(500.0, 1000);
        let before = signal.clone();
        let _ = preprocess(&signal, 1.0, 40.0, 50.0, 250.0).unwrap();
        assert_eq!(signal, before);
    }

    #[test]
    fn test_same_rate_keeps_length() {
        let signal = recording(200.0, 1000);
        let out = preprocess(&signal, 1.0, 40.0, 50.0, 200.0).unwrap();
        assert_eq!(out.n_samples(), 1000);
    }

    #[test]
    fn test_inverted_band_rejected() {
        let signal = recording(1000.0, 1000);
        let result = preprocess(&signal, 50.0, 10.0, 50.0, 200.0);
        assert!(matches!(result, Err(PreprocessError::InvalidFilterRange { .. })));
    }

    #[test]
    fn test_band_above_nyquist_rejected() {
        let signal = recording(100.0, 1000);
        let result = preprocess(&signal, 1.0, 60.0, 50.0, 100.0);
        assert!(matches!(result, Err(PreprocessError::InvalidFilterRange { nyquist, .. }) if (nyquist - 50.0).abs() < 1e-12));
    }

    #[test]
    fn test_non_positive_cutoff_rejected() {
        let signal = recording(1000.0, 1000);
        assert!(matches!(
            preprocess(&signal, 0.0, 40.0, 50.0, 200.0),
            Err(PreprocessError::InvalidFilterRange { .. })
        ));
    }

    #[test]
    fn test_invalid_resample_rate_rejected() {
        let signal = recording(1000.0, 1000);
        assert!(matches!(
            preprocess(&signal, 1.0, 40.0, 50.0, 0.0),
            Err(PreprocessError::InvalidResampleRate { .. })
        ));
        assert!(matches!(
            preprocess(&signal, 1.0, 40.0, 50.0, 2000.0),
            Err(PreprocessError::InvalidResampleRate { .. })
        ));
    }

    #[test]
    fn test_invalid_notch_rejected() {
        let signal = recording(1000.0, 1000);
        assert!(matches!(
            preprocess(&signal, 1.0, 40.0, -50.0, 200.0),
            Err(PreprocessError::InvalidNotchFrequency { .. })
        ));
    }

    #[test]
    fn test_tiny_line_freq_with_harmonics_rejected() {
        let signal = recording(1000.0, 1000);
        let preprocessor = Preprocessor::new(PreprocessConfig {
            line_freq: 0.001,
            notch_harmonics: true,
            ..PreprocessConfig::default()
        });
        assert!(matches!(
            preprocessor.process(&signal),
            Err(PreprocessError::InvalidNotchFrequency { .. })
        ));
    }

    #[test]
    fn test_harmonic_notch_suppresses_100_hz() {
        let rate = 1000.0;
        let n = 8000;
        let data: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / rate;
                (2.0 * PI * 10.0 * t).sin() + 0.8 * (2.0 * PI * 100.0 * t).sin()
            })
            .collect();
        let signal =
            MultichannelSignal::new(vec![data], rate, ChannelLayout::uniform(1, ChannelKind::Magnetometer))
                .unwrap();

        let config = |notch_harmonics| PreprocessConfig {
            high_cut: 150.0,
            target_rate: rate,
            notch_harmonics,
            ..PreprocessConfig::default()
        };

        let with = Preprocessor::new(config(true)).process(&signal).unwrap();
        let without = Preprocessor::new(config(false)).process(&signal).unwrap();

        let with = with.channel(0).unwrap();
        let without = without.channel(0).unwrap();
        assert!(amplitude_at(with, 100.0, rate) < 0.05);
        assert!(amplitude_at(without, 100.0, rate) > 0.5);
        assert!(amplitude_at(with, 10.0, rate) > 0.9);
    }

    #[test]
    fn test_no_matching_channels_rejected() {
        let signal = recording(1000.0, 1000);
        let preprocessor = Preprocessor::new(PreprocessConfig {
            channel_kinds: vec![ChannelKind::Ecg],
            ..PreprocessConfig::default()
        });
        assert!(matches!(
            preprocessor.process(&signal),
            Err(PreprocessError::InvalidChannelSet { available: 3 })
        ));
    }
}
