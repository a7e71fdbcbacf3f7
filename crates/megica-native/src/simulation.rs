//! Synthetic mixtures for testing and validation
//!
//! Builds a multichannel recording as a known linear mix of non-Gaussian
//! source generators plus Gaussian sensor noise:
//!
//! ```text
//! sources (k × n) ─mixing (ch × k)─▶ + noise ─▶ MultichannelSignal
//! ```
//!
//! The true mixing matrix is returned alongside so recovered topographies can
//! be scored.

use std::f64::consts::PI;

use megica_core::error::SignalResult;
use megica_core::types::{ChannelInfo, ChannelKind, ChannelLayout, MultichannelSignal, SensorPosition};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp1, StandardNormal};
use serde::{Deserialize, Serialize};

/// Source generator
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceWaveform {
    /// Sinusoid (sub-Gaussian)
    Sine {
        /// Frequency in Hz
        freq: f64,
    },
    /// Rising sawtooth (uniform amplitude distribution)
    Sawtooth {
        /// Frequency in Hz
        freq: f64,
    },
    /// Square wave
    Square {
        /// Frequency in Hz
        freq: f64,
    },
    /// Laplacian noise (super-Gaussian, spiky)
    Laplacian,
}

impl SourceWaveform {
    /// Generate `n` samples at `sampling_rate`
    fn generate<R: Rng>(self, n: usize, sampling_rate: f64, rng: &mut R) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / sampling_rate;
                match self {
                    Self::Sine { freq } => (2.0 * PI * freq * t).sin(),
                    Self::Sawtooth { freq } => 2.0 * (freq * t).fract() - 1.0,
                    Self::Square { freq } => {
                        if (freq * t).fract() < 0.5 {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                    Self::Laplacian => {
                        let magnitude: f64 = rng.sample(Exp1);
                        if rng.gen::<bool>() {
                            magnitude
                        } else {
                            -magnitude
                        }
                    }
                }
            })
            .collect()
    }
}

/// Simulation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of sensor channels
    pub n_channels: usize,
    /// Samples per channel
    pub n_samples: usize,
    /// Sampling rate (Hz)
    pub sampling_rate: f64,
    /// One generator per independent source
    pub waveforms: Vec<SourceWaveform>,
    /// Standard deviation of additive sensor noise (sources have unit variance)
    pub noise_std: f64,
    /// Seed for mixing matrix and noise
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_channels: 10,
            n_samples: 2000,
            sampling_rate: 500.0,
            waveforms: vec![
                SourceWaveform::Sine { freq: 7.0 },
                SourceWaveform::Sawtooth { freq: 3.3 },
                SourceWaveform::Laplacian,
            ],
            noise_std: 0.05,
            seed: 42,
        }
    }
}

/// A simulated recording with its ground truth
#[derive(Clone, Debug)]
pub struct SyntheticMixture {
    /// The mixed recording
    pub signal: MultichannelSignal,
    /// True mixing matrix (channels × sources)
    pub mixing: DMatrix<f64>,
    /// True sources, zero-mean unit-variance (sources × samples)
    pub sources: DMatrix<f64>,
}

impl SimulationConfig {
    /// Generate the mixture.
    ///
    /// Channels are magnetometers laid out on a ring.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalError`](megica_core::SignalError) if the
    /// configuration describes an empty or invalid signal.
    pub fn generate(&self) -> SignalResult<SyntheticMixture> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let k = self.waveforms.len();
        let n = self.n_samples;

        let mut sources = DMatrix::zeros(k, n);
        for (i, waveform) in self.waveforms.iter().enumerate() {
            let samples = standardize(waveform.generate(n, self.sampling_rate, &mut rng));
            for (j, v) in samples.into_iter().enumerate() {
                sources[(i, j)] = v;
            }
        }

        let mut mixing = DMatrix::zeros(self.n_channels, k);
        for v in mixing.iter_mut() {
            *v = rng.sample(StandardNormal);
        }

        let mixed = &mixing * &sources;
        let data: Vec<Vec<f64>> = mixed
            .row_iter()
            .map(|row| {
                row.iter()
                    .map(|&v| v + self.noise_std * rng.sample::<f64, _>(StandardNormal))
                    .collect()
            })
            .collect();

        let signal = MultichannelSignal::new(data, self.sampling_rate, ring_layout(self.n_channels))?;
        Ok(SyntheticMixture { signal, mixing, sources })
    }
}

/// Magnetometers evenly spaced on a 9 cm ring
#[must_use]
pub fn ring_layout(n_channels: usize) -> ChannelLayout {
    ChannelLayout::new(
        (0..n_channels)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / n_channels.max(1) as f64;
                ChannelInfo::new(format!("MEG{:03}", i + 1), ChannelKind::Magnetometer)
                    .with_position(SensorPosition::planar(0.09 * angle.cos(), 0.09 * angle.sin()))
            })
            .collect(),
    )
}

/// Pearson correlation coefficient
#[must_use]
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len()) as f64;
    if n < 2.0 {
        return 0.0;
    }

    let mean_x: f64 = x.iter().sum::<f64>() / n;
    let mean_y: f64 = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom > 0.0 {
        cov / denom
    } else {
        0.0
    }
}

/// |correlation| of each true column with the estimated column matched to it.
///
/// Columns are paired one-to-one, greedily by highest |correlation|, so an
/// estimated column can account for at most one true column. True columns
/// left without a partner score 0. Insensitive to the permutation and sign
/// ambiguity of ICA.
#[must_use]
pub fn recovery_scores(estimated: &DMatrix<f64>, truth: &DMatrix<f64>) -> Vec<f64> {
    let estimated: Vec<Vec<f64>> = estimated.column_iter().map(|c| c.iter().copied().collect()).collect();
    let truth: Vec<Vec<f64>> = truth.column_iter().map(|c| c.iter().copied().collect()).collect();

    let mut pairs: Vec<(usize, usize, f64)> = truth
        .iter()
        .enumerate()
        .flat_map(|(t, tc)| {
            estimated.iter().enumerate().map(move |(e, ec)| (t, e, pearson_correlation(ec, tc).abs()))
        })
        .collect();
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut scores = vec![0.0; truth.len()];
    let mut truth_used = vec![false; truth.len()];
    let mut estimate_used = vec![false; estimated.len()];
    for (t, e, score) in pairs {
        if !truth_used[t] && !estimate_used[e] {
            truth_used[t] = true;
            estimate_used[e] = true;
            scores[t] = score;
        }
    }
    scores
}

fn standardize(mut x: Vec<f64>) -> Vec<f64> {
    let n = x.len().max(1) as f64;
    let mean = x.iter().sum::<f64>() / n;
    let std = (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let scale = if std > 0.0 { 1.0 / std } else { 1.0 };
    for v in &mut x {
        *v = (*v - mean) * scale;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pearson_correlation() {
        // Perfect positive correlation
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        assert!((pearson_correlation(&x, &y) - 1.0).abs() < 0.001);

        // Perfect negative correlation
        let y_neg = vec![10.0, 8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&x, &y_neg) - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn test_mixture_shapes() {
        let mixture = SimulationConfig::default().generate().unwrap();
        assert_eq!(mixture.signal.n_channels(), 10);
        assert_eq!(mixture.signal.n_samples(), 2000);
        assert_eq!(mixture.mixing.shape(), (10, 3));
        assert_eq!(mixture.sources.shape(), (3, 2000));
        assert!(mixture.signal.layout().iter().all(|c| c.position.is_some()));
    }

    #[test]
    fn test_sources_standardized() {
        let mixture = SimulationConfig::default().generate().unwrap();
        for row in mixture.sources.row_iter() {
            let mean = row.mean();
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / row.len() as f64;
            assert!(mean.abs() < 1e-9);
            assert!((var - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_mixture() {
        let a = SimulationConfig::default().generate().unwrap();
        let b = SimulationConfig::default().generate().unwrap();
        assert_eq!(a.signal, b.signal);
        assert_eq!(a.mixing, b.mixing);
    }

    #[test]
    fn test_recovery_scores_ignore_sign_and_order() {
        let truth = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 1.0, 3.0, -1.0]);
        let estimated = DMatrix::from_row_slice(3, 2, &[0.0, -2.0, -2.0, -4.0, 2.0, -6.0]);
        let scores = recovery_scores(&estimated, &truth);
        assert!(scores.iter().all(|s| (s - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_recovery_scores_match_one_to_one() {
        // Both estimated columns track the first true column only
        let truth = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, 2.0, -1.0, 3.0, 1.0, 4.0, -1.0]);
        let estimated = DMatrix::from_row_slice(4, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0, 4.0, 8.0]);
        let scores = recovery_scores(&estimated, &truth);
        assert!((scores[0] - 1.0).abs() < 1e-12);
        assert!(scores[1] < 0.5, "second column reused: {scores:?}");

        // Fewer estimates than sources leaves a source unmatched
        let single = DMatrix::from_row_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(recovery_scores(&single, &truth)[1], 0.0);
    }
}
