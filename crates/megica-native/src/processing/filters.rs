//! Digital filters for MEG preprocessing
//!
//! Floating-point biquad sections (Butterworth high/low-pass, notch) and a
//! cascade that can be run forward-backward for zero-phase filtering.

use std::f64::consts::{PI, SQRT_2};

/// Most notch sections a harmonic chain will hold
pub const MAX_NOTCH_HARMONICS: usize = 100;

/// Biquad coefficients (second-order section), normalised so `a0 = 1`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    /// Numerator coefficients [b0, b1, b2]
    pub b: [f64; 3],
    /// Denominator coefficients [a0=1, a1, a2]
    pub a: [f64; 3],
}

impl BiquadCoeffs {
    /// Gain at DC
    #[must_use]
    pub fn dc_gain(&self) -> f64 {
        let den = self.a[0] + self.a[1] + self.a[2];
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b[0] + self.b[1] + self.b[2]) / den
        }
    }
}

/// Second-order biquad filter section (transposed direct form II)
#[derive(Clone, Debug)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    /// State: [z1, z2]
    state: [f64; 2],
}

impl Biquad {
    /// Create a new biquad section with given coefficients
    #[must_use]
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self { coeffs, state: [0.0, 0.0] }
    }

    /// Create a second-order Butterworth lowpass filter
    #[must_use]
    pub fn lowpass(sample_rate: f64, cutoff: f64) -> Self {
        let k = (PI * cutoff / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + SQRT_2 * k + k2);

        Self::new(BiquadCoeffs {
            b: [k2 * norm, 2.0 * k2 * norm, k2 * norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - SQRT_2 * k + k2) * norm],
        })
    }

    /// Create a second-order Butterworth highpass filter
    #[must_use]
    pub fn highpass(sample_rate: f64, cutoff: f64) -> Self {
        let k = (PI * cutoff / sample_rate).tan();
        let k2 = k * k;
        let norm = 1.0 / (1.0 + SQRT_2 * k + k2);

        Self::new(BiquadCoeffs {
            b: [norm, -2.0 * norm, norm],
            a: [1.0, 2.0 * (k2 - 1.0) * norm, (1.0 - SQRT_2 * k + k2) * norm],
        })
    }

    /// Create a notch filter for power line interference
    #[must_use]
    pub fn notch(sample_rate: f64, notch_freq: f64, q: f64) -> Self {
        let omega = 2.0 * PI * notch_freq / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 / (1.0 + alpha);

        Self::new(BiquadCoeffs {
            b: [norm, -2.0 * cos_omega * norm, norm],
            a: [1.0, -2.0 * cos_omega * norm, (1.0 - alpha) * norm],
        })
    }

    /// Coefficients of this section
    #[must_use]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Process a single sample
    pub fn filter(&mut self, input: f64) -> f64 {
        let [b0, b1, b2] = self.coeffs.b;
        let [_, a1, a2] = self.coeffs.a;

        let output = b0 * input + self.state[0];
        self.state[0] = b1 * input - a1 * output + self.state[1];
        self.state[1] = b2 * input - a2 * output;

        output
    }

    /// Set the state to the steady-state response to a constant `input`.
    ///
    /// Returns the steady-state output.
    pub fn prime(&mut self, input: f64) -> f64 {
        let [_, b1, b2] = self.coeffs.b;
        let [_, a1, a2] = self.coeffs.a;
        let output = self.coeffs.dc_gain() * input;

        self.state[1] = b2 * input - a2 * output;
        self.state[0] = b1 * input - a1 * output + self.state[1];

        output
    }
}

/// Cascade of biquad sections applied in order
#[derive(Clone, Debug)]
pub struct FilterChain {
    sections: Vec<Biquad>,
}

impl FilterChain {
    /// Band-pass made of a Butterworth highpass at `low_cut` and lowpass at `high_cut`
    #[must_use]
    pub fn bandpass(sample_rate: f64, low_cut: f64, high_cut: f64) -> Self {
        Self {
            sections: vec![Biquad::highpass(sample_rate, low_cut), Biquad::lowpass(sample_rate, high_cut)],
        }
    }

    /// Notch at `line_freq`, optionally at every harmonic below Nyquist.
    ///
    /// Frequencies at or above Nyquist are skipped, so the chain may be empty.
    /// At most [`MAX_NOTCH_HARMONICS`] sections are built; see
    /// [`exceeds_harmonic_limit`] to detect truncation.
    #[must_use]
    pub fn notch(sample_rate: f64, line_freq: f64, q: f64, harmonics: bool) -> Self {
        let nyquist = sample_rate / 2.0;
        let mut sections = Vec::new();
        let mut freq = line_freq;
        while freq < nyquist && sections.len() < MAX_NOTCH_HARMONICS {
            sections.push(Biquad::notch(sample_rate, freq, q));
            if !harmonics {
                break;
            }
            freq += line_freq;
        }
        Self { sections }
    }

    /// Number of sections
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the chain has no sections
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Causal filtering, state primed to the first sample
    #[must_use]
    pub fn apply(&self, samples: &[f64]) -> Vec<f64> {
        let Some(&first) = samples.first() else {
            return Vec::new();
        };
        let mut sections = self.sections.clone();
        let mut steady = first;
        for section in &mut sections {
            steady = section.prime(steady);
        }

        samples
            .iter()
            .map(|&x| sections.iter_mut().fold(x, |acc, s| s.filter(acc)))
            .collect()
    }

    /// Zero-phase filtering (forward then backward pass).
    ///
    /// The signal is extended by odd reflection of `pad_len` samples at each
    /// end (clamped to `len - 1`) to limit edge transients. Magnitude response
    /// is the square of the single-pass response.
    #[must_use]
    pub fn apply_zero_phase(&self, samples: &[f64], pad_len: usize) -> Vec<f64> {
        let n = samples.len();
        if n == 0 || self.sections.is_empty() {
            return samples.to_vec();
        }
        let pad = pad_len.min(n - 1);
        let extended = odd_extend(samples, pad);

        let mut forward = self.apply(&extended);
        forward.reverse();
        let mut backward = self.apply(&forward);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

/// Whether more than [`MAX_NOTCH_HARMONICS`] multiples of `line_freq` lie
/// below the Nyquist frequency of `sample_rate`
#[must_use]
pub fn exceeds_harmonic_limit(sample_rate: f64, line_freq: f64) -> bool {
    line_freq * (MAX_NOTCH_HARMONICS as f64 + 1.0) < sample_rate / 2.0
}

/// Odd (point-symmetric) extension by `pad` samples at both ends.
///
/// `pad` must be smaller than `samples.len()`.
fn odd_extend(samples: &[f64], pad: usize) -> Vec<f64> {
    let n = samples.len();
    let first = samples[0];
    let last = samples[n - 1];

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i]));
    out.extend_from_slice(samples);
    out.extend((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i]));
    out
}
