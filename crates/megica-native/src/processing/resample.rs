//! FFT-based rate reduction
//!
//! Truncating the spectrum to the output length is an ideal low-pass at the
//! new Nyquist frequency, so no separate anti-aliasing filter is needed.

use rustfft::{num_complex::Complex, FftPlanner};

/// Number of output samples when going from `from_rate` to `to_rate`
#[must_use]
pub fn resampled_len(n_samples: usize, from_rate: f64, to_rate: f64) -> usize {
    ((n_samples as f64 * to_rate / from_rate).round() as usize).max(1)
}

/// Reusable FFT resampler
pub struct FftResampler {
    planner: FftPlanner<f64>,
}

impl Default for FftResampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FftResampler {
    /// Create a new resampler
    #[must_use]
    pub fn new() -> Self {
        Self { planner: FftPlanner::new() }
    }

    /// Resample `samples` to `n_out` samples.
    ///
    /// Only reduction (`n_out <= samples.len()`) applies an anti-aliasing
    /// cut; a longer `n_out` zero-pads the spectrum.
    pub fn resample(&mut self, samples: &[f64], n_out: usize) -> Vec<f64> {
        let n = samples.len();
        if n == 0 || n_out == 0 {
            return Vec::new();
        }
        if n_out == n {
            return samples.to_vec();
        }

        let mut spectrum: Vec<Complex<f64>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        self.planner.plan_fft_forward(n).process(&mut spectrum);

        let mut out = vec![Complex::new(0.0, 0.0); n_out];
        let shared = n.min(n_out);
        let half = (shared - 1) / 2;

        // DC and the positive/negative frequencies both lengths can represent
        out[0] = spectrum[0];
        for k in 1..=half {
            out[k] = spectrum[k];
            out[n_out - k] = spectrum[n - k];
        }

        // The shorter length's Nyquist bin gets folded or split
        if shared % 2 == 0 {
            let nyq = shared / 2;
            if n_out < n {
                out[nyq] = spectrum[nyq] + spectrum[n - nyq];
            } else {
                out[nyq] = spectrum[nyq] * 0.5;
                out[n_out - nyq] = spectrum[nyq] * 0.5;
            }
        }

        self.planner.plan_fft_inverse(n_out).process(&mut out);

        // rustfft is unnormalised: forward(n) then inverse(n_out) scales by n
        let scale = 1.0 / n as f64;
        out.iter().map(|c| c.re * scale).collect()
    }
}
