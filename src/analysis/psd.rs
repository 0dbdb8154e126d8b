//! Power spectral density estimation
//!
//! Provides two interchangeable estimators behind the [`PsdEstimator`] trait:
//! - [`PeriodogramEstimator`]: one-shot, unwindowed periodogram (default)
//! - [`WelchEstimator`]: Hann-windowed, 50% overlapped, segment-averaged
//!
//! Both return a one-sided spectrum over bins `k * fs / n` for `k = 0..=n/2`
//! in units of uV^2/Hz.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function applied to each segment before the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFunction {
    /// Rectangular window (no windowing)
    #[default]
    Rectangular,
    /// Periodic Hann window
    Hann,
}

impl WindowFunction {
    /// Compute window coefficient at position i out of n samples
    pub fn coefficient(&self, i: usize, n: usize) -> f64 {
        match self {
            WindowFunction::Rectangular => 1.0,
            WindowFunction::Hann => 0.5 * (1.0 - (2.0 * PI * i as f64 / n as f64).cos()),
        }
    }

    /// Generate window coefficients for n samples
    pub fn generate(&self, n: usize) -> Vec<f64> {
        (0..n).map(|i| self.coefficient(i, n)).collect()
    }
}

/// One-sided spectrum of a single channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PsdEstimate {
    /// Frequency bins (Hz)
    pub frequencies: Vec<f64>,
    /// Power density per bin (uV^2/Hz)
    pub psd: Vec<f64>,
}

impl PsdEstimate {
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Frequency resolution (Hz per bin)
    pub fn resolution(&self) -> f64 {
        match self.frequencies.get(1) {
            Some(f) => *f,
            None => 0.0,
        }
    }
}

/// Strategy for turning a time series into a power spectral density
pub trait PsdEstimator: Send + Sync {
    /// Estimate the PSD of `samples` taken at `sample_rate` Hz
    fn estimate_psd(&self, samples: &[f64], sample_rate: f64) -> PsdEstimate;

    /// Short identifier used in logs
    fn name(&self) -> &'static str;
}

/// Configuration-selected estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PsdMethod {
    #[default]
    Periodogram,
    Welch,
}

impl PsdMethod {
    /// Build the estimator for this method
    pub fn build(self, welch_segment_len: usize) -> Box<dyn PsdEstimator> {
        match self {
            PsdMethod::Periodogram => Box::new(PeriodogramEstimator),
            PsdMethod::Welch => Box::new(WelchEstimator::new(welch_segment_len)),
        }
    }
}

fn rfft_bins(n: usize, sample_rate: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * sample_rate / n as f64).collect()
}

fn forward_power(planner: &mut FftPlanner<f64>, input: impl Iterator<Item = f64>, n: usize) -> Vec<f64> {
    let mut buffer: Vec<Complex<f64>> = input.map(|v| Complex::new(v, 0.0)).collect();
    buffer.resize(n, Complex::new(0.0, 0.0));
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);
    buffer.iter().take(n / 2 + 1).map(|c| c.norm_sqr()).collect()
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    }
}

/// Single-window periodogram over the whole input
///
/// The mean is subtracted, no window is applied and one-sided bins are not
/// doubled: `psd[k] = |X[k]|^2 / (fs * n)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodogramEstimator;

impl PsdEstimator for PeriodogramEstimator {
    fn estimate_psd(&self, samples: &[f64], sample_rate: f64) -> PsdEstimate {
        let n = samples.len();
        if n == 0 || sample_rate <= 0.0 {
            return PsdEstimate::default();
        }

        let m = mean(samples);
        let mut planner = FftPlanner::new();
        let power = forward_power(&mut planner, samples.iter().map(|v| v - m), n);
        let scale = 1.0 / (sample_rate * n as f64);

        PsdEstimate {
            frequencies: rfft_bins(n, sample_rate),
            psd: power.into_iter().map(|p| p * scale).collect(),
        }
    }

    fn name(&self) -> &'static str {
        "periodogram"
    }
}

/// Averaged periodogram over Hann-windowed, half-overlapping segments
#[derive(Debug, Clone, Copy)]
pub struct WelchEstimator {
    /// Upper bound on segment length; shorter inputs use a single segment
    pub segment_len: usize,
    window: WindowFunction,
}

impl WelchEstimator {
    pub fn new(segment_len: usize) -> Self {
        Self {
            segment_len: segment_len.max(1),
            window: WindowFunction::Hann,
        }
    }
}

impl Default for WelchEstimator {
    fn default() -> Self {
        Self::new(512)
    }
}

impl PsdEstimator for WelchEstimator {
    fn estimate_psd(&self, samples: &[f64], sample_rate: f64) -> PsdEstimate {
        let n = samples.len();
        if n == 0 || sample_rate <= 0.0 {
            return PsdEstimate::default();
        }

        let nperseg = self.segment_len.min(n);
        let hop = (nperseg - nperseg / 2).max(1);
        let window = self.window.generate(nperseg);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        if window_power <= 0.0 {
            return PsdEstimate::default();
        }
        let scale = 1.0 / (sample_rate * window_power);
        let bins = nperseg / 2 + 1;

        let mut planner = FftPlanner::new();
        let mut accumulated = vec![0.0; bins];
        let mut segments = 0usize;
        let mut start = 0usize;
        while start + nperseg <= n {
            let segment = &samples[start..start + nperseg];
            let m = mean(segment);
            let power = forward_power(
                &mut planner,
                segment.iter().zip(&window).map(|(v, w)| (v - m) * w),
                nperseg,
            );
            for (acc, p) in accumulated.iter_mut().zip(power) {
                *acc += p;
            }
            segments += 1;
            start += hop;
        }

        let last_doubled = if nperseg % 2 == 0 { bins - 1 } else { bins };
        let psd = accumulated
            .into_iter()
            .enumerate()
            .map(|(k, p)| {
                let one_sided = if k > 0 && k < last_doubled { 2.0 } else { 1.0 };
                p * scale * one_sided / segments as f64
            })
            .collect();

        PsdEstimate {
            frequencies: rfft_bins(nperseg, sample_rate),
            psd,
        }
    }

    fn name(&self) -> &'static str {
        "welch"
    }
}
