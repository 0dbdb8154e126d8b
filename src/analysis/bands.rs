//! Band-power integration and engagement heuristics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::psd::{PsdEstimate, PsdEstimator};
use super::Band;

/// Windows shorter than this produce all-zero metrics
pub const MIN_ANALYSIS_SAMPLES: usize = 16;

const EPSILON: f64 = 1e-9;
const FOCUS_GAIN: f64 = 1.8;
const RELAX_GAIN: f64 = 2.0;

/// Result of one metrics refresh
///
/// Per-band scalars are the channel mean of the per-channel integrals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandMetrics {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// 0..=100, rises with beta relative to slower bands
    pub focus_score: f64,
    /// 0..=100, rises with alpha relative to beta and theta
    pub relax_score: f64,
    pub engagement_ratio: f64,
    pub relax_ratio: f64,
    /// Band power of each channel, in channel order
    pub per_channel: BTreeMap<Band, Vec<f64>>,
}

impl BandMetrics {
    /// All-zero metrics for `channels` channels
    pub fn zeroed(channels: usize) -> Self {
        Self {
            delta: 0.0,
            theta: 0.0,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            focus_score: 0.0,
            relax_score: 0.0,
            engagement_ratio: 0.0,
            relax_ratio: 0.0,
            per_channel: Band::ALL.iter().map(|b| (*b, vec![0.0; channels])).collect(),
        }
    }

    /// Channel-averaged power of `band`
    pub fn band(&self, band: Band) -> f64 {
        match band {
            Band::Delta => self.delta,
            Band::Theta => self.theta,
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Gamma => self.gamma,
        }
    }

    fn set_band(&mut self, band: Band, value: f64) {
        match band {
            Band::Delta => self.delta = value,
            Band::Theta => self.theta = value,
            Band::Alpha => self.alpha = value,
            Band::Beta => self.beta = value,
            Band::Gamma => self.gamma = value,
        }
    }
}

impl Default for BandMetrics {
    fn default() -> Self {
        Self::zeroed(crate::types::CHANNEL_COUNT)
    }
}

/// Trapezoidal integral of the PSD over the bins inside `band`
///
/// Fewer than two bins in range integrates to zero.
pub fn integrate_band(estimate: &PsdEstimate, band: Band) -> f64 {
    let points: Vec<(f64, f64)> = estimate
        .frequencies
        .iter()
        .zip(&estimate.psd)
        .filter(|(f, _)| band.contains(**f))
        .map(|(f, p)| (*f, *p))
        .collect();

    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) * 0.5)
        .sum()
}

fn saturating_score(ratio: f64, gain: f64) -> f64 {
    (100.0 * (1.0 - (-gain * ratio).exp())).clamp(0.0, 100.0)
}

/// Compute band powers and heuristic scores over a `samples x channels` window
pub fn compute_band_metrics<const N: usize>(
    window: &[[f64; N]],
    sample_rate: f64,
    estimator: &dyn PsdEstimator,
) -> BandMetrics {
    let mut metrics = BandMetrics::zeroed(N);
    if window.len() < MIN_ANALYSIS_SAMPLES || N == 0 {
        return metrics;
    }

    let mut column = Vec::with_capacity(window.len());
    for ch in 0..N {
        column.clear();
        column.extend(window.iter().map(|row| row[ch]));
        let estimate = estimator.estimate_psd(&column, sample_rate);
        for band in Band::ALL {
            if let Some(powers) = metrics.per_channel.get_mut(&band) {
                powers[ch] = integrate_band(&estimate, band);
            }
        }
    }

    for band in Band::ALL {
        let mean = metrics
            .per_channel
            .get(&band)
            .map(|powers| powers.iter().sum::<f64>() / N as f64)
            .unwrap_or(0.0);
        metrics.set_band(band, mean);
    }

    metrics.engagement_ratio = metrics.beta / (metrics.alpha + metrics.theta + metrics.delta + EPSILON);
    metrics.focus_score = saturating_score(metrics.engagement_ratio, FOCUS_GAIN);
    metrics.relax_ratio = metrics.alpha / (metrics.beta + metrics.theta + EPSILON);
    metrics.relax_score = saturating_score(metrics.relax_ratio, RELAX_GAIN);
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::psd::{PeriodogramEstimator, WelchEstimator};
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn tone_window(freq: f64, fs: f64, n: usize) -> Vec<[f64; 4]> {
        (0..n)
            .map(|i| {
                let v = 20.0 * (2.0 * PI * freq * i as f64 / fs).sin();
                [v, 0.9 * v, 1.1 * v, v]
            })
            .collect()
    }

    #[test]
    fn test_zero_window_gives_zero_metrics() {
        let window = vec![[0.0; 4]; 2000];
        let m = compute_band_metrics(&window, 250.0, &PeriodogramEstimator);
        for band in Band::ALL {
            assert_eq!(m.band(band), 0.0);
        }
        assert_eq!(m.focus_score, 0.0);
        assert_eq!(m.relax_score, 0.0);
    }

    #[test]
    fn test_short_window_gives_zero_metrics() {
        let window = tone_window(10.0, 250.0, MIN_ANALYSIS_SAMPLES - 1);
        let m = compute_band_metrics(&window, 250.0, &PeriodogramEstimator);
        assert_eq!(m, BandMetrics::zeroed(4));
    }

    #[test]
    fn test_alpha_tone_dominates_alpha_band() {
        let fs = 250.0;
        let window = tone_window(10.0, fs, 2000);
        let m = compute_band_metrics(&window, fs, &PeriodogramEstimator);
        assert!(m.alpha > m.beta && m.alpha > m.theta && m.alpha > m.delta);
        assert!(m.relax_score > 90.0);
        assert!(m.focus_score < 10.0);
        assert_eq!(m.per_channel[&Band::Alpha].len(), 4);
        // Channel 3 is scaled by 1.1, so it carries 1.21x the power
        let ch = &m.per_channel[&Band::Alpha];
        assert!((ch[2] / ch[0] - 1.21).abs() < 1e-6);
    }

    #[test]
    fn test_beta_tone_raises_focus() {
        let fs = 250.0;
        let window = tone_window(20.0, fs, 2000);
        let m = compute_band_metrics(&window, fs, &WelchEstimator::default());
        assert!(m.beta > m.alpha);
        assert!(m.focus_score > 90.0);
    }

    #[test]
    fn test_integrate_band_needs_two_bins() {
        let estimate = PsdEstimate {
            frequencies: vec![0.0, 5.0, 10.0, 15.0],
            psd: vec![1.0, 1.0, 1.0, 1.0],
        };
        // Only 10 Hz falls inside alpha
        assert_eq!(integrate_band(&estimate, Band::Alpha), 0.0);
    }

    #[test]
    fn test_integrate_band_trapezoid() {
        let estimate = PsdEstimate {
            frequencies: vec![11.0, 12.0, 13.0, 14.0, 30.0],
            psd: vec![9.0, 2.0, 4.0, 6.0, 100.0],
        };
        // beta covers 12, 13, 14: (2+4)/2 + (4+6)/2
        assert!((integrate_band(&estimate, Band::Beta) - 8.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_scores_stay_in_range(
            freq in 0.5f64..60.0,
            amplitude in 0.0f64..500.0,
            n in 16usize..600,
        ) {
            let window: Vec<[f64; 2]> = (0..n)
                .map(|i| {
                    let v = amplitude * (2.0 * PI * freq * i as f64 / 250.0).sin();
                    [v, -v]
                })
                .collect();
            let m = compute_band_metrics(&window, 250.0, &PeriodogramEstimator);
            prop_assert!((0.0..=100.0).contains(&m.focus_score));
            prop_assert!((0.0..=100.0).contains(&m.relax_score));
            for band in Band::ALL {
                prop_assert!(m.band(band) >= 0.0);
            }
        }
    }
}
