//! Spectral analysis of the rolling EEG window
//!
//! This module provides the pure signal-processing stage fed by the
//! acquisition engine:
//! - PSD estimation ([`PsdEstimator`], periodogram and Welch)
//! - Band-power integration and focus/relax heuristics ([`compute_band_metrics`])
//! - Zero-phase Butterworth band-pass views for plotting ([`build_signal_views`])
//!
//! Nothing here touches engine state; callers pass a copied
//! `samples x channels` matrix of microvolt values.

pub mod bands;
pub mod filter;
pub mod psd;
pub mod views;

pub use bands::{compute_band_metrics, BandMetrics, MIN_ANALYSIS_SAMPLES};
pub use filter::{BiquadCoeffs, SosFilter};
pub use psd::{PeriodogramEstimator, PsdEstimate, PsdEstimator, PsdMethod, WelchEstimator, WindowFunction};
pub use views::{build_signal_views, SignalView, SignalViews};

use serde::{Deserialize, Serialize};

/// Canonical EEG frequency band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// All bands, lowest first
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    /// Frequency range in Hz, low inclusive and high exclusive
    pub fn range_hz(&self) -> (f64, f64) {
        match self {
            Band::Delta => (1.0, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 12.0),
            Band::Beta => (12.0, 30.0),
            Band::Gamma => (30.0, 45.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    /// Whether `freq` falls inside this band
    pub fn contains(&self, freq: f64) -> bool {
        let (low, high) = self.range_hz();
        freq >= low && freq < high
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
