//! Per-band time-domain views for plotting

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::filter::SosFilter;
use super::Band;

/// Butterworth order of each band-pass edge
pub const VIEW_FILTER_ORDER: usize = 4;

/// A named plot series: the unfiltered window or one band-passed copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalView {
    Raw,
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl SignalView {
    /// Every view, in display order
    pub const ALL: [SignalView; 6] = [
        SignalView::Raw,
        SignalView::Delta,
        SignalView::Theta,
        SignalView::Alpha,
        SignalView::Beta,
        SignalView::Gamma,
    ];

    /// Band filtered into this view, `None` for raw
    pub fn band(&self) -> Option<Band> {
        match self {
            SignalView::Raw => None,
            SignalView::Delta => Some(Band::Delta),
            SignalView::Theta => Some(Band::Theta),
            SignalView::Alpha => Some(Band::Alpha),
            SignalView::Beta => Some(Band::Beta),
            SignalView::Gamma => Some(Band::Gamma),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.band() {
            Some(band) => band.name(),
            None => "raw",
        }
    }
}

/// All six views keyed by name, each `samples x channels`
pub type SignalViews<const N: usize> = BTreeMap<SignalView, Vec<[f64; N]>>;

/// Filter for one band, degraded when an edge reaches Nyquist
fn band_filter(band: Band, sample_rate: f64) -> Option<SosFilter> {
    let (low, high) = band.range_hz();
    let nyquist = sample_rate / 2.0;
    if low >= nyquist {
        None
    } else if high >= nyquist {
        Some(SosFilter::highpass(low, sample_rate, VIEW_FILTER_ORDER))
    } else {
        Some(SosFilter::bandpass(low, high, sample_rate, VIEW_FILTER_ORDER))
    }
}

/// Build the raw view and one zero-phase band-passed view per band
///
/// Each channel is filtered independently. Windows too short for the
/// forward-backward padding get a single causal pass instead.
pub fn build_signal_views<const N: usize>(window: &[[f64; N]], sample_rate: f64) -> SignalViews<N> {
    let mut views = SignalViews::new();
    views.insert(SignalView::Raw, window.to_vec());

    let columns: Vec<Vec<f64>> = (0..N)
        .map(|ch| window.iter().map(|row| row[ch]).collect())
        .collect();

    for view in SignalView::ALL.iter().skip(1) {
        let mut filtered = vec![[0.0; N]; window.len()];
        let filter = view.band().and_then(|band| band_filter(band, sample_rate));
        if let (Some(filter), false) = (filter, window.is_empty()) {
            for (ch, column) in columns.iter().enumerate() {
                for (row, value) in filtered.iter_mut().zip(filter.filtfilt(column)) {
                    row[ch] = value;
                }
            }
        }
        views.insert(*view, filtered);
    }

    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn rms(values: impl Iterator<Item = f64>) -> f64 {
        let v: Vec<f64> = values.collect();
        (v.iter().map(|x| x * x).sum::<f64>() / v.len() as f64).sqrt()
    }

    #[test]
    fn test_six_views_in_order() {
        let window = vec![[1.0, 2.0]; 100];
        let views = build_signal_views(&window, 250.0);
        let keys: Vec<_> = views.keys().copied().collect();
        assert_eq!(keys, SignalView::ALL.to_vec());
        assert_eq!(views[&SignalView::Raw], window);
        for rows in views.values() {
            assert_eq!(rows.len(), 100);
        }
    }

    #[test]
    fn test_alpha_view_isolates_alpha_tone() {
        let fs = 250.0;
        let window: Vec<[f64; 1]> = (0..2000)
            .map(|i| {
                let t = i as f64 / fs;
                [(2.0 * PI * 10.0 * t).sin() + (2.0 * PI * 2.0 * t).sin()]
            })
            .collect();
        let views = build_signal_views(&window, fs);
        let alpha = rms(views[&SignalView::Alpha][500..1500].iter().map(|r| r[0]));
        let delta = rms(views[&SignalView::Delta][500..1500].iter().map(|r| r[0]));
        let gamma = rms(views[&SignalView::Gamma][500..1500].iter().map(|r| r[0]));
        assert!(alpha > 0.4 && alpha < 0.75, "alpha={alpha}");
        assert!(delta > 0.4, "delta={delta}");
        assert!(gamma < 0.01, "gamma={gamma}");
    }

    #[test]
    fn test_short_window_still_produces_views() {
        let window = vec![[1.0; 4]; 10];
        let views = build_signal_views(&window, 250.0);
        assert_eq!(views.len(), 6);
        assert!(views.values().all(|rows| rows.len() == 10));
    }

    #[test]
    fn test_empty_window() {
        let views = build_signal_views::<4>(&[], 250.0);
        assert_eq!(views.len(), 6);
        assert!(views.values().all(|rows| rows.is_empty()));
    }

    #[test]
    fn test_band_above_nyquist_is_zeroed() {
        // fs = 60 Hz puts gamma's low edge at Nyquist
        let window: Vec<[f64; 1]> = (0..300).map(|i| [(i as f64 * 0.3).sin()]).collect();
        let views = build_signal_views(&window, 60.0);
        assert!(views[&SignalView::Gamma].iter().all(|r| r[0] == 0.0));
        // Beta's high edge (30 Hz) reaches Nyquist, so it is high-passed only
        assert!(views[&SignalView::Beta].iter().any(|r| r[0] != 0.0));
    }

    #[test]
    fn test_view_names_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&SignalView::Raw).unwrap(), "\"raw\"");
        assert_eq!(SignalView::Gamma.name(), "gamma");
    }
}
