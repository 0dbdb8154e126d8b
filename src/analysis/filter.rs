//! Butterworth IIR filters in second-order-section form
//!
//! Sections run in Direct Form II Transposed. A band-pass of order `n` is the
//! cascade of an order-`n` high-pass at the low edge and an order-`n`
//! low-pass at the high edge.
//!
//! [`SosFilter::filtfilt`] runs the cascade forward and backward over an
//! odd-extended copy of the input, starting each pass from the steady-state
//! response to its first sample, which gives a zero-phase result without the
//! start-up transient.

use std::f64::consts::PI;

/// Biquad transfer function `(b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Biquad {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl Biquad {
    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    /// Load the state a constant input `u` settles into; returns the output
    fn settle(&mut self, u: f64) -> f64 {
        let c = self.coeffs;
        let y = u * c.dc_gain();
        self.z2 = c.b2 * u - c.a2 * y;
        self.z1 = c.b1 * u - c.a1 * y + self.z2;
        y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    Lowpass,
    Highpass,
}

/// Cascade of biquad sections
#[derive(Debug, Clone, Default)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn new(sections: impl IntoIterator<Item = BiquadCoeffs>) -> Self {
        Self {
            sections: sections
                .into_iter()
                .map(|coeffs| Biquad {
                    coeffs,
                    z1: 0.0,
                    z2: 0.0,
                })
                .collect(),
        }
    }

    /// Butterworth low-pass of `order` with cutoff `cutoff_hz`
    pub fn lowpass(cutoff_hz: f64, sample_rate: f64, order: usize) -> Self {
        Self::new(butterworth(Response::Lowpass, cutoff_hz, sample_rate, order))
    }

    /// Butterworth high-pass of `order` with cutoff `cutoff_hz`
    pub fn highpass(cutoff_hz: f64, sample_rate: f64, order: usize) -> Self {
        Self::new(butterworth(Response::Highpass, cutoff_hz, sample_rate, order))
    }

    /// Butterworth band-pass between `low_hz` and `high_hz`
    pub fn bandpass(low_hz: f64, high_hz: f64, sample_rate: f64, order: usize) -> Self {
        let mut sections = butterworth(Response::Highpass, low_hz, sample_rate, order);
        sections.extend(butterworth(Response::Lowpass, high_hz, sample_rate, order));
        Self::new(sections)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn coefficients(&self) -> Vec<BiquadCoeffs> {
        self.sections.iter().map(|s| s.coeffs).collect()
    }

    /// Edge padding used by [`Self::filtfilt`]
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |acc, section| section.process(acc))
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.z1 = 0.0;
            section.z2 = 0.0;
        }
    }

    /// Put every section in the steady state of a constant input `u`
    pub fn settle(&mut self, u: f64) {
        self.sections
            .iter_mut()
            .fold(u, |acc, section| section.settle(acc));
    }

    /// Single causal pass from rest
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut pass = self.clone();
        pass.reset();
        signal.iter().map(|&s| pass.process(s)).collect()
    }

    /// Zero-phase forward-backward filtering
    ///
    /// Inputs no longer than [`Self::pad_len`] fall back to a single
    /// causal pass.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        let pad = self.pad_len();
        if n <= pad {
            return self.filter(signal);
        }

        let first = signal[0];
        let last = signal[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        let mut pass = self.clone();
        pass.settle(ext[0]);
        let mut forward: Vec<f64> = ext.iter().map(|&s| pass.process(s)).collect();

        forward.reverse();
        pass.settle(forward[0]);
        for sample in forward.iter_mut() {
            *sample = pass.process(*sample);
        }
        forward.reverse();

        forward[pad..pad + n].to_vec()
    }
}

/// Bilinear-transform prewarp
fn prewarp(freq: f64, sample_rate: f64) -> f64 {
    (PI * freq / sample_rate).tan()
}

fn butterworth(response: Response, cutoff_hz: f64, sample_rate: f64, order: usize) -> Vec<BiquadCoeffs> {
    let wn = prewarp(cutoff_hz, sample_rate);
    let wn2 = wn * wn;
    let mut sections = Vec::with_capacity(order.div_ceil(2));

    for k in 0..order / 2 {
        // Pole pair damping 2 sin((2k+1) pi / 2n)
        let damping = 2.0 * (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin();
        let denom = 1.0 + damping * wn + wn2;
        let a1 = 2.0 * (wn2 - 1.0) / denom;
        let a2 = (1.0 - damping * wn + wn2) / denom;
        let coeffs = match response {
            Response::Lowpass => BiquadCoeffs {
                b0: wn2 / denom,
                b1: 2.0 * wn2 / denom,
                b2: wn2 / denom,
                a1,
                a2,
            },
            Response::Highpass => BiquadCoeffs {
                b0: 1.0 / denom,
                b1: -2.0 / denom,
                b2: 1.0 / denom,
                a1,
                a2,
            },
        };
        sections.push(coeffs);
    }

    if order % 2 == 1 {
        let a1 = (wn - 1.0) / (wn + 1.0);
        let coeffs = match response {
            Response::Lowpass => BiquadCoeffs {
                b0: wn / (1.0 + wn),
                b1: wn / (1.0 + wn),
                b2: 0.0,
                a1,
                a2: 0.0,
            },
            Response::Highpass => BiquadCoeffs {
                b0: 1.0 / (1.0 + wn),
                b1: -1.0 / (1.0 + wn),
                b2: 0.0,
                a1,
                a2: 0.0,
            },
        };
        sections.push(coeffs);
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        let lp = SosFilter::lowpass(30.0, 250.0, 4);
        assert_eq!(lp.section_count(), 2);
        let gain: f64 = lp.coefficients().iter().map(|c| c.dc_gain()).product();
        assert!((gain - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let hp = SosFilter::highpass(1.0, 250.0, 4);
        for c in hp.coefficients() {
            assert!(c.dc_gain().abs() < 1e-12);
        }
    }

    #[test]
    fn test_odd_order_adds_first_order_section() {
        let lp = SosFilter::lowpass(10.0, 250.0, 3);
        let sections = lp.coefficients();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].a2, 0.0);
    }

    #[test]
    fn test_sections_are_stable() {
        let bp = SosFilter::bandpass(1.0, 4.0, 250.0, 4);
        for c in bp.coefficients() {
            // Stability triangle of a second-order denominator
            assert!(c.a2.abs() < 1.0);
            assert!(c.a1.abs() < 1.0 + c.a2);
        }
    }

    #[test]
    fn test_bandpass_passes_center_rejects_far() {
        let fs = 250.0;
        let bp = SosFilter::bandpass(12.0, 30.0, fs, 4);
        let pass = bp.filtfilt(&sine(20.0, fs, 2000));
        let stop = bp.filtfilt(&sine(2.0, fs, 2000));
        let mid = 500..1500;
        assert!((rms(&pass[mid.clone()]) / rms(&sine(20.0, fs, 2000)[mid.clone()]) - 0.95).abs() < 0.07);
        assert!(rms(&stop[mid]) < 0.01);
    }

    #[test]
    fn test_filtfilt_constant_input_has_no_transient() {
        let lp = SosFilter::lowpass(10.0, 250.0, 4);
        let out = lp.filtfilt(&vec![3.0; 200]);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_filtfilt_is_zero_phase() {
        let fs = 250.0;
        let x = sine(20.0, fs, 2000);
        let y = SosFilter::bandpass(12.0, 30.0, fs, 4).filtfilt(&x);
        // A phase shift would move the zero crossings; a zero-phase output stays aligned.
        let dot: f64 = x[500..1500].iter().zip(&y[500..1500]).map(|(a, b)| a * b).sum();
        let norm = (rms(&x[500..1500]) * rms(&y[500..1500])) * 1000.0;
        assert!(dot / norm > 0.999);
    }

    #[test]
    fn test_short_input_falls_back_to_single_pass() {
        let bp = SosFilter::bandpass(8.0, 12.0, 250.0, 4);
        assert_eq!(bp.pad_len(), 27);
        let x = sine(10.0, 250.0, 27);
        assert_eq!(bp.filtfilt(&x), bp.filter(&x));
    }

    #[test]
    fn test_empty_input() {
        assert!(SosFilter::lowpass(10.0, 250.0, 4).filtfilt(&[]).is_empty());
    }
}
