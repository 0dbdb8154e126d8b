//! Synthetic EEG source
//!
//! Produces [`SamplePacket`]s shaped like the board's stream so the engine can
//! run without hardware. Each sample mixes one sinusoid per canonical band
//! under a slow amplitude drift, adds Gaussian noise, then derives four
//! correlated channels with independent per-channel jitter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::time::Instant;

use crate::protocol::{
    microvolts_to_counts, SampleFlags, SamplePacket, ADS_STATUS_HEADER_OK, GAIN_DEFAULT,
    PROTO_VER, VREF_UV_DEFAULT,
};

/// Default peak amplitude of the composite waveform (uV)
pub const DEFAULT_AMPLITUDE_UV: f64 = 35.0;

/// One band component: frequency (Hz), phase (rad), mix weight
const COMPONENTS: [(f64, f64, f64); 5] = [
    (10.0, 0.0, 0.35), // alpha
    (19.0, 0.5, 0.45), // beta
    (6.0, 1.2, 0.20),  // theta
    (2.0, 2.4, 0.12),  // delta
    (35.0, 0.7, 0.06), // gamma
];

/// Shared noise std-dev, relative to amplitude
const BASE_NOISE_SIGMA: f64 = 0.15;

/// Per-channel (scale, jitter std-dev in uV)
const CHANNEL_SHAPE: [(f64, f64); 4] = [(1.0, 2.0), (0.95, 2.0), (1.05, 2.2), (1.02, 1.8)];

const DRIFT_DEPTH: f64 = 0.2;
const DRIFT_HZ: f64 = 0.03;

/// Generator of synthetic sample packets
pub struct SyntheticSource {
    sample_rate_hz: u32,
    amplitude_uv: f64,
    vref_uv: u32,
    gain: u32,
    sample_index: u32,
    started: Instant,
    rng: StdRng,
}

impl SyntheticSource {
    /// Create a source seeded from the OS
    pub fn new(sample_rate_hz: u32) -> Self {
        Self::with_rng(sample_rate_hz, StdRng::from_entropy())
    }

    /// Create a deterministic source
    pub fn seeded(sample_rate_hz: u32, seed: u64) -> Self {
        Self::with_rng(sample_rate_hz, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate_hz: u32, rng: StdRng) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz.max(1),
            amplitude_uv: DEFAULT_AMPLITUDE_UV,
            vref_uv: VREF_UV_DEFAULT,
            gain: GAIN_DEFAULT,
            sample_index: 0,
            started: Instant::now(),
            rng,
        }
    }

    /// Set the composite amplitude
    pub fn with_amplitude(mut self, amplitude_uv: f64) -> Self {
        self.amplitude_uv = amplitude_uv;
        self
    }

    /// Set the ADC scaling used to encode microvolts as counts
    pub fn with_scaling(mut self, vref_uv: u32, gain: u32) -> Self {
        self.vref_uv = vref_uv;
        self.gain = gain;
        self
    }

    /// Index of the next packet
    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    /// Standard normal draw via Box-Muller
    fn gauss(&mut self, sigma: f64) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Composite microvolt value shared by all channels at time `t`
    fn base_uv(&mut self, t: f64) -> f64 {
        let drift = 1.0 + DRIFT_DEPTH * (2.0 * PI * DRIFT_HZ * t).sin();
        let mix: f64 = COMPONENTS
            .iter()
            .map(|(freq, phase, weight)| weight * (2.0 * PI * freq * t + phase).sin())
            .sum();
        let noise = self.gauss(BASE_NOISE_SIGMA);
        self.amplitude_uv * drift * (mix + noise)
    }

    /// Produce the next packet and advance the sample index
    pub fn next_packet(&mut self) -> SamplePacket {
        let t = f64::from(self.sample_index) / f64::from(self.sample_rate_hz);
        let base = self.base_uv(t);

        let mut counts = [0i32; 4];
        for (slot, (scale, sigma)) in counts.iter_mut().zip(CHANNEL_SHAPE) {
            let uv = base * scale + self.gauss(sigma);
            *slot = microvolts_to_counts(uv, self.vref_uv, self.gain);
        }

        let t_us = self.started.elapsed().as_micros() as u32;
        let packet = SamplePacket {
            version: PROTO_VER,
            sample_index: self.sample_index,
            t_us,
            status24: ADS_STATUS_HEADER_OK,
            ch1: counts[0],
            ch2: counts[1],
            ch3: counts[2],
            ch4: counts[3],
            flags: SampleFlags::STREAMING,
            missed_drdy_frame: 0,
            recoveries_total: 0,
        };
        self.sample_index = self.sample_index.wrapping_add(1);
        packet
    }
}

impl Iterator for SyntheticSource {
    type Item = SamplePacket;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_packet())
    }
}
