//! # Pendulum EEG: acquisition engine for a 4-channel EEG board
//!
//! Reads the COBS-framed binary stream the Pendulum board sends over USB
//! serial (or a synthetic stand-in), keeps a bounded rolling history with
//! band-power metrics, and exposes thread-safe snapshots and exports to
//! whatever front-end sits on top.
//!
//! ## Architecture
//!
//! - **Protocol**: COBS framing, CRC-16/CCITT-FALSE and fixed-layout packets
//! - **Backend**: one worker thread per session feeding shared session state
//! - **Analysis**: PSD estimation, band integration and band-filtered views
//! - **Export**: CSV, NPZ and EDF writers over the session archive
//!
//! ## Configuration
//!
//! [`EngineConfig`] is fixed at construction and can be loaded from TOML.
//! Exports default to the platform data directory under `dev.pendulum.eeg`:
//!
//! - **Linux**: `~/.local/share/dev.pendulum.eeg/exports/`
//! - **macOS**: `~/Library/Application Support/dev.pendulum.eeg/exports/`
//! - **Windows**: `%APPDATA%\dev.pendulum.eeg\exports\`
//!
//! ## Example
//!
//! ```no_run
//! use pendulum_eeg::{AcquisitionEngine, EngineConfig};
//!
//! let engine = AcquisitionEngine::new(EngineConfig::default()).unwrap();
//! engine.start(None, None, true, true, true);
//! std::thread::sleep(std::time::Duration::from_secs(3));
//!
//! let snapshot = engine.get_snapshot(1_500, 60);
//! println!("alpha power: {:.2}", snapshot.latest_metrics.alpha);
//!
//! engine.stop();
//! engine.export_npz(None).unwrap();
//! ```

pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod export;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use analysis::{compute_band_metrics, Band, BandMetrics, PsdMethod, SignalView};
pub use backend::{AcquisitionEngine, Snapshot, SyntheticSource};
pub use config::EngineConfig;
pub use error::{EegError, Result};
pub use protocol::{decode_frame, encode_frame, DecodedPacket, SamplePacket};
pub use types::{EngineState, EventLine, LogLevel, SampleRecord};
