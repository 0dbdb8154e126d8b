//! Acquisition backend
//!
//! This module owns the acquisition session: the serial transport, frame
//! reassembly, the synthetic source, the worker thread and the shared session
//! state that snapshots and exports read from.
//!
//! # Architecture
//!
//! One worker thread runs per active session and writes into a shared,
//! mutex-guarded [`session::SessionState`]. Collaborators never see the worker;
//! they hold an [`AcquisitionEngine`] and read through [`Snapshot`]s:
//!
//! - [`AcquisitionEngine`] - start/stop, commands, snapshots and exports
//! - [`FrameAssembler`] - splits the byte stream into frames and text lines
//! - [`SyntheticSource`] - 4-channel test signal in place of the board
//! - [`SerialLink`] / [`LinkOpener`] - transport seam over `serialport`
//!
//! # Example
//!
//! ```no_run
//! use pendulum_eeg::backend::AcquisitionEngine;
//! use pendulum_eeg::config::EngineConfig;
//!
//! let engine = AcquisitionEngine::new(EngineConfig::default()).unwrap();
//! engine.start(Some("/dev/ttyACM0"), None, false, true, true);
//!
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! let snapshot = engine.get_snapshot(1_500, 60);
//! println!("{} samples, focus {:.0}", snapshot.counters.samples_total, snapshot.latest_metrics.focus_score);
//!
//! engine.stop();
//! let csv = engine.export_csv(None).unwrap();
//! println!("wrote {}", csv.display());
//! ```

pub mod engine;
pub mod reassembly;
pub mod session;
pub mod simulator;
pub mod snapshot;
pub mod transport;
pub mod worker;

pub use engine::AcquisitionEngine;
pub use reassembly::{FrameAssembler, StreamItem};
pub use simulator::SyntheticSource;
pub use snapshot::{Snapshot, DEFAULT_EVENT_LIMIT, DEFAULT_MAX_POINTS};
pub use transport::{available_ports, LinkOpener, SerialLink, SystemSerialLink, SystemSerialOpener};
