//! Acquisition engine handle
//!
//! [`AcquisitionEngine`] is the only type collaborators hold. It owns the
//! shared session state, spawns at most one worker thread at a time, and
//! exposes the snapshot, command and export surface. Every method is safe to
//! call from any thread.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──start──▶ Initializing ──▶ Streaming ──stop──▶ Stopped
//!                      │               │
//!                      └──── fault ────┴──▶ Error(message)
//! ```
//!
//! `start()` while running and `stop()` while not running are no-ops.

use chrono::Local;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::simulator::SyntheticSource;
use super::snapshot::{Snapshot, SnapshotParts};
use super::transport::{command_bytes, LinkOpener, SystemSerialOpener};
use super::worker::{run_serial, run_simulator, SerialOptions, Shared, WorkerContext};
use crate::config::EngineConfig;
use crate::error::{EegError, Result};
use crate::export::{
    default_export_path, ensure_parent_dir, export_samples, CsvWriter, EdfWriter, ExportFormat,
    NpzWriter, SampleWriter,
};
use crate::types::{EngineState, LogLevel, SampleRecord};

/// Name of the acquisition worker thread
pub const WORKER_THREAD_NAME: &str = "pendulum-eeg-worker";

/// Plot points included in a JSON snapshot export
pub const JSON_SNAPSHOT_MAX_POINTS: usize = 3_000;

/// Event lines included in a JSON snapshot export
pub const JSON_SNAPSHOT_EVENT_LIMIT: usize = 300;

/// Running worker thread
struct WorkerHandle {
    thread: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    /// Disconnects when the worker thread exits
    done: Receiver<()>,
}

/// Which worker loop a session runs
enum Job {
    Simulate(SyntheticSource),
    Serial(SerialOptions),
}

/// Thread-safe handle to the acquisition engine
pub struct AcquisitionEngine {
    shared: Arc<Shared>,
    opener: Arc<dyn LinkOpener>,
    /// Serializes `start()` and `stop()`
    worker: Mutex<Option<WorkerHandle>>,
}

impl AcquisitionEngine {
    /// Create an engine that opens OS serial ports
    ///
    /// Fails with [`EegError::Config`] if `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_opener(config, Arc::new(SystemSerialOpener))
    }

    /// Create an engine with a custom transport
    pub fn with_opener(config: EngineConfig, opener: Arc<dyn LinkOpener>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Acquisition engine created: {} Hz, PSD method {:?}",
            config.sample_rate_hz,
            config.psd_method
        );
        Ok(Self {
            shared: Arc::new(Shared::new(config)),
            opener,
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Start a session
    ///
    /// `port` is required unless `simulate` is set; `baud` defaults to the
    /// configured rate. Returns `true` if a worker is running afterwards,
    /// including when one already was. Connection failures are reported
    /// through the session state, not the return value.
    pub fn start(
        &self,
        port: Option<&str>,
        baud: Option<u32>,
        simulate: bool,
        auto_start_stream: bool,
        reset_data: bool,
    ) -> bool {
        let mut worker = self.worker.lock();

        let port = port.map(str::trim).unwrap_or_default().to_string();
        let baud = baud.unwrap_or(self.shared.config.baud);
        let generation = {
            let mut session = self.shared.session.lock();
            if session.running {
                tracing::debug!("start() ignored: session already running");
                return true;
            }
            if reset_data {
                session.reset_data();
            }
            session.generation += 1;
            session.running = true;
            session.connected = false;
            session.simulate = simulate;
            session.port_name = port.clone();
            session.baud = baud;
            session.state = EngineState::Initializing;
            session.status_message = "Initializing...".to_string();
            session.generation
        };

        if let Some(previous) = worker.take() {
            if let Err(e) = self.reap(previous) {
                tracing::warn!("{}", e);
            }
        }

        let job = if simulate {
            let source = SyntheticSource::new(self.shared.config.sample_rate_hz)
                .with_scaling(self.shared.config.vref_uv, self.shared.config.gain);
            Job::Simulate(source)
        } else {
            Job::Serial(SerialOptions {
                port: port.clone(),
                baud,
                auto_start_stream,
            })
        };

        tracing::info!(
            "Starting session {} ({})",
            generation,
            if simulate { "simulated".to_string() } else { format!("{} @ {}", port, baud) }
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = bounded::<()>(1);
        let ctx = WorkerContext {
            shared: self.shared.clone(),
            cancel: cancel.clone(),
            generation,
        };
        let opener = self.opener.clone();

        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _done = done_tx;
                run_worker(&ctx, opener.as_ref(), job);
            });

        match spawned {
            Ok(thread) => {
                *worker = Some(WorkerHandle {
                    thread,
                    cancel,
                    done,
                });
                true
            }
            Err(e) => {
                let message = format!("Failed to spawn acquisition worker: {}", e);
                tracing::error!("{}", message);
                self.shared.update(generation, |s| {
                    s.finish(EngineState::Error(message.clone()), message)
                });
                false
            }
        }
    }

    /// Stop the running session
    ///
    /// Waits up to the configured stop timeout for the worker, then closes
    /// the link whether or not the worker has exited.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let handle = worker.take();

        if !self.shared.session.lock().running {
            if let Some(Err(e)) = handle.map(|h| self.reap(h)) {
                tracing::warn!("{}", e);
            }
            return;
        }

        tracing::info!("Stopping acquisition");
        let reaped = match handle {
            Some(handle) => {
                handle.cancel.store(true, Ordering::SeqCst);
                self.reap(handle)
            }
            None => Ok(()),
        };

        self.shared.close_link(None);
        let mut session = self.shared.session.lock();
        if let Err(e) = reaped {
            tracing::warn!("{}", e);
            session.push_event(LogLevel::Warn, e.to_string());
        }
        session.finish(EngineState::Stopped, "Stopped.");
        session.generation += 1;
    }

    /// Wait for a worker to exit
    ///
    /// After the stop timeout the thread is detached and
    /// [`EegError::Timeout`] is returned.
    fn reap(&self, handle: WorkerHandle) -> Result<()> {
        let timeout = self.shared.config.stop_timeout();
        match handle.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.thread.join().is_err() {
                    tracing::error!("Acquisition worker panicked during shutdown");
                }
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(EegError::Timeout(format!(
                "acquisition worker did not exit within {} ms; detached",
                timeout.as_millis()
            ))),
        }
    }

    /// Write an operator command to the open link
    pub fn send_command(&self, text: &str) -> bool {
        let command = text.trim();
        if command.is_empty() {
            return false;
        }

        let bytes = command_bytes(command);
        let written = {
            let mut slot = self.shared.link.lock();
            slot.as_mut().map(|s| {
                s.link.write_all(&bytes)?;
                s.link.flush()
            })
        };

        let mut session = self.shared.session.lock();
        match written {
            None => {
                session.push_event(
                    LogLevel::Warn,
                    format!("CMD ignored (no serial): {}", command),
                );
                false
            }
            Some(Ok(())) => {
                tracing::debug!("Command sent: {}", command);
                session.push_event(LogLevel::Info, format!("CMD -> {}", command));
                true
            }
            Some(Err(e)) => {
                session.push_parse_error(format!("Failed to send command '{}': {}", command, e));
                false
            }
        }
    }

    /// Consistent copy of the engine state
    pub fn get_snapshot(&self, max_points: usize, event_limit: usize) -> Snapshot {
        let parts = {
            let session = self.shared.session.lock();
            SnapshotParts::capture(
                &session,
                self.shared.config.sample_rate_hz,
                max_points,
                event_limit,
            )
        };
        parts.render()
    }

    pub fn running(&self) -> bool {
        self.shared.session.lock().running
    }

    pub fn connected(&self) -> bool {
        self.shared.session.lock().connected
    }

    pub fn status_message(&self) -> String {
        self.shared.session.lock().status_message.clone()
    }

    pub fn state(&self) -> EngineState {
        self.shared.session.lock().state.clone()
    }

    /// Number of records in the export archive
    pub fn archive_len(&self) -> usize {
        self.shared.session.lock().archive.len()
    }

    /// Clear history, archive, logs, metrics and counters
    pub fn reset_session(&self) {
        self.shared.session.lock().reset_data();
        tracing::debug!("Session data cleared");
    }

    fn archive_copy(&self) -> Vec<SampleRecord> {
        self.shared.session.lock().archive.clone()
    }

    fn export_with(&self, writer: &dyn SampleWriter, path: Option<&Path>) -> Result<PathBuf> {
        let records = self.archive_copy();
        export_samples(
            writer,
            &records,
            self.shared.config.sample_rate_hz,
            path,
            &self.shared.config.resolved_export_dir(),
        )
    }

    /// Export the archive as CSV
    pub fn export_csv(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.export_with(&CsvWriter, path)
    }

    /// Export the archive as NumPy arrays
    pub fn export_npz(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.export_with(&NpzWriter, path)
    }

    /// Export the archive as an EDF recording
    pub fn export_edf(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.export_with(&EdfWriter, path)
    }

    /// Export a pretty-printed snapshot
    pub fn export_json_snapshot(&self, path: Option<&Path>) -> Result<PathBuf> {
        if self.shared.session.lock().archive.is_empty() {
            return Err(EegError::NoData);
        }
        let snapshot = self.get_snapshot(JSON_SNAPSHOT_MAX_POINTS, JSON_SNAPSHOT_EVENT_LIMIT);
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_export_path(
                &self.shared.config.resolved_export_dir(),
                ExportFormat::Json,
                Local::now(),
            ),
        };
        ensure_parent_dir(&path)?;
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        tracing::info!("Exported snapshot to {}", path.display());
        Ok(path)
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker thread body. Any error or panic ends the session in `Error`.
fn run_worker(ctx: &WorkerContext, opener: &dyn LinkOpener, job: Job) {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| match job {
        Job::Simulate(source) => run_simulator(ctx, source),
        Job::Serial(options) => run_serial(ctx, opener, options),
    }));

    let failure = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => EegError::WorkerFailure(e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            EegError::WorkerFailure(message)
        }
    };

    let message = failure.to_string();
    tracing::error!("{}", message);
    ctx.finish(EngineState::Error(message.clone()), message);
}
