//! Acquisition worker loops
//!
//! Exactly one worker thread runs per active session. It either reads the
//! serial link and reassembles frames, or paces a [`SyntheticSource`]. Both
//! paths dispatch packets identically and refresh the band metrics on a
//! fixed wall-clock cadence.
//!
//! # Locking
//!
//! The session lock and the link lock are never held together. Serial I/O
//! happens only under the link lock; spectral computation happens under
//! neither.
//!
//! # Cancellation
//!
//! The loop checks its cancel flag once per iteration, so it notices a stop
//! within one read timeout (or one sample period in simulation).

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::reassembly::{FrameAssembler, StreamItem};
use super::session::{unix_time_s, SessionState};
use super::simulator::SyntheticSource;
use super::transport::{command_bytes, LinkOpener, SerialLink};
use crate::analysis::{compute_band_metrics, BandMetrics, PsdEstimator};
use crate::config::EngineConfig;
use crate::error::{EegError, Result};
use crate::protocol::DecodedPacket;
use crate::types::{EngineState, LogLevel};

/// Bytes requested per serial read
pub const READ_CHUNK_SIZE: usize = 4096;

/// Idle sleep when a read returns no data
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Settling time after switching the board to binary mode
const FIRMWARE_SETTLE: Duration = Duration::from_millis(200);

/// Open link tagged with the session that opened it
pub(crate) struct LinkSlot {
    pub generation: u64,
    pub link: Box<dyn SerialLink>,
}

/// State shared between the engine handle and its worker
pub(crate) struct Shared {
    pub config: EngineConfig,
    pub estimator: Box<dyn PsdEstimator>,
    pub session: Mutex<SessionState>,
    pub link: Mutex<Option<LinkSlot>>,
}

impl Shared {
    pub fn new(config: EngineConfig) -> Self {
        let estimator = config.psd_method.build(config.welch_segment_len);
        let session = Mutex::new(SessionState::new(&config));
        Self {
            config,
            estimator,
            session,
            link: Mutex::new(None),
        }
    }

    /// Apply `f` to the session if `generation` is still current
    pub fn update<R>(&self, generation: u64, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let mut session = self.session.lock();
        if session.generation != generation {
            return None;
        }
        Some(f(&mut session))
    }

    /// Run `f` on the link opened by `generation`, `None` if it is gone
    pub fn with_link<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut dyn SerialLink) -> Result<R>,
    ) -> Option<Result<R>> {
        let mut slot = self.link.lock();
        match slot.as_mut() {
            Some(s) if s.generation == generation => Some(f(s.link.as_mut())),
            _ => None,
        }
    }

    /// Drop the link if it still belongs to `generation`
    pub fn close_link(&self, generation: Option<u64>) {
        let mut slot = self.link.lock();
        let owned = match (slot.as_ref(), generation) {
            (Some(_), None) => true,
            (Some(s), Some(g)) => s.generation == g,
            (None, _) => false,
        };
        if owned {
            *slot = None;
            tracing::debug!("Serial link closed");
        }
    }

    /// Recompute metrics over the trailing window and replace the cached result
    pub fn refresh_metrics(&self, generation: u64) {
        let window_len = self.config.metrics_window_samples();
        if window_len == 0 {
            return;
        }
        let Some(window) = self.update(generation, |s| s.metrics_window(window_len)) else {
            return;
        };

        let metrics = if window.is_empty() {
            BandMetrics::default()
        } else {
            compute_band_metrics(
                &window,
                f64::from(self.config.sample_rate_hz),
                self.estimator.as_ref(),
            )
        };
        tracing::trace!(
            "Metrics refreshed over {} samples: focus={:.1} relax={:.1}",
            window.len(),
            metrics.focus_score,
            metrics.relax_score
        );
        self.update(generation, |s| s.latest_metrics = metrics);
    }
}

/// Fixed-cadence trigger for the metrics refresh
struct MetricsTicker {
    period: Duration,
    next_at: Instant,
}

impl MetricsTicker {
    fn new(period: Duration) -> Self {
        Self {
            period,
            next_at: Instant::now() + period,
        }
    }

    fn due(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.next_at {
            self.next_at = now + self.period;
            true
        } else {
            false
        }
    }
}

/// What a worker needs to run one session
pub(crate) struct WorkerContext {
    pub shared: Arc<Shared>,
    pub cancel: Arc<AtomicBool>,
    pub generation: u64,
}

impl WorkerContext {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        self.shared.update(self.generation, f)
    }

    fn event(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.push_event(level, message));
    }

    fn parse_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.push_parse_error(message));
    }

    fn dispatch(&self, packet: &DecodedPacket) {
        let now = unix_time_s();
        self.update(|s| s.dispatch(packet, now));
    }

    /// End the session: close the link, then publish the terminal status
    pub fn finish(&self, state: EngineState, status_message: impl Into<String>) {
        let status_message = status_message.into();
        self.shared.close_link(Some(self.generation));
        self.update(|s| s.finish(state, status_message));
    }

    fn write_command(&self, command: &str) -> Result<()> {
        let bytes = command_bytes(command);
        self.shared
            .with_link(self.generation, |link| {
                link.write_all(&bytes)?;
                link.flush()
            })
            .unwrap_or_else(|| Err(EegError::Transport("Serial link is closed".into())))
    }
}

/// Synthetic-source worker
pub(crate) fn run_simulator(ctx: &WorkerContext, mut source: SyntheticSource) -> Result<()> {
    ctx.update(|s| {
        s.connected = true;
        s.state = EngineState::Streaming;
        s.status_message = "Simulation running.".to_string();
        s.push_event(LogLevel::Info, "Simulator started.");
    });
    tracing::info!("Simulator started");

    let period = ctx.shared.config.sample_period();
    let mut metrics = MetricsTicker::new(ctx.shared.config.metrics_period());
    let mut next_tick = Instant::now();

    while !ctx.cancelled() {
        ctx.dispatch(&DecodedPacket::Sample(source.next_packet()));

        if metrics.due() {
            ctx.shared.refresh_metrics(ctx.generation);
        }

        next_tick += period;
        let now = Instant::now();
        if next_tick > now {
            std::thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }

    tracing::info!("Simulator stopped");
    ctx.finish(EngineState::Stopped, "Simulation stopped.");
    Ok(())
}

/// Options for a serial session
pub(crate) struct SerialOptions {
    pub port: String,
    pub baud: u32,
    pub auto_start_stream: bool,
}

/// Serial-port worker
pub(crate) fn run_serial(
    ctx: &WorkerContext,
    opener: &dyn LinkOpener,
    options: SerialOptions,
) -> Result<()> {
    if options.port.is_empty() {
        tracing::warn!("Serial start requested without a port");
        ctx.finish(EngineState::Stopped, "Serial port was not provided.");
        return Ok(());
    }

    let link = match opener.open(&options.port, options.baud, ctx.shared.config.read_timeout()) {
        Ok(link) => link,
        Err(e) => {
            let message = format!("Failed to open serial port {}: {}", options.port, e);
            tracing::error!("{}", message);
            ctx.finish(EngineState::Error(message.clone()), message);
            return Ok(());
        }
    };

    *ctx.shared.link.lock() = Some(LinkSlot {
        generation: ctx.generation,
        link,
    });

    let status = format!("Connected to {} @ {}", options.port, options.baud);
    tracing::info!("{}", status);
    ctx.update(|s| {
        s.connected = true;
        s.state = EngineState::Streaming;
        s.status_message = status.clone();
        s.push_event(LogLevel::Info, status);
    });

    if let Err(e) = configure_firmware(ctx, options.auto_start_stream) {
        ctx.parse_error(format!("Failed to configure firmware: {}", e));
    }

    let mut assembler = FrameAssembler::new(ctx.shared.config.rx_buffer_limit);
    let mut metrics = MetricsTicker::new(ctx.shared.config.metrics_period());
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    while !ctx.cancelled() {
        let read = match ctx.shared.with_link(ctx.generation, |link| link.read_chunk(&mut buf)) {
            Some(read) => read,
            None => {
                tracing::debug!("Serial link closed under the worker");
                break;
            }
        };

        match read {
            Ok(0) => std::thread::sleep(IDLE_SLEEP),
            Ok(n) => {
                ctx.update(|s| s.counters.rx_bytes_total += n as u64);
                for item in assembler.push(&buf[..n]) {
                    handle_stream_item(ctx, item);
                }
            }
            Err(e) => {
                let message = format!("Serial loop interrupted: {}", e);
                tracing::error!("{}", message);
                ctx.parse_error(message.clone());
                ctx.finish(EngineState::Error(message.clone()), message);
                return Ok(());
            }
        }

        if metrics.due() {
            ctx.shared.refresh_metrics(ctx.generation);
        }
    }

    tracing::info!("Serial worker stopped");
    ctx.finish(EngineState::Stopped, "Stopped.");
    Ok(())
}

fn handle_stream_item(ctx: &WorkerContext, item: StreamItem) {
    match item {
        StreamItem::Packet(packet) => {
            tracing::trace!("Frame decoded: {:?}", packet);
            ctx.dispatch(&packet);
        }
        StreamItem::Text(line) => {
            tracing::debug!("FW: {}", line);
            ctx.event(LogLevel::Info, format!("FW: {}", line));
        }
        StreamItem::Invalid(e) => {
            ctx.parse_error(format!("Invalid frame: {}", e));
        }
        StreamItem::Overflow(bytes) => {
            tracing::debug!("Dropping {} undelimited bytes", bytes);
            ctx.parse_error("RX buffer without 0x00 delimiter. Clearing buffer.");
        }
    }
}

/// Put the board into binary mode and optionally start the stream
fn configure_firmware(ctx: &WorkerContext, auto_start_stream: bool) -> Result<()> {
    let closed = || EegError::Transport("Serial link is closed".into());

    ctx.shared
        .with_link(ctx.generation, |link| {
            link.clear_input()?;
            link.write_all(&command_bytes("STOP"))?;
            link.write_all(&command_bytes("MODE BIN"))?;
            link.flush()
        })
        .unwrap_or_else(|| Err(closed()))?;

    std::thread::sleep(FIRMWARE_SETTLE);

    ctx.shared
        .with_link(ctx.generation, |link| link.clear_input())
        .unwrap_or_else(|| Err(closed()))?;

    if auto_start_stream {
        ctx.write_command("START")?;
        ctx.event(LogLevel::Info, "CMD auto: START");
    }
    Ok(())
}
