//! Session state owned by the acquisition engine
//!
//! Everything a session accumulates lives in [`SessionState`], guarded by a
//! single mutex in the engine. Methods here are the minimal critical
//! sections: append a record, bump a counter, replace the metrics. They never
//! perform I/O.

use crate::analysis::BandMetrics;
use crate::config::EngineConfig;
use crate::protocol::{error_code_name, event_code_name, DecodedPacket};
use crate::types::{
    ChannelFrame, Counters, EngineState, EventLine, LogLevel, RingBuffer, SampleRecord,
};

/// Current wall-clock time as fractional Unix seconds
pub fn unix_time_s() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) * 1e-6
}

/// Mutable state of one acquisition session
#[derive(Debug)]
pub struct SessionState {
    /// Bumped on every start and stop; workers from older sessions are ignored
    pub generation: u64,
    pub running: bool,
    pub connected: bool,
    pub simulate: bool,
    pub port_name: String,
    pub baud: u32,
    pub state: EngineState,
    pub status_message: String,
    pub history: RingBuffer<SampleRecord>,
    /// Every record of the session, for export
    pub archive: Vec<SampleRecord>,
    pub events: RingBuffer<EventLine>,
    pub parse_errors: RingBuffer<String>,
    pub latest_sample: Option<SampleRecord>,
    pub latest_metrics: BandMetrics,
    pub counters: Counters,
    vref_uv: u32,
    gain: u32,
}

impl SessionState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            generation: 0,
            running: false,
            connected: false,
            simulate: false,
            port_name: String::new(),
            baud: config.baud,
            state: EngineState::Idle,
            status_message: "Idle".to_string(),
            history: RingBuffer::new(config.history_capacity()),
            archive: Vec::new(),
            events: RingBuffer::new(config.event_log_capacity),
            parse_errors: RingBuffer::new(config.parse_error_capacity),
            latest_sample: None,
            latest_metrics: BandMetrics::default(),
            counters: Counters::default(),
            vref_uv: config.vref_uv,
            gain: config.gain,
        }
    }

    /// Clear data, logs, metrics and counters. Lifecycle fields are kept.
    pub fn reset_data(&mut self) {
        self.history.clear();
        self.archive.clear();
        self.events.clear();
        self.parse_errors.clear();
        self.latest_sample = None;
        self.latest_metrics = BandMetrics::default();
        self.counters = Counters::default();
    }

    /// Append a line to the event log
    pub fn push_event(&mut self, level: LogLevel, message: impl Into<String>) {
        self.events.push(EventLine {
            time_s: unix_time_s(),
            level,
            message: message.into(),
        });
    }

    /// Record a parse error, mirrored into the event log as a warning
    pub fn push_parse_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.parse_errors.push(message.clone());
        self.push_event(LogLevel::Warn, message);
    }

    /// Accept one sample record into history and archive
    pub fn push_sample(&mut self, record: SampleRecord) {
        self.history.push(record);
        self.archive.push(record);
        self.latest_sample = Some(record);
        self.counters.samples_total += 1;
    }

    /// Route a decoded packet into history or the event log
    pub fn dispatch(&mut self, packet: &DecodedPacket, host_timestamp_s: f64) {
        self.counters.packets_total += 1;
        match packet {
            DecodedPacket::Sample(sample) => {
                let record =
                    SampleRecord::from_packet(sample, self.vref_uv, self.gain, host_timestamp_s);
                self.push_sample(record);
            }
            DecodedPacket::Event(event) => {
                self.counters.events_total += 1;
                let line = format!(
                    "{} code=0x{:02X} a={} b={} c={}",
                    event_code_name(event.event_code),
                    event.event_code,
                    event.a,
                    event.b,
                    event.c
                );
                tracing::debug!("{}", line);
                self.push_event(LogLevel::Info, line);
            }
            DecodedPacket::Error(error) => {
                self.counters.errors_total += 1;
                let line = format!(
                    "{} code=0x{:02X} a={} b={}",
                    error_code_name(error.error_code),
                    error.error_code,
                    error.a,
                    error.b
                );
                tracing::warn!("Firmware reported {}", line);
                self.push_event(LogLevel::Error, line);
            }
        }
    }

    /// Microvolt matrix of the trailing `samples` history records
    pub fn metrics_window(&self, samples: usize) -> Vec<ChannelFrame> {
        self.history.tail(samples).map(SampleRecord::channels_uv).collect()
    }

    /// Mark the session finished with a terminal status
    pub fn finish(&mut self, state: EngineState, status_message: impl Into<String>) {
        self.running = false;
        self.connected = false;
        self.state = state;
        self.status_message = status_message.into();
    }
}
