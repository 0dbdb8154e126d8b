//! Core data types for Pendulum EEG
//!
//! This module contains the session-level data structures shared by the
//! acquisition engine, the analysis stage and the exporters.
//!
//! # Main Types
//!
//! - [`SampleRecord`] - A decoded sample with microvolt values and host time
//! - [`RingBuffer`] - Fixed-capacity FIFO used for history and the logs
//! - [`EventLine`] - A timestamped, leveled line of the engine event log
//! - [`Counters`] - Monotonic session totals
//! - [`EngineState`] - Lifecycle of the acquisition engine
//!
//! # Memory Management
//!
//! History and logs are ring buffers: when full, the oldest entry is evicted
//! on every push. Only the export archive grows without bound, and it is
//! cleared on session reset.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::protocol::{counts_to_microvolts, SamplePacket};

/// Number of electrode channels on the board
pub const CHANNEL_COUNT: usize = 4;

/// One row of the microvolt matrix handed to the analyzer
pub type ChannelFrame = [f64; CHANNEL_COUNT];

/// A sample accepted into the session
///
/// Field order is the export column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_index: u32,
    pub t_us: u32,
    pub status24: u32,
    pub ch1: i32,
    pub ch2: i32,
    pub ch3: i32,
    pub ch4: i32,
    pub ch1_uv: f64,
    pub ch2_uv: f64,
    pub ch3_uv: f64,
    pub ch4_uv: f64,
    pub flags: u32,
    pub missed_drdy_frame: u32,
    pub recoveries_total: u32,
    /// Wall-clock capture time, seconds since the Unix epoch
    pub host_timestamp_s: f64,
}

impl SampleRecord {
    /// Column names, in export order
    pub const FIELD_NAMES: [&'static str; 15] = [
        "sample_index",
        "t_us",
        "status24",
        "ch1",
        "ch2",
        "ch3",
        "ch4",
        "ch1_uv",
        "ch2_uv",
        "ch3_uv",
        "ch4_uv",
        "flags",
        "missed_drdy_frame",
        "recoveries_total",
        "host_timestamp_s",
    ];

    /// Build a record from a decoded sample, converting counts to microvolts
    pub fn from_packet(packet: &SamplePacket, vref_uv: u32, gain: u32, host_timestamp_s: f64) -> Self {
        Self {
            sample_index: packet.sample_index,
            t_us: packet.t_us,
            status24: packet.status24,
            ch1: packet.ch1,
            ch2: packet.ch2,
            ch3: packet.ch3,
            ch4: packet.ch4,
            ch1_uv: counts_to_microvolts(packet.ch1, vref_uv, gain),
            ch2_uv: counts_to_microvolts(packet.ch2, vref_uv, gain),
            ch3_uv: counts_to_microvolts(packet.ch3, vref_uv, gain),
            ch4_uv: counts_to_microvolts(packet.ch4, vref_uv, gain),
            flags: packet.flags,
            missed_drdy_frame: packet.missed_drdy_frame,
            recoveries_total: packet.recoveries_total,
            host_timestamp_s,
        }
    }

    /// Microvolt values of the four channels
    pub fn channels_uv(&self) -> ChannelFrame {
        [self.ch1_uv, self.ch2_uv, self.ch3_uv, self.ch4_uv]
    }

    /// Raw ADC counts of the four channels
    pub fn channels_counts(&self) -> [i32; CHANNEL_COUNT] {
        [self.ch1, self.ch2, self.ch3, self.ch4]
    }
}

/// One x/y row of a plot series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotRow {
    /// Seconds since the first sample of the plotted window
    pub x: f64,
    pub ch1_uv: f64,
    pub ch2_uv: f64,
    pub ch3_uv: f64,
    pub ch4_uv: f64,
}

impl PlotRow {
    pub fn new(x: f64, values: &ChannelFrame) -> Self {
        Self {
            x,
            ch1_uv: values[0],
            ch2_uv: values[1],
            ch3_uv: values[2],
            ch4_uv: values[3],
        }
    }
}

/// Severity of an event log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// A line of the user-facing event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLine {
    /// Wall-clock time, seconds since the Unix epoch
    pub time_s: f64,
    pub level: LogLevel,
    pub message: String,
}

/// Session totals, reset only with the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    pub rx_bytes_total: u64,
    pub packets_total: u64,
    pub samples_total: u64,
    pub events_total: u64,
    pub errors_total: u64,
}

/// Lifecycle of the acquisition engine
///
/// `Idle`, `Stopped` and `Error` produce no data until `start()` is called.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Idle,
    Initializing,
    Streaming,
    Stopped,
    Error(String),
}

impl EngineState {
    /// Whether a worker is (or is about to be) producing data
    pub fn is_active(&self) -> bool {
        matches!(self, EngineState::Initializing | EngineState::Streaming)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            EngineState::Idle => "Idle",
            EngineState::Initializing => "Initializing",
            EngineState::Streaming => "Streaming",
            EngineState::Stopped => "Stopped",
            EngineState::Error(_) => "Error",
        }
    }
}

/// Fixed-capacity FIFO that evicts its oldest entry on overflow
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. Storage grows on demand up to `capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Append an item, evicting the oldest when full
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The most recent `n` items, oldest first
    pub fn tail(&self, n: usize) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        let start = self.items.len().saturating_sub(n);
        self.items.range(start..)
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the most recent `n` items, oldest first
    pub fn tail_vec(&self, n: usize) -> Vec<T> {
        self.tail(n).cloned().collect()
    }
}
