//! Integration tests for the serial acquisition path
//!
//! These tests run the real worker over an in-memory link:
//! - firmware configuration commands on connect
//! - frame decoding, firmware text lines and corrupt frames
//! - operator commands and transport failure

mod common;

use common::builders::{corrupt_sample_frame, error, event, SampleBuilder};
use common::mock_helpers::{MemoryHandle, MemoryOpener, MissingPortOpener};
use common::{assert_float_eq, wait_until};
use pendulum_eeg::config::EngineConfig;
use pendulum_eeg::protocol::encode_frame;
use pendulum_eeg::types::LogLevel;
use pendulum_eeg::{AcquisitionEngine, EngineState};
use serial_test::serial;
use std::sync::Arc;

const PORT: &str = "/dev/ttyACM0";

fn connected_engine(auto_start_stream: bool) -> (AcquisitionEngine, MemoryHandle) {
    let handle = MemoryHandle::new();
    let engine =
        AcquisitionEngine::with_opener(EngineConfig::default(), MemoryOpener::new(handle.clone()))
            .unwrap();
    assert!(engine.start(Some(PORT), None, false, auto_start_stream, true));
    // Both input clears happen before the stream is configured
    wait_until(&engine, "firmware configuration", |_| handle.clear_count() >= 2);
    (engine, handle)
}

fn samples_total(engine: &AcquisitionEngine) -> u64 {
    engine.get_snapshot(0, 0).counters.samples_total
}

#[test]
#[serial]
fn test_connect_configures_firmware() {
    let (engine, handle) = connected_engine(true);
    wait_until(&engine, "auto start", |_| handle.written_text().contains("START\n"));

    assert_eq!(handle.opened_with(), Some((PORT.to_string(), 921_600)));
    assert_eq!(handle.written_text(), "STOP\nMODE BIN\nSTART\n");

    let snapshot = engine.get_snapshot(0, 20);
    assert!(snapshot.connected);
    assert_eq!(snapshot.state, EngineState::Streaming);
    assert_eq!(snapshot.status_message, format!("Connected to {} @ 921600", PORT));
    assert!(snapshot.events.iter().any(|e| e.message == "CMD auto: START"));
    engine.stop();
}

#[test]
#[serial]
fn test_samples_decode_in_order() {
    let (engine, handle) = connected_engine(false);
    for i in 0..50 {
        handle.feed(SampleBuilder::new(i).channels([8_388_607, -8_388_607, 0, 1]).frame());
    }
    wait_until(&engine, "50 samples", |e| samples_total(e) == 50);

    let snapshot = engine.get_snapshot(50, 10);
    let latest = snapshot.latest_sample.unwrap();
    assert_eq!(latest.sample_index, 49);
    assert_float_eq(latest.ch1_uv, 187_500.0, 1e-6);
    assert_float_eq(latest.ch2_uv, -187_500.0, 1e-6);
    assert_eq!(snapshot.plot_points.len(), 50);
    assert_float_eq(snapshot.plot_points[49].x, 49.0 / 250.0, 1e-12);
    assert!(snapshot.counters.rx_bytes_total > 0);
    assert_eq!(engine.archive_len(), 50);
    engine.stop();
}

#[test]
#[serial]
fn test_corrupt_frame_is_logged_and_skipped() {
    let (engine, handle) = connected_engine(false);
    handle.feed(SampleBuilder::new(0).frame());
    wait_until(&engine, "first sample", |e| samples_total(e) == 1);

    handle.feed(corrupt_sample_frame(1));
    wait_until(&engine, "parse error", |e| e.get_snapshot(0, 0).parse_error_count == 1);
    let snapshot = engine.get_snapshot(0, 50);
    assert_eq!(snapshot.counters.samples_total, 1);
    assert!(snapshot.parse_errors[0].starts_with("Invalid frame: "));
    assert!(snapshot
        .events
        .iter()
        .any(|e| e.level == LogLevel::Warn && e.message.starts_with("Invalid frame: ")));

    handle.feed(SampleBuilder::new(2).frame());
    wait_until(&engine, "recovery", |e| samples_total(e) == 2);
    assert_eq!(engine.get_snapshot(0, 0).parse_error_count, 1);
    engine.stop();
}

#[test]
#[serial]
fn test_firmware_lines_events_and_errors() {
    let (engine, handle) = connected_engine(false);
    handle.feed(b"ADS1299 id=0x3E\n".to_vec());
    wait_until(&engine, "fw line", |e| {
        e.get_snapshot(0, 20).events.iter().any(|l| l.message == "FW: ADS1299 id=0x3E")
    });

    let mut frames = encode_frame(&event(0x30, 1, 2, 3));
    frames.extend(encode_frame(&error(0xE2, 9, 0)));
    handle.feed(frames);
    wait_until(&engine, "event and error", |e| e.get_snapshot(0, 0).counters.errors_total == 1);

    let snapshot = engine.get_snapshot(0, 50);
    assert_eq!(snapshot.counters.events_total, 1);
    assert_eq!(snapshot.counters.packets_total, 2);
    let selftest = snapshot
        .events
        .iter()
        .find(|l| l.message.starts_with("SELFTEST"))
        .unwrap();
    assert_eq!(selftest.message, "SELFTEST code=0x30 a=1 b=2 c=3");
    assert_eq!(selftest.level, LogLevel::Info);
    let failure = snapshot.events.last().unwrap();
    assert_eq!(failure.message, "FRAME_READ_FAIL code=0xE2 a=9 b=0");
    assert_eq!(failure.level, LogLevel::Error);
    engine.stop();
}

#[test]
#[serial]
fn test_operator_commands() {
    let (engine, handle) = connected_engine(false);
    assert!(engine.send_command("  IMPEDANCE ON  "));
    assert!(!engine.send_command(""));
    assert!(handle.written_text().ends_with("IMPEDANCE ON\n"));
    assert!(engine
        .get_snapshot(0, 20)
        .events
        .iter()
        .any(|l| l.message == "CMD -> IMPEDANCE ON"));

    engine.stop();
    assert!(!engine.send_command("START"));
    assert_eq!(
        engine.get_snapshot(0, 1).events[0].message,
        "CMD ignored (no serial): START"
    );
}

#[test]
#[serial]
fn test_unplug_ends_session_in_error() {
    let (engine, handle) = connected_engine(false);
    handle.feed(SampleBuilder::new(0).frame());
    handle.unplug_when_drained();
    wait_until(&engine, "worker exit", |e| !e.running());

    assert!(matches!(engine.state(), EngineState::Error(_)));
    assert_eq!(
        engine.status_message(),
        "Serial loop interrupted: Transport error: device disconnected"
    );
    assert_eq!(engine.archive_len(), 1);
    assert!(!engine.send_command("START"));
}

#[test]
#[serial]
fn test_missing_port_and_unknown_device() {
    let engine =
        AcquisitionEngine::with_opener(EngineConfig::default(), Arc::new(MissingPortOpener)).unwrap();

    assert!(engine.start(None, None, false, true, true));
    wait_until(&engine, "no port", |e| !e.running());
    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(engine.status_message(), "Serial port was not provided.");

    assert!(engine.start(Some("/dev/ttyUSB3"), Some(115_200), false, true, true));
    wait_until(&engine, "open failure", |e| !e.running());
    assert!(matches!(engine.state(), EngineState::Error(_)));
    assert!(engine
        .status_message()
        .starts_with("Failed to open serial port /dev/ttyUSB3:"));
}
