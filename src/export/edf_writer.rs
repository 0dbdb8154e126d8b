//! EDF sample export
//!
//! Writes the four microvolt channels as a European Data Format recording:
//! 16-bit samples, one-second data records, labels `EEG1..EEG4`. Each
//! channel's physical range is taken from its data with a 10% margin; the
//! final partial record is zero-padded.

use chrono::{DateTime, Local, TimeZone};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{ExportFormat, SampleWriter};
use crate::error::{EegError, Result};
use crate::types::{SampleRecord, CHANNEL_COUNT};

const DIGITAL_MIN: i32 = i16::MIN as i32;
const DIGITAL_MAX: i32 = i16::MAX as i32;
const FIXED_HEADER_BYTES: usize = 256;
const SIGNAL_HEADER_BYTES: usize = 256;
const RECORD_DURATION_S: u32 = 1;
const RANGE_MARGIN: f64 = 0.1;

/// Physical to digital mapping of one signal
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scaling {
    physical_min: f64,
    physical_max: f64,
}

impl Scaling {
    /// Range covering `values` with a margin, rounded to what the header can hold
    fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let (lo, hi) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let (lo, hi) = if lo > hi { (0.0, 0.0) } else { (lo, hi) };
        let margin = (hi - lo) * RANGE_MARGIN;
        let (mut lo, mut hi) = (lo - margin, hi + margin);
        if hi - lo < f64::EPSILON {
            lo -= 1.0;
            hi += 1.0;
        }

        // The header stores 8 characters; use the stored values for conversion
        let physical_min = parse_field(&format_number(lo)).unwrap_or(lo);
        let physical_max = parse_field(&format_number(hi)).unwrap_or(hi);
        Self {
            physical_min,
            physical_max,
        }
    }

    fn gain(&self) -> f64 {
        (self.physical_max - self.physical_min) / f64::from(DIGITAL_MAX - DIGITAL_MIN)
    }

    fn to_digital(&self, value: f64) -> i16 {
        let gain = self.gain();
        let offset = self.physical_max - gain * f64::from(DIGITAL_MAX);
        let digital = ((value - offset) / gain).round();
        digital.clamp(f64::from(DIGITAL_MIN), f64::from(DIGITAL_MAX)) as i16
    }

    #[cfg(test)]
    fn to_physical(&self, digital: i16) -> f64 {
        let gain = self.gain();
        let offset = self.physical_max - gain * f64::from(DIGITAL_MAX);
        f64::from(digital) * gain + offset
    }
}

/// Render `value` in at most 8 characters
fn format_number(value: f64) -> String {
    for precision in (0..=6).rev() {
        let s = format!("{:.*}", precision, value);
        if s.len() <= 8 {
            return s;
        }
    }
    let clamped = value.clamp(-9_999_999.0, 99_999_999.0);
    format!("{:.0}", clamped)
}

fn parse_field(field: &str) -> Option<f64> {
    field.trim().parse().ok()
}

/// Append `s` padded with spaces or truncated to exactly `size` bytes
fn put_fixed(out: &mut Vec<u8>, s: &str, size: usize) {
    let bytes: Vec<u8> = s.bytes().filter(u8::is_ascii).take(size).collect();
    out.extend_from_slice(&bytes);
    out.extend(std::iter::repeat(b' ').take(size - bytes.len()));
}

fn channel_value(record: &SampleRecord, channel: usize) -> f64 {
    record.channels_uv()[channel]
}

/// Start time of the recording, from the first record's host timestamp
fn start_time(records: &[SampleRecord]) -> DateTime<Local> {
    records
        .first()
        .and_then(|r| {
            let secs = r.host_timestamp_s.floor();
            let nanos = ((r.host_timestamp_s - secs) * 1e9) as u32;
            Local.timestamp_opt(secs as i64, nanos).single()
        })
        .unwrap_or_else(Local::now)
}

fn header_bytes(
    scalings: &[Scaling],
    samples_per_record: usize,
    record_count: usize,
    start: DateTime<Local>,
) -> Vec<u8> {
    let ns = scalings.len();
    let mut out = Vec::with_capacity(FIXED_HEADER_BYTES + SIGNAL_HEADER_BYTES * ns);

    put_fixed(&mut out, "0", 8);
    put_fixed(&mut out, "X X X X", 80);
    put_fixed(
        &mut out,
        &format!("Startdate {} X X Pendulum", start.format("%d-%b-%Y").to_string().to_uppercase()),
        80,
    );
    put_fixed(&mut out, &start.format("%d.%m.%y").to_string(), 8);
    put_fixed(&mut out, &start.format("%H.%M.%S").to_string(), 8);
    put_fixed(&mut out, &(FIXED_HEADER_BYTES + SIGNAL_HEADER_BYTES * ns).to_string(), 8);
    put_fixed(&mut out, "", 44);
    put_fixed(&mut out, &record_count.to_string(), 8);
    put_fixed(&mut out, &RECORD_DURATION_S.to_string(), 8);
    put_fixed(&mut out, &ns.to_string(), 4);

    for i in 0..ns {
        put_fixed(&mut out, &format!("EEG{}", i + 1), 16);
    }
    for _ in 0..ns {
        put_fixed(&mut out, "AgAgCl electrode", 80);
    }
    for _ in 0..ns {
        put_fixed(&mut out, "uV", 8);
    }
    for s in scalings {
        put_fixed(&mut out, &format_number(s.physical_min), 8);
    }
    for s in scalings {
        put_fixed(&mut out, &format_number(s.physical_max), 8);
    }
    for _ in 0..ns {
        put_fixed(&mut out, &DIGITAL_MIN.to_string(), 8);
    }
    for _ in 0..ns {
        put_fixed(&mut out, &DIGITAL_MAX.to_string(), 8);
    }
    for _ in 0..ns {
        put_fixed(&mut out, "", 80);
    }
    for _ in 0..ns {
        put_fixed(&mut out, &samples_per_record.to_string(), 8);
    }
    for _ in 0..ns {
        put_fixed(&mut out, "", 32);
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EdfWriter;

impl SampleWriter for EdfWriter {
    fn write(&self, records: &[SampleRecord], sample_rate_hz: u32, path: &Path) -> Result<()> {
        if sample_rate_hz == 0 {
            return Err(EegError::Config(
                "EDF export needs a positive sample rate".into(),
            ));
        }
        let samples_per_record = (sample_rate_hz * RECORD_DURATION_S) as usize;
        let record_count = records.len().div_ceil(samples_per_record);

        let scalings: Vec<Scaling> = (0..CHANNEL_COUNT)
            .map(|ch| Scaling::from_values(records.iter().map(|r| channel_value(r, ch))))
            .collect();

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&header_bytes(
            &scalings,
            samples_per_record,
            record_count,
            start_time(records),
        ))?;

        let mut block = Vec::with_capacity(samples_per_record * 2);
        for chunk in records.chunks(samples_per_record) {
            for (ch, scaling) in scalings.iter().enumerate() {
                block.clear();
                for i in 0..samples_per_record {
                    let digital = chunk
                        .get(i)
                        .map(|r| scaling.to_digital(channel_value(r, ch)))
                        .unwrap_or(0);
                    block.extend_from_slice(&digital.to_le_bytes());
                }
                writer.write_all(&block)?;
            }
        }
        writer.flush()?;
        tracing::debug!(
            "EDF written: {} records of {} samples x {} signals",
            record_count,
            samples_per_record,
            CHANNEL_COUNT
        );
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Edf
    }
}
