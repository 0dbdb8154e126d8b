//! NPZ sample export
//!
//! An `.npz` file is a zip of NumPy `.npy` arrays. Every record field becomes
//! one 1-D array named after the field (`<i8` for integer fields, `<f8` for
//! the microvolt and timestamp fields), plus a one-element `<i8` `sample_rate_hz`
//! array.
//! Arrays are written in `.npy` format 1.0 and deflate-compressed.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{ExportFormat, SampleWriter};
use crate::error::Result;
use crate::types::SampleRecord;

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const NPY_VERSION: [u8; 2] = [1, 0];
/// Magic, version and header length precede the header dict
const NPY_PREAMBLE_LEN: usize = NPY_MAGIC.len() + 2 + 2;
const NPY_ALIGN: usize = 64;

/// Element data of one `.npy` array
enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Column {
    fn descr(&self) -> &'static str {
        match self {
            Column::Int(_) => "<i8",
            Column::Float(_) => "<f8",
        }
    }

    fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    fn write_data(&self, out: &mut Vec<u8>) {
        match self {
            Column::Int(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
            Column::Float(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_le_bytes())),
        }
    }
}

/// Serialize one 1-D array in `.npy` 1.0 format
fn npy_bytes(column: &Column) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({},), }}",
        column.descr(),
        column.len()
    );
    let unpadded = NPY_PREAMBLE_LEN + header.len() + 1;
    let padding = (NPY_ALIGN - unpadded % NPY_ALIGN) % NPY_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(NPY_PREAMBLE_LEN + header.len() + column.len() * 8);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&NPY_VERSION);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    column.write_data(&mut out);
    out
}

/// Field-major copy of `records`, in export column order
fn columns(records: &[SampleRecord]) -> Vec<(&'static str, Column)> {
    let ints = |f: fn(&SampleRecord) -> i64| Column::Int(records.iter().map(f).collect());
    let floats = |f: fn(&SampleRecord) -> f64| Column::Float(records.iter().map(f).collect());
    vec![
        ("sample_index", ints(|r| i64::from(r.sample_index))),
        ("t_us", ints(|r| i64::from(r.t_us))),
        ("status24", ints(|r| i64::from(r.status24))),
        ("ch1", ints(|r| i64::from(r.ch1))),
        ("ch2", ints(|r| i64::from(r.ch2))),
        ("ch3", ints(|r| i64::from(r.ch3))),
        ("ch4", ints(|r| i64::from(r.ch4))),
        ("ch1_uv", floats(|r| r.ch1_uv)),
        ("ch2_uv", floats(|r| r.ch2_uv)),
        ("ch3_uv", floats(|r| r.ch3_uv)),
        ("ch4_uv", floats(|r| r.ch4_uv)),
        ("flags", ints(|r| i64::from(r.flags))),
        ("missed_drdy_frame", ints(|r| i64::from(r.missed_drdy_frame))),
        ("recoveries_total", ints(|r| i64::from(r.recoveries_total))),
        ("host_timestamp_s", floats(|r| r.host_timestamp_s)),
    ]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NpzWriter;

impl SampleWriter for NpzWriter {
    fn write(&self, records: &[SampleRecord], sample_rate_hz: u32, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, column) in columns(records) {
            zip.start_file(format!("{}.npy", name), options)?;
            zip.write_all(&npy_bytes(&column))?;
        }
        zip.start_file("sample_rate_hz.npy", options)?;
        zip.write_all(&npy_bytes(&Column::Int(vec![i64::from(sample_rate_hz)])))?;

        zip.finish()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Npz
    }
}
