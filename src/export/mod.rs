//! Session exporters
//!
//! Each sample format implements [`SampleWriter`] over a slice of archived
//! [`SampleRecord`]s. The engine copies the archive out under its lock and
//! hands the copy to a writer, so no file I/O ever happens while the session
//! is locked.
//!
//! | Format | Writer        | Contents                                  |
//! |--------|---------------|-------------------------------------------|
//! | CSV    | [`CsvWriter`] | one row per record, all fields            |
//! | NPZ    | [`NpzWriter`] | one NumPy array per field + sample rate   |
//! | EDF    | [`EdfWriter`] | four 16-bit EEG signals, 1 s data records |
//!
//! JSON snapshots are not sample exports; see
//! [`AcquisitionEngine::export_json_snapshot`](crate::backend::AcquisitionEngine::export_json_snapshot).

pub mod csv_writer;
pub mod edf_writer;
pub mod npz_writer;

pub use csv_writer::CsvWriter;
pub use edf_writer::EdfWriter;
pub use npz_writer::NpzWriter;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EegError, Result, ResultExt};
use crate::types::SampleRecord;

/// File name prefix for sample exports
pub const SAMPLES_PREFIX: &str = "eeg_samples";

/// File name prefix for JSON snapshots
pub const SNAPSHOT_PREFIX: &str = "eeg_snapshot";

/// Export file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Npz,
    Edf,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Npz => "npz",
            ExportFormat::Edf => "edf",
            ExportFormat::Json => "json",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            ExportFormat::Json => SNAPSHOT_PREFIX,
            _ => SAMPLES_PREFIX,
        }
    }
}

/// Writes archived records to a file
pub trait SampleWriter {
    /// Write `records` to `path`. `records` is never empty.
    fn write(&self, records: &[SampleRecord], sample_rate_hz: u32, path: &Path) -> Result<()>;

    fn format(&self) -> ExportFormat;
}

/// `<prefix>_<YYYYMMDD_HHMMSS>.<ext>` inside `dir`
pub fn default_export_path(dir: &Path, format: ExportFormat, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        format.file_prefix(),
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    ))
}

/// Create the parent directory of `path` if needed
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory {}", parent.display())),
        _ => Ok(()),
    }
}

/// Write `records` with `writer`, resolving the target path
///
/// Fails with [`EegError::NoData`] when `records` is empty.
pub fn export_samples(
    writer: &dyn SampleWriter,
    records: &[SampleRecord],
    sample_rate_hz: u32,
    path: Option<&Path>,
    export_dir: &Path,
) -> Result<PathBuf> {
    if records.is_empty() {
        return Err(EegError::NoData);
    }
    let format = writer.format();
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_export_path(export_dir, format, Local::now()));
    ensure_parent_dir(&path)?;
    writer.write(records, sample_rate_hz, &path)?;
    tracing::info!(
        "Exported {} samples as {} to {}",
        records.len(),
        format.extension(),
        path.display()
    );
    Ok(path)
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_default_export_path() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let path = default_export_path(Path::new("/tmp/out"), ExportFormat::Npz, now);
        assert_eq!(path, Path::new("/tmp/out/eeg_samples_20240309_070501.npz"));
        let path = default_export_path(Path::new("/tmp/out"), ExportFormat::Json, now);
        assert_eq!(path, Path::new("/tmp/out/eeg_snapshot_20240309_070501.json"));
    }

    #[test]
    fn test_empty_archive_is_no_data() {
        let dir = TempDir::new().unwrap();
        let err = export_samples(&CsvWriter, &[], 250, None, dir.path()).unwrap_err();
        assert!(matches!(err, EegError::NoData));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_creates_nested_dirs() {
        let dir = TempDir::new().unwrap();
        let records = test_support::records(10);
        let path = export_samples(&CsvWriter, &records, 250, None, &dir.path().join("a/b")).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("a/b")));
        assert_eq!(path.extension().unwrap(), "csv");
    }
}
