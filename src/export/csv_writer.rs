//! CSV sample export
//!
//! Header row is [`SampleRecord::FIELD_NAMES`]; one row per archived record.

use std::path::Path;

use super::{ExportFormat, SampleWriter};
use crate::error::Result;
use crate::types::SampleRecord;

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvWriter;

impl SampleWriter for CsvWriter {
    fn write(&self, records: &[SampleRecord], _sample_rate_hz: u32, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}
