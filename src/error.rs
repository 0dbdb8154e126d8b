//! Error handling for the Pendulum EEG crate
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the codec, acquisition engine and exporters.
//!
//! # Taxonomy
//!
//! - Decode errors ([`EegError::Framing`], [`EegError::Crc`],
//!   [`EegError::PayloadSize`], [`EegError::UnknownPacketType`]) are never fatal
//!   to a stream. The engine logs them and keeps scanning.
//! - [`EegError::Transport`] ends the `start()` attempt or the running session.
//! - [`EegError::NoData`] is returned synchronously by the sample exporters.
//! - [`EegError::WorkerFailure`] is what an unexpected fault inside the
//!   acquisition loop is converted into before it becomes an `Error` state.

use thiserror::Error;

/// Main error type for Pendulum EEG operations
#[derive(Error, Debug)]
pub enum EegError {
    /// Malformed COBS data or a truncated frame
    #[error("Framing error: {0}")]
    Framing(String),

    /// Checksum mismatch between the computed and the received CRC
    #[error("Invalid CRC. expected=0x{expected:04X} received=0x{received:04X}")]
    Crc { expected: u16, received: u16 },

    /// Payload length does not match the fixed size of its packet type
    #[error("Invalid {packet} payload: {actual} bytes (expected {expected})")]
    PayloadSize {
        packet: &'static str,
        actual: usize,
        expected: usize,
    },

    /// Packet type byte is not one of the known packet types
    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    /// Serial link open/read/write failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Export requested while the session archive is empty
    #[error("No samples available to export.")]
    NoData,

    /// Uncaught fault inside the acquisition loop
    #[error("Worker failure: {0}")]
    WorkerFailure(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EegError>,
    },
}

impl EegError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EegError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for the four frame decode errors, which never stop a stream
    pub fn is_decode_error(&self) -> bool {
        match self {
            EegError::Framing(_)
            | EegError::Crc { .. }
            | EegError::PayloadSize { .. }
            | EegError::UnknownPacketType(_) => true,
            EegError::WithContext { source, .. } => source.is_decode_error(),
            _ => false,
        }
    }
}

impl From<serialport::Error> for EegError {
    fn from(err: serialport::Error) -> Self {
        EegError::Transport(err.to_string())
    }
}

impl From<csv::Error> for EegError {
    fn from(err: csv::Error) -> Self {
        EegError::Serialization(format!("CSV: {}", err))
    }
}

impl From<serde_json::Error> for EegError {
    fn from(err: serde_json::Error) -> Self {
        EegError::Serialization(format!("JSON: {}", err))
    }
}

impl From<zip::result::ZipError> for EegError {
    fn from(err: zip::result::ZipError) -> Self {
        EegError::Serialization(format!("NPZ archive: {}", err))
    }
}

impl From<toml::de::Error> for EegError {
    fn from(err: toml::de::Error) -> Self {
        EegError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EegError {
    fn from(err: toml::ser::Error) -> Self {
        EegError::Config(err.to_string())
    }
}

/// Result type alias for Pendulum EEG operations
pub type Result<T> = std::result::Result<T, EegError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<EegError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EegError::Framing("COBS code 0 found in encoded frame.".to_string());
        assert_eq!(
            err.to_string(),
            "Framing error: COBS code 0 found in encoded frame."
        );
    }

    #[test]
    fn test_crc_error_shows_both_values() {
        let err = EegError::Crc {
            expected: 0x29B1,
            received: 0x0001,
        };
        assert_eq!(
            err.to_string(),
            "Invalid CRC. expected=0x29B1 received=0x0001"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = EegError::NoData;
        let with_ctx = err.with_context("CSV export");
        assert!(with_ctx.to_string().contains("CSV export"));
        assert!(with_ctx.to_string().contains("No samples"));
    }

    #[test]
    fn test_decode_error_classification() {
        assert!(EegError::UnknownPacketType(0x42).is_decode_error());
        assert!(EegError::PayloadSize {
            packet: "SAMPLE",
            actual: 3,
            expected: 40
        }
        .is_decode_error());
        assert!(EegError::Framing("x".into())
            .with_context("frame 3")
            .is_decode_error());
        assert!(!EegError::NoData.is_decode_error());
        assert!(!EegError::Transport("gone".into()).is_decode_error());
    }

    #[test]
    fn test_result_ext_on_io_error() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = res.context("Failed to open export file").unwrap_err();
        assert!(err.to_string().starts_with("Failed to open export file"));
    }
}
