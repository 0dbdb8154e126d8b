//! Serial transport seam
//!
//! The acquisition worker never talks to `serialport` directly. It goes
//! through [`SerialLink`], opened by a [`LinkOpener`], so tests can drive the
//! real-path worker with an in-memory link.

use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::{EegError, Result};

/// Byte-level connection to the acquisition board
#[cfg_attr(test, mockall::automock)]
pub trait SerialLink: Send {
    /// Read whatever is available into `buf`, waiting at most the link's
    /// read timeout. Returns `Ok(0)` when the timeout passes with no data.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write every byte of `data`
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Push buffered output to the device
    fn flush(&mut self) -> Result<()>;

    /// Discard any bytes the device sent that have not been read yet
    fn clear_input(&mut self) -> Result<()>;
}

/// Factory for [`SerialLink`]s
pub trait LinkOpener: Send + Sync {
    fn open(&self, port: &str, baud: u32, read_timeout: Duration) -> Result<Box<dyn SerialLink>>;
}

/// [`SerialLink`] backed by an OS serial port
pub struct SystemSerialLink {
    port: Box<dyn SerialPort>,
}

impl SystemSerialLink {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl SerialLink for SystemSerialLink {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(EegError::Transport(e.to_string())),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .map_err(|e| EegError::Transport(e.to_string()))
    }

    fn flush(&mut self) -> Result<()> {
        self.port
            .flush()
            .map_err(|e| EegError::Transport(e.to_string()))
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Opens OS serial ports through `serialport`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerialOpener;

impl LinkOpener for SystemSerialOpener {
    fn open(&self, port: &str, baud: u32, read_timeout: Duration) -> Result<Box<dyn SerialLink>> {
        let handle = serialport::new(port, baud).timeout(read_timeout).open()?;
        tracing::debug!("Opened serial port {} @ {}", port, baud);
        Ok(Box::new(SystemSerialLink::new(handle)))
    }
}

/// Names of the serial ports the OS reports
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            tracing::warn!("Serial port enumeration failed: {}", e);
            Vec::new()
        }
    }
}

/// Encode an operator command as newline-terminated ASCII
///
/// Non-ASCII characters are dropped.
pub fn command_bytes(command: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = command.chars().filter(char::is_ascii).map(|c| c as u8).collect();
    bytes.push(b'\n');
    bytes
}
