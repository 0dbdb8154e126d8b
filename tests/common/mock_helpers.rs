//! In-memory transport for driving the real serial path

use parking_lot::Mutex;
use pendulum_eeg::backend::{LinkOpener, SerialLink};
use pendulum_eeg::{EegError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct LinkState {
    inbound: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    clears: usize,
    /// Fail reads once `inbound` is drained
    unplug_when_drained: bool,
    opened_with: Option<(String, u32)>,
}

/// Test-side handle to a [`MemoryLink`]
#[derive(Clone, Default)]
pub struct MemoryHandle {
    state: Arc<Mutex<LinkState>>,
}

impl MemoryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the worker to read, as one read chunk
    pub fn feed(&self, bytes: impl Into<Vec<u8>>) {
        self.state.lock().inbound.push_back(bytes.into());
    }

    /// Make reads fail once every queued chunk has been read
    pub fn unplug_when_drained(&self) {
        self.state.lock().unplug_when_drained = true;
    }

    pub fn drained(&self) -> bool {
        self.state.lock().inbound.is_empty()
    }

    /// Everything the host wrote, as text
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().written).into_owned()
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().clears
    }

    pub fn opened_with(&self) -> Option<(String, u32)> {
        self.state.lock().opened_with.clone()
    }
}

/// [`SerialLink`] reading from a queue of chunks
pub struct MemoryLink {
    handle: MemoryHandle,
}

impl SerialLink for MemoryLink {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.handle.state.lock();
        match state.inbound.pop_front() {
            Some(mut chunk) => {
                if chunk.len() > buf.len() {
                    let rest = chunk.split_off(buf.len());
                    state.inbound.push_front(rest);
                }
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            None if state.unplug_when_drained => {
                Err(EegError::Transport("device disconnected".into()))
            }
            None => {
                drop(state);
                std::thread::sleep(Duration::from_millis(2));
                Ok(0)
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.handle.state.lock().written.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.handle.state.lock().clears += 1;
        Ok(())
    }
}

/// [`LinkOpener`] handing out links onto one [`MemoryHandle`]
pub struct MemoryOpener {
    handle: MemoryHandle,
}

impl MemoryOpener {
    pub fn new(handle: MemoryHandle) -> Arc<Self> {
        Arc::new(Self { handle })
    }
}

impl LinkOpener for MemoryOpener {
    fn open(&self, port: &str, baud: u32, _read_timeout: Duration) -> Result<Box<dyn SerialLink>> {
        self.handle.state.lock().opened_with = Some((port.to_string(), baud));
        Ok(Box::new(MemoryLink {
            handle: self.handle.clone(),
        }))
    }
}

/// [`LinkOpener`] for a port that does not exist
pub struct MissingPortOpener;

impl LinkOpener for MissingPortOpener {
    fn open(&self, port: &str, _baud: u32, _read_timeout: Duration) -> Result<Box<dyn SerialLink>> {
        Err(EegError::Transport(format!("No such file or directory: {}", port)))
    }
}
