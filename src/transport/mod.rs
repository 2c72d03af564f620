//! Byte sink towards the XSerialOne hardware
//!
//! The pipeline is the only writer. Writes block for at most the configured
//! timeout; any failure is fatal for the run loop.

use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_BAUD: u32 = 115_200;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport is closed")]
    Closed,
}

/// Byte oriented link the encoded frames are written to
pub trait Transport: Send {
    /// Writes the whole buffer and returns the number of bytes written
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Releases the link. Safe to call more than once.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        port.write_all(bytes)?;
        Ok(bytes.len())
    }

    fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            // Best effort, in-flight bytes may be lost
            if let Err(e) = port.flush() {
                warn!("Flush before closing {} failed: {}", self.name, e);
            }
            info!("Closed serial port {}", self.name);
        } else {
            debug!("Serial port {} already closed", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens a serial link with a bounded write timeout
pub fn open(
    identifier: &str,
    baud: u32,
    timeout: Duration,
) -> Result<SerialTransport, TransportError> {
    info!("Opening serial port {} at {} baud", identifier, baud);
    let port = serialport::new(identifier, baud)
        .timeout(timeout)
        .open()
        .map_err(|source| TransportError::Open {
            port: identifier.to_string(),
            source,
        })?;

    info!("Connected to {}", identifier);
    Ok(SerialTransport {
        name: identifier.to_string(),
        port: Some(port),
    })
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// Whether a configured port name selects the no-hardware mode
pub fn is_mock_identifier(identifier: &str) -> bool {
    let trimmed = identifier.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("mock")
}
