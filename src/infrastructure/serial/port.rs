//! Serial Port Module
//!
//! Port enumeration and the line-oriented link used by the listener.

use crate::domain::error::BridgeError;
use crate::domain::models::PortEntry;
use serialport::{SerialPort, SerialPortType};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

/// Line-oriented view of an open serial connection.
pub trait SerialLink: Send {
    /// Bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Read one line without its terminator.
    ///
    /// Returns `Ok(None)` if the read timeout elapsed before a complete
    /// line arrived; partial data is kept for the next call.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Write `line` followed by `\n`.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Source of serial ports: the OS in production, memory in tests.
pub trait PortProvider: Send + Sync {
    fn available_ports(&self) -> Result<Vec<PortEntry>, BridgeError>;

    fn open(
        &self,
        name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, BridgeError>;
}

/// Ports as seen by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortProvider for SystemPorts {
    fn available_ports(&self) -> Result<Vec<PortEntry>, BridgeError> {
        let ports = serialport::available_ports().map_err(BridgeError::Enumeration)?;
        Ok(ports
            .into_iter()
            .map(|p| PortEntry {
                description: describe(&p.port_type),
                name: p.port_name,
            })
            .collect())
    }

    fn open(
        &self,
        name: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, BridgeError> {
        let port = serialport::new(name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| BridgeError::Connection {
                port: name.to_string(),
                source,
            })?;

        Ok(Box::new(PortLink::new(port)))
    }
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(info) => match (&info.product, &info.manufacturer) {
            (Some(product), _) => product.clone(),
            (None, Some(manufacturer)) => manufacturer.clone(),
            (None, None) => format!("USB {:04x}:{:04x}", info.vid, info.pid),
        },
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "n/a".to_string(),
    }
}

/// [`SerialLink`] over a real serial port.
pub struct PortLink {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl PortLink {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            pending: Vec::with_capacity(256),
        }
    }
}

impl SerialLink for PortLink {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let buffered = if self.pending.contains(&b'\n') {
            self.pending.len() as u32
        } else {
            0
        };
        Ok(self.port.bytes_to_read()? + buffered)
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = take_line(&mut self.pending) {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(n) => buffer_chunk(&mut self.pending, &chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                debug!("Serial read timed out with {} bytes pending", self.pending.len());
            }
            Err(e) => return Err(e),
        }

        Ok(take_line(&mut self.pending))
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()
    }
}

/// Longest partial line kept while waiting for its terminator.
pub(crate) const MAX_PENDING: usize = 1024;

/// Append `chunk` to `pending`. A buffer that outgrows [`MAX_PENDING`]
/// without a line terminator is discarded.
pub(crate) fn buffer_chunk(pending: &mut Vec<u8>, chunk: &[u8]) {
    pending.extend_from_slice(chunk);
    if pending.len() > MAX_PENDING && !pending.contains(&b'\n') {
        warn!(
            "Discarding {} bytes received without a line terminator",
            pending.len()
        );
        pending.clear();
    }
}

/// Split the first `\n`-terminated line off `buffer`, dropping `\r\n`.
pub(crate) fn take_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}
