//! Serial transport for a pre-bound device path

use super::{LinkError, READ_POLL, Transport, TransportKind, write_frame};
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
use std::time::Duration;

/// Serial transport for an already-open channel endpoint (RFCOMM tty, UART)
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Open a serial device
    ///
    /// # Arguments
    /// * `path` - Device path (e.g., "/dev/rfcomm0")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    /// * `write_timeout` - Upper bound for a single frame write
    pub fn open(path: &str, baud_rate: u32, write_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(write_timeout)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        // No flush: draining the UART at 9600 baud takes longer than a tick
        write_frame(&mut self.port, data)
    }

    fn close(&mut self) {
        // The descriptor closes when the port drops; clear buffered output now
        if let Err(e) = self.port.clear(serialport::ClearBuffer::Output) {
            log::debug!("Clearing {} output buffer failed: {}", self.path, e);
        }
        log::info!("Closed serial port: {}", self.path);
    }

    fn inbound(&mut self) -> Result<Option<Box<dyn Read + Send>>> {
        let mut reader = self.port.try_clone()?;
        reader.set_timeout(READ_POLL)?;
        Ok(Some(Box::new(reader)))
    }
}
