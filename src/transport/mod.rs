//! Transport layer: one duplex byte channel, two concrete bindings
//!
//! - [`SerialTransport`]: an already-bound device path (e.g. `/dev/rfcomm0`)
//! - [`TcpTransport`]: a peer accepted on the fallback listener
//!
//! The binding is chosen once when the link is established; everything above
//! this module only sees [`Transport`].

use crate::error::Result;
use std::io::{self, Read, Write};

pub mod inbound;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod serial;
mod socket;

pub use inbound::MessageDecoder;
pub use serial::SerialTransport;
pub use socket::{TcpTransport, accept_one, bind_first_free};

/// How often inbound readers wake up to check shutdown flags
pub const READ_POLL: std::time::Duration = std::time::Duration::from_millis(100);

/// Closed set of send failures
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The bounded write did not complete in time; the link is still up
    #[error("Write timed out")]
    Timeout,

    /// The peer or the device went away
    #[error("Connection lost: {0}")]
    Disconnected(#[source] io::Error),

    /// Timed out after part of the frame went out; the stream is no longer
    /// aligned on frame boundaries
    #[error("Partial write: {written} of {total} bytes before timeout")]
    PartialWrite {
        /// Bytes already on the wire
        written: usize,
        /// Frame length
        total: usize,
    },

    /// Send attempted after the link was closed
    #[error("Link closed")]
    Closed,
}

impl LinkError {
    /// Classify an I/O error from a write
    pub fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => LinkError::Timeout,
            _ => LinkError::Disconnected(e),
        }
    }

    /// True for failures that end the link (everything except a timeout)
    pub fn is_connection_lost(&self) -> bool {
        !matches!(self, LinkError::Timeout)
    }
}

/// Write one whole frame, or nothing of it
///
/// A timeout before the first byte is a clean [`LinkError::Timeout`]. A
/// timeout after some bytes were written is [`LinkError::PartialWrite`], since
/// the remainder would fuse with the next frame on the wire.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, data: &[u8]) -> std::result::Result<(), LinkError> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => {
                return Err(LinkError::Disconnected(io::Error::from(
                    io::ErrorKind::WriteZero,
                )));
            }
            Ok(n) => written += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(match LinkError::from_io(e) {
                    LinkError::Timeout if written > 0 => LinkError::PartialWrite {
                        written,
                        total: data.len(),
                    },
                    other => other,
                });
            }
        }
    }
    Ok(())
}

/// Which binding a link ended up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Serial,
    Tcp,
    Mock,
}

/// Duplex byte channel to the peer
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Write all of `data` or report why not
    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError>;

    /// Release the underlying device or socket
    ///
    /// Called at most once by [`crate::link::Link`].
    fn close(&mut self);

    /// Independent read handle for the inbound reader thread
    ///
    /// Returns `None` when the binding has no inbound path. Reads on the
    /// returned handle must time out within [`READ_POLL`].
    fn inbound(&mut self) -> Result<Option<Box<dyn Read + Send>>>;
}
