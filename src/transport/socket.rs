//! TCP fallback: scan a port range, accept one peer

use super::{LinkError, READ_POLL, Transport, TransportKind, write_frame};
use crate::error::{Error, Result};
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Poll period while waiting for the peer to connect
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Bind the first free port in `first..=last`
pub fn bind_first_free(host: &str, first: u16, last: u16) -> Result<TcpListener> {
    for port in first..=last {
        match TcpListener::bind((host, port)) {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                log::debug!("Port {} in use, trying next", port);
            }
            Err(e) => {
                log::warn!("Cannot bind {}:{}: {}", host, port, e);
            }
        }
    }
    Err(Error::NoFreePort { first, last })
}

/// Block until one peer connects, or until `running` is cleared
///
/// The listener is switched to non-blocking so the wait can be cancelled.
pub fn accept_one(listener: &TcpListener, running: &AtomicBool) -> Result<(TcpStream, SocketAddr)> {
    listener.set_nonblocking(true)?;

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(false)?;
                return Ok((stream, addr));
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                log::error!("Accept error: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    Err(Error::Shutdown)
}

/// Accepted TCP peer
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, peer: SocketAddr, write_timeout: Duration) -> Result<Self> {
        stream.set_write_timeout(Some(write_timeout))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }
        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        write_frame(&mut self.stream, data)
    }

    fn close(&mut self) {
        // Also wakes the inbound reader blocked on the cloned handle
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => log::info!("Closed TCP link to {}", self.peer),
            Err(e) => log::debug!("TCP shutdown for {}: {}", self.peer, e),
        }
    }

    fn inbound(&mut self) -> Result<Option<Box<dyn Read + Send>>> {
        let reader = self.stream.try_clone()?;
        reader.set_read_timeout(Some(READ_POLL))?;
        Ok(Some(Box::new(reader)))
    }
}
