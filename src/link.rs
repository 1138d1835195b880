//! Link manager: acquire exactly one duplex channel to the peer
//!
//! # Acquisition order
//!
//! ```text
//! 1. device_path exists?  ── yes ──> open serial        ──> Attached
//!          │ no (or open failed)
//!          v
//! 2. bind first free port in port_first..=port_last   (none free: fatal)
//!          v
//! 3. wait for one peer                                  ──> Accepted
//! ```
//!
//! Whatever binding wins, callers get a [`Link`] with the same
//! send/close contract. Closing is idempotent and also happens on drop, so
//! every exit path releases the device or socket exactly once.

use crate::config::LinkConfig;
use crate::error::Result;
use crate::transport::{
    LinkError, SerialTransport, TcpTransport, Transport, TransportKind, accept_one,
    bind_first_free, inbound,
};
use crossbeam_channel::Sender;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Which acquisition strategy produced the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Opened a channel endpoint that was already bound
    Attached,
    /// Listened and accepted a peer
    Accepted,
}

/// The single active channel to the peer
pub struct Link {
    transport: Box<dyn Transport>,
    mode: LinkMode,
    peer: String,
    /// Cleared on close; the inbound reader watches it
    alive: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    /// Command sender parked here when there is no reader thread to own it,
    /// so the queue only disconnects when the peer actually goes away
    parked_tx: Option<Sender<String>>,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, mode: LinkMode, peer: impl Into<String>) -> Self {
        Self {
            transport,
            mode,
            peer: peer.into(),
            alive: Arc::new(AtomicBool::new(true)),
            reader: None,
            parked_tx: None,
        }
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        !self.alive.load(Ordering::Relaxed)
    }

    /// Spawn the inbound reader, pushing peer messages onto `tx`
    ///
    /// The reader drops `tx` when the peer hangs up, which disconnects the
    /// queue. Bindings without an inbound path keep `tx` until close.
    pub fn start_inbound(&mut self, tx: Sender<String>, running: Arc<AtomicBool>) -> Result<()> {
        let Some(reader) = self.transport.inbound()? else {
            log::debug!("{:?} link has no inbound path", self.kind());
            self.parked_tx = Some(tx);
            return Ok(());
        };

        let alive = Arc::clone(&self.alive);
        let handle = thread::Builder::new()
            .name("link-inbound".to_string())
            .spawn(move || inbound::read_loop(reader, tx, running, alive))?;
        self.reader = Some(handle);
        Ok(())
    }

    /// Send one buffer to the peer
    pub fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        self.transport.send(data)
    }

    /// Close the link; later calls are no-ops
    pub fn close(&mut self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            self.transport.close();
            if let Some(handle) = self.reader.take()
                && handle.join().is_err()
            {
                log::error!("Inbound reader thread panicked");
            }
            self.parked_tx = None;
            log::info!("Link to {} closed", self.peer);
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.close();
    }
}

/// Establish the link using the configured fallback order
///
/// Returns [`crate::Error::Shutdown`] if `running` is cleared while waiting
/// for a peer, and [`crate::Error::NoFreePort`] if the listener cannot bind.
pub fn establish(config: &LinkConfig, running: &AtomicBool) -> Result<Link> {
    if let Some(link) = try_attach(config) {
        return Ok(link);
    }

    let listener = listen(config)?;
    accept_link(&listener, config, running)
}

/// Strategy 1: open the pre-bound device path if present
fn try_attach(config: &LinkConfig) -> Option<Link> {
    let path = config.device_path.to_string_lossy();
    if !config.device_path.exists() {
        log::debug!("{} not present, skipping attach", path);
        return None;
    }

    match SerialTransport::open(&path, config.baud_rate, config.write_timeout()) {
        Ok(transport) => {
            log::info!("Using existing {} connection", path);
            Some(Link::new(Box::new(transport), LinkMode::Attached, path))
        }
        Err(e) => {
            log::warn!("Failed to open {}: {}", path, e);
            None
        }
    }
}

/// Strategy 2: bind the first free port in the configured range
pub fn listen(config: &LinkConfig) -> Result<TcpListener> {
    let listener = bind_first_free(&config.bind_host, config.port_first, config.port_last)?;
    log::info!(
        "No existing connection. Listening on {}",
        listener.local_addr()?
    );
    Ok(listener)
}

/// Strategy 3: wait for exactly one peer on `listener`
pub fn accept_link(listener: &TcpListener, config: &LinkConfig, running: &AtomicBool) -> Result<Link> {
    let (stream, addr) = accept_one(listener, running)?;
    log::info!("Connected to {}", addr);
    let transport = TcpTransport::new(stream, addr, config.write_timeout())?;
    Ok(Link::new(Box::new(transport), LinkMode::Accepted, addr.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockFailure, MockTransport};

    fn mock_link() -> (Link, MockTransport) {
        let mock = MockTransport::new();
        let link = Link::new(Box::new(mock.clone()), LinkMode::Accepted, "mock");
        (link, mock)
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut link, mock) = mock_link();
        link.close();
        link.close();
        drop(link);
        assert_eq!(mock.close_calls(), 1);
    }

    #[test]
    fn test_drop_closes() {
        let (link, mock) = mock_link();
        assert!(!link.is_closed());
        drop(link);
        assert_eq!(mock.close_calls(), 1);
    }

    #[test]
    fn test_send_after_close_fails() {
        let (mut link, mock) = mock_link();
        link.close();
        assert!(matches!(link.send(b"x\n"), Err(LinkError::Closed)));
        assert_eq!(mock.send_calls(), 0);
    }

    #[test]
    fn test_send_passes_failures_through() {
        let (mut link, mock) = mock_link();
        mock.fail_next(MockFailure::Timeout);
        assert!(matches!(link.send(b"a\n"), Err(LinkError::Timeout)));
        assert!(link.send(b"b\n").is_ok());
        assert_eq!(mock.written_lines(), vec!["b"]);
    }

    #[test]
    fn test_mock_has_no_inbound() {
        let (mut link, _mock) = mock_link();
        let (tx, _rx) = crossbeam_channel::unbounded();
        link.start_inbound(tx, Arc::new(AtomicBool::new(true))).unwrap();
        assert_eq!(link.kind(), TransportKind::Mock);
    }

    #[test]
    fn test_queue_stays_connected_without_reader() {
        let (mut link, _mock) = mock_link();
        let (tx, rx) = crossbeam_channel::unbounded();
        link.start_inbound(tx, Arc::new(AtomicBool::new(true))).unwrap();
        assert_eq!(rx.try_recv(), Err(crossbeam_channel::TryRecvError::Empty));

        link.close();
        assert_eq!(
            rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        );
    }

    #[test]
    fn test_establish_falls_back_to_listener() {
        let scratch = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = scratch.local_addr().unwrap().port();
        drop(scratch);

        let config = LinkConfig {
            device_path: "/nonexistent/rfcomm9".into(),
            bind_host: "127.0.0.1".to_string(),
            port_first: port,
            port_last: port,
            ..LinkConfig::default()
        };

        let client = thread::spawn(move || {
            for _ in 0..200 {
                if let Ok(stream) = std::net::TcpStream::connect(("127.0.0.1", port)) {
                    return stream;
                }
                thread::sleep(std::time::Duration::from_millis(10));
            }
            panic!("listener never came up");
        });

        let running = AtomicBool::new(true);
        let link = establish(&config, &running).unwrap();
        assert_eq!(link.mode(), LinkMode::Accepted);
        assert_eq!(link.kind(), TransportKind::Tcp);
        drop(client.join().unwrap());
    }
}
