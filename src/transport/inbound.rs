//! Inbound message path: peer bytes → discrete text messages → queue
//!
//! Messages end at `\n` or `\r`. A peer that sends a bare token without a
//! terminator is still heard: pending bytes are flushed as a message once a
//! read times out with nothing new.
//!
//! The reader thread never touches supervisor state; it only pushes onto the
//! queue the tick loop drains.

use crossbeam_channel::Sender;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Pending bytes beyond this without a terminator are discarded
pub const MAX_PENDING: usize = 256;

/// Splits a byte stream into messages
#[derive(Debug, Default)]
pub struct MessageDecoder {
    pending: Vec<u8>,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, appending every completed message to `out`
    pub fn push(&mut self, bytes: &[u8], out: &mut Vec<String>) {
        for &b in bytes {
            if b == b'\n' || b == b'\r' {
                self.emit(out);
            } else if self.pending.len() >= MAX_PENDING {
                log::warn!(
                    "Inbound message exceeds {} bytes without terminator, discarding",
                    MAX_PENDING
                );
                self.pending.clear();
                self.pending.push(b);
            } else {
                self.pending.push(b);
            }
        }
    }

    /// Treat an idle gap as a message boundary
    pub fn flush_idle(&mut self) -> Option<String> {
        let mut out = Vec::with_capacity(1);
        self.emit(&mut out);
        out.pop()
    }

    fn emit(&mut self, out: &mut Vec<String>) {
        if !self.pending.is_empty() {
            out.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Reader thread body
///
/// Runs until the peer closes, a read fails, the daemon shuts down
/// (`running` cleared), or the link is closed (`alive` cleared).
pub fn read_loop(
    mut reader: Box<dyn Read + Send>,
    tx: Sender<String>,
    running: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
) {
    let mut decoder = MessageDecoder::new();
    let mut buf = [0u8; 128];
    let mut messages = Vec::new();

    log::debug!("Inbound reader started");

    while running.load(Ordering::Relaxed) && alive.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => {
                messages.extend(decoder.flush_idle());
                // EOF after our own close is expected, not news
                let level = if alive.load(Ordering::Relaxed) {
                    log::Level::Info
                } else {
                    log::Level::Debug
                };
                log::log!(level, "Peer closed inbound stream");
                // Deliver whatever arrived just before EOF
                for msg in messages.drain(..) {
                    let _ = tx.send(msg);
                }
                break;
            }
            Ok(n) => decoder.push(&buf[..n], &mut messages),
            Err(ref e) if is_timeout(e) => messages.extend(decoder.flush_idle()),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if alive.load(Ordering::Relaxed) {
                    log::warn!("Inbound read failed: {}", e);
                }
                break;
            }
        }

        for msg in messages.drain(..) {
            log::trace!("Inbound message: {:?}", msg);
            if tx.send(msg).is_err() {
                log::debug!("Command queue closed, inbound reader exiting");
                return;
            }
        }
    }

    log::debug!("Inbound reader stopped");
}
