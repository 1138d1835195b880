//! Mock transport for testing

use super::{LinkError, Transport, TransportKind, write_frame};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Failure to inject into a mock send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Disconnect,
    /// Accept this many bytes of the frame, then time out
    StallAfter(usize),
}

/// Mock transport for unit testing
///
/// Clones share state, so a test keeps one handle while the link owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    write_buffer: Vec<u8>,
    send_calls: usize,
    queued_failures: VecDeque<MockFailure>,
    persistent_failure: Option<MockFailure>,
    close_calls: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail only the next send
    pub fn fail_next(&self, failure: MockFailure) {
        self.inner.lock().queued_failures.push_back(failure);
    }

    /// Fail every send from now on (`None` to recover)
    pub fn fail_always(&self, failure: Option<MockFailure>) {
        self.inner.lock().persistent_failure = failure;
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Written data split into lines (terminators stripped)
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.get_written())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Number of send attempts, successful or not
    pub fn send_calls(&self) -> usize {
        self.inner.lock().send_calls
    }

    pub fn close_calls(&self) -> usize {
        self.inner.lock().close_calls
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Mock
    }

    fn send(&mut self, data: &[u8]) -> std::result::Result<(), LinkError> {
        let mut inner = self.inner.lock();
        inner.send_calls += 1;

        let failure = inner
            .queued_failures
            .pop_front()
            .or(inner.persistent_failure);
        match failure {
            None => {
                inner.write_buffer.extend_from_slice(data);
                Ok(())
            }
            Some(MockFailure::Timeout) => Err(LinkError::Timeout),
            Some(MockFailure::Disconnect) => Err(LinkError::Disconnected(io::Error::from(
                io::ErrorKind::BrokenPipe,
            ))),
            Some(MockFailure::StallAfter(budget)) => {
                let mut writer = StallingWriter {
                    sink: &mut inner.write_buffer,
                    budget,
                };
                write_frame(&mut writer, data)
            }
        }
    }

    fn close(&mut self) {
        self.inner.lock().close_calls += 1;
    }

    fn inbound(&mut self) -> Result<Option<Box<dyn Read + Send>>> {
        // Tests push commands straight onto the queue
        Ok(None)
    }
}

/// Writer that takes `budget` bytes and then times out, like a socket whose
/// peer stopped reading
struct StallingWriter<'a> {
    sink: &'a mut Vec<u8>,
    budget: usize,
}

impl Write for StallingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::from(io::ErrorKind::TimedOut));
        }
        let n = buf.len().min(self.budget);
        self.sink.extend_from_slice(&buf[..n]);
        self.budget -= n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
