//! Streaming supervisor: the control core of the daemon
//!
//! # State machine
//!
//! ```text
//!            start (last_send = now)
//!   ┌──────┐ ─────────────────────> ┌───────────┐
//!   │ Idle │                        │ Streaming │
//!   └──────┘ <───────────────────── └───────────┘
//!            stop | watchdog expired | link lost
//! ```
//!
//! # Tick
//!
//! ```text
//! 1. Drain queued peer messages (non-blocking), apply start/stop;
//!    queue disconnected (peer hung up) -> Idle, link closed
//! 2. Idle?                          -> nothing sampled, nothing sent
//! 3. now - last_send > timeout?     -> Idle (link kept open)
//! 4. Sample, send
//!      Ok            -> last_send = now
//!      Timeout       -> frame discarded, watchdog keeps counting
//!      Disconnected  -> Idle, link closed
//!      PartialWrite  -> Idle, link closed (frame boundary lost)
//! ```
//!
//! Only the tick thread touches [`SupervisorState`]. The inbound reader hands
//! over raw messages through a channel, so start/stop never races a tick.

use super::command::Command;
use super::watchdog::Watchdog;
use crate::config::StreamingConfig;
use crate::error::Result;
use crate::link::Link;
use crate::sampler::Sampler;
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Streaming mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Streaming,
}

/// State mutated only by the supervisor
#[derive(Debug, Clone, Copy)]
pub struct SupervisorState {
    pub mode: Mode,
    /// Time of the last successful send (or of the last `start`)
    pub last_send: Instant,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not streaming; nothing sampled or sent
    Idle,
    /// Frame delivered
    Sent,
    /// Send timed out; frame dropped, link kept
    Discarded,
    /// Forced back to Idle by the watchdog
    WatchdogExpired,
    /// Send failed for good; Idle and link closed
    LinkLost,
}

/// Counters reported in the periodic stats line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_sent: u64,
    pub send_timeouts: u64,
    pub watchdog_resets: u64,
    pub link_losses: u64,
    pub commands_applied: u64,
    pub messages_ignored: u64,
}

pub struct Supervisor {
    sampler: Sampler,
    link: Link,
    commands: Receiver<String>,
    watchdog: Watchdog,
    state: SupervisorState,
    stats: StreamStats,
    interval: Duration,
    stats_interval: Option<Duration>,
}

impl Supervisor {
    pub fn new(
        sampler: Sampler,
        link: Link,
        commands: Receiver<String>,
        config: &StreamingConfig,
    ) -> Self {
        let mode = if config.autostart {
            log::info!("Autostart enabled, streaming immediately");
            Mode::Streaming
        } else {
            Mode::Idle
        };

        Self {
            sampler,
            link,
            commands,
            watchdog: Watchdog::new(config.watchdog_timeout()),
            state: SupervisorState {
                mode,
                last_send: Instant::now(),
            },
            stats: StreamStats::default(),
            interval: config.read_interval(),
            stats_interval: config.stats_interval(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Apply a command; redundant ones (start while streaming) are no-ops
    pub fn apply(&mut self, command: Command, now: Instant) {
        match (self.state.mode, command) {
            (Mode::Idle, Command::Start) => {
                self.state.mode = Mode::Streaming;
                self.state.last_send = now;
                log::info!("Streaming started");
            }
            (Mode::Streaming, Command::Stop) => {
                self.state.mode = Mode::Idle;
                log::info!("Streaming stopped");
            }
            (mode, cmd) => {
                log::debug!("{:?} ignored while {:?}", cmd, mode);
            }
        }
        self.stats.commands_applied += 1;
    }

    /// Handle one raw peer message
    pub fn handle_message(&mut self, message: &str, now: Instant) {
        match Command::parse(message) {
            Some(cmd) => self.apply(cmd, now),
            None => {
                self.stats.messages_ignored += 1;
                log::debug!("Ignoring unrecognized message {:?}", message);
            }
        }
    }

    /// Apply every queued peer message without blocking
    ///
    /// A disconnected queue means the inbound reader saw the peer hang up;
    /// the link is closed even if no send has failed yet.
    pub fn drain_commands(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        loop {
            match self.commands.try_recv() {
                Ok(message) => {
                    self.handle_message(&message, now);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.peer_hung_up();
                    break;
                }
            }
        }
        handled
    }

    fn peer_hung_up(&mut self) {
        if self.link.is_closed() {
            return;
        }
        self.state.mode = Mode::Idle;
        self.stats.link_losses += 1;
        log::warn!("Peer {} hung up, closing link", self.link.peer());
        self.link.close();
    }

    /// One tick of the streaming loop, excluding command intake
    ///
    /// Errors are fatal (a channel could not be read); link trouble is
    /// reported through the outcome instead.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        if self.state.mode == Mode::Idle {
            return Ok(TickOutcome::Idle);
        }

        if self.watchdog.is_expired(self.state.last_send, now) {
            self.state.mode = Mode::Idle;
            self.stats.watchdog_resets += 1;
            log::warn!(
                "Watchdog expired: no successful send for {:.3}s (limit {:.3}s), stream reset to Idle",
                now.saturating_duration_since(self.state.last_send).as_secs_f64(),
                self.watchdog.timeout().as_secs_f64()
            );
            return Ok(TickOutcome::WatchdogExpired);
        }

        let frame = self.sampler.sample()?;

        match self.link.send(frame.as_bytes()) {
            Ok(()) => {
                self.state.last_send = now;
                self.stats.frames_sent += 1;
                Ok(TickOutcome::Sent)
            }
            Err(e) if !e.is_connection_lost() => {
                self.stats.send_timeouts += 1;
                log::debug!("Frame discarded: {}", e);
                Ok(TickOutcome::Discarded)
            }
            Err(e) => {
                self.state.mode = Mode::Idle;
                self.stats.link_losses += 1;
                log::error!("Connection lost: {}", e);
                self.link.close();
                Ok(TickOutcome::LinkLost)
            }
        }
    }

    /// Drain commands, then tick
    pub fn step(&mut self, now: Instant) -> Result<TickOutcome> {
        self.drain_commands(now);
        if self.link.is_closed() {
            return Ok(TickOutcome::LinkLost);
        }
        self.tick(now)
    }

    /// Run at the configured rate until `running` clears or the link is lost
    ///
    /// The link is closed on every return path.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        log::info!(
            "Streaming loop running: {} channels every {:?}, watchdog {:?}",
            self.sampler.channel_count(),
            self.interval,
            self.watchdog.timeout()
        );

        let mut next_tick = Instant::now();
        let mut last_stats = next_tick;

        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if let Err(e) = self.step(now) {
                self.link.close();
                return Err(e);
            }

            if self.link.is_closed() {
                log::info!("Link gone, no further commands can arrive");
                break;
            }

            if let Some(every) = self.stats_interval
                && now.saturating_duration_since(last_stats) >= every
            {
                self.log_statistics();
                last_stats = now;
            }

            next_tick += self.interval;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else if now - next_tick > self.interval {
                // Fell behind (e.g. a slow write); re-anchor instead of bursting
                next_tick = now;
            }
        }

        self.link.close();
        self.log_statistics();
        Ok(())
    }

    fn log_statistics(&self) {
        let s = &self.stats;
        log::info!(
            "Stream: mode={:?} sent={} timeouts={} watchdog_resets={} link_losses={} commands={} ignored={}",
            self.state.mode,
            s.frames_sent,
            s.send_timeouts,
            s.watchdog_resets,
            s.link_losses,
            s.commands_applied,
            s.messages_ignored
        );
    }
}
