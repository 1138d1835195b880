//! Peer commands
//!
//! | Message | Effect |
//! |---------|--------|
//! | `start` | Begin streaming frames |
//! | `stop`  | Stop streaming, keep the link |
//!
//! Matching ignores case and surrounding whitespace. Anything else is not a
//! command and is dropped without error.

/// Command from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    /// Parse one inbound message; `None` for anything unrecognized
    pub fn parse(message: &str) -> Option<Self> {
        let token = message.trim();
        if token.eq_ignore_ascii_case("start") {
            Some(Command::Start)
        } else if token.eq_ignore_ascii_case("stop") {
            Some(Command::Stop)
        } else {
            None
        }
    }
}
