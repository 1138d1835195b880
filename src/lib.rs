//! SparshaIO - Pressure sensor streaming daemon
//!
//! Samples a fixed bank of analog pressure channels at a fixed rate and streams
//! normalized frames to one remote peer. The peer starts and stops the stream;
//! a watchdog resets it when sends stall.
//!
//! ## Modules
//!
//! - [`sensors`]: Channel source adapters (IIO sysfs, simulated)
//! - [`sampler`]: Normalization and frame formatting
//! - [`transport`]: Serial and TCP bindings behind one trait
//! - [`link`]: Link acquisition with attach/listen fallback
//! - [`streaming`]: Start/stop state machine, watchdog, tick loop
//!
//! ## Features
//!
//! - `mock`: Build `transport::mock::MockTransport` for hardware-free testing

pub mod config;
pub mod error;
pub mod link;
pub mod sampler;
pub mod sensors;
pub mod streaming;
pub mod transport;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
