//! Configuration for SparshaIO daemon
//!
//! Loads configuration from a TOML file. Every field has a default matching the
//! stock 13-sensor pad on its four IIO converters, so a partial (or empty)
//! file is valid. The simulated source is opt-in.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sensors: SensorConfig,
    pub streaming: StreamingConfig,
    pub link: LinkConfig,
    pub logging: LoggingConfig,
}

/// Which adapter provides the raw channel readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Linux industrial-I/O sysfs attributes (`in_voltageN_raw`)
    Iio,
    /// Synthetic waveforms for hardware-free runs
    Simulated,
}

/// Channel source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Number of channels in every frame
    pub count: usize,
    /// Raw reading that maps to 1.0
    pub full_scale: i32,
    pub source: SourceKind,
    /// IIO device directories, enumerated device-major (4 inputs each)
    ///
    /// Examples:
    /// - `/sys/bus/iio/devices/iio:device0`
    pub iio_devices: Vec<PathBuf>,
    /// Seed for the simulated source (0 = random each run)
    pub seed: u64,
}

/// Sampling loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Tick period in seconds (0.005 = 200 Hz)
    pub read_interval_secs: f64,
    /// Maximum time without a successful send before the stream is reset
    pub watchdog_timeout_secs: f64,
    /// Begin in Streaming instead of waiting for a `start` command
    pub autostart: bool,
    /// How often to log stream statistics (0 disables)
    pub stats_interval_secs: f64,
}

/// Link acquisition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Pre-bound device path tried first (e.g. an RFCOMM tty)
    pub device_path: PathBuf,
    pub baud_rate: u32,
    /// Address the fallback listener binds on
    pub bind_host: String,
    /// First port tried by the fallback listener
    pub port_first: u16,
    /// Last port tried (inclusive)
    pub port_last: u16,
    /// Upper bound on a single frame write
    pub write_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Converters on the stock pad, 4 inputs each
const DEFAULT_IIO_DEVICES: [&str; 4] = [
    "/sys/bus/iio/devices/iio:device0",
    "/sys/bus/iio/devices/iio:device1",
    "/sys/bus/iio/devices/iio:device2",
    "/sys/bus/iio/devices/iio:device3",
];

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            count: 13,
            full_scale: 32767,
            source: SourceKind::Iio,
            iio_devices: DEFAULT_IIO_DEVICES.into_iter().map(PathBuf::from).collect(),
            seed: 0,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            read_interval_secs: 0.005,
            watchdog_timeout_secs: 2.0,
            autostart: false,
            stats_interval_secs: 10.0,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/rfcomm0"),
            baud_rate: 9600,
            bind_host: "0.0.0.0".to_string(),
            port_first: 5555,
            port_last: 5564,
            write_timeout_ms: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StreamingConfig {
    pub fn read_interval(&self) -> Duration {
        Duration::from_secs_f64(self.read_interval_secs)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.watchdog_timeout_secs)
    }

    /// `None` when periodic statistics are disabled
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0.0).then(|| Duration::from_secs_f64(self.stats_interval_secs))
    }
}

impl LinkConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use sparsha_io::config::Config;
    ///
    /// let config = Config::load("sparsha.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the streaming loop cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.sensors.count == 0 {
            return invalid("sensors.count must be at least 1".into());
        }
        if self.sensors.full_scale <= 0 {
            return invalid(format!(
                "sensors.full_scale must be positive, got {}",
                self.sensors.full_scale
            ));
        }
        if self.sensors.source == SourceKind::Iio && self.sensors.iio_devices.is_empty() {
            return invalid("sensors.source = \"iio\" requires sensors.iio_devices".into());
        }

        let interval = self.streaming.read_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return invalid(format!(
                "streaming.read_interval_secs must be positive, got {}",
                interval
            ));
        }
        let timeout = self.streaming.watchdog_timeout_secs;
        if !timeout.is_finite() || timeout <= interval {
            return invalid(format!(
                "streaming.watchdog_timeout_secs ({}) must exceed read_interval_secs ({})",
                timeout, interval
            ));
        }
        if !self.streaming.stats_interval_secs.is_finite() {
            return invalid("streaming.stats_interval_secs must be finite".into());
        }

        if self.link.port_first == 0 || self.link.port_first > self.link.port_last {
            return invalid(format!(
                "link port range {}..={} is empty",
                self.link.port_first, self.link.port_last
            ));
        }
        if self.link.write_timeout_ms == 0 {
            return invalid("link.write_timeout_ms must be non-zero".into());
        }

        Ok(())
    }
}
