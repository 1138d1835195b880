//! Channel source: the ordered analog inputs sampled every tick.
//!
//! - [`AnalogChannel`]: Trait implemented by every input adapter
//! - [`iio`]: Linux industrial-I/O sysfs inputs
//! - [`simulated`]: Synthetic pressure waveforms for hardware-free runs

pub mod iio;
pub mod simulated;

use crate::config::{SensorConfig, SourceKind};
use crate::error::Result;
use iio::IioChannel;
use simulated::SimulatedChannel;

/// One analog input producing a raw converter reading
pub trait AnalogChannel: Send {
    /// Read the current raw value
    ///
    /// A failure here means the hardware is absent or misconfigured; callers
    /// treat it as fatal.
    fn read(&mut self) -> Result<i32>;
}

/// Build the channel list described by the configuration
///
/// The returned list is ordered and has exactly `config.count` entries.
pub fn create_channels(config: &SensorConfig) -> Result<Vec<Box<dyn AnalogChannel>>> {
    let channels: Vec<Box<dyn AnalogChannel>> = match config.source {
        SourceKind::Iio => iio::enumerate(&config.iio_devices, config.count)?
            .into_iter()
            .map(|ch| Box::new(ch) as Box<dyn AnalogChannel>)
            .collect(),
        SourceKind::Simulated => SimulatedChannel::bank(config.count, config.full_scale, config.seed)
            .into_iter()
            .map(|ch| Box::new(ch) as Box<dyn AnalogChannel>)
            .collect(),
    };

    log::info!(
        "Channel source: {:?} ({} channels, full scale {})",
        config.source,
        channels.len(),
        config.full_scale
    );
    Ok(channels)
}

/// Channel returning a fixed value, for tests and bench fixtures
#[derive(Debug, Clone)]
pub struct FixedChannel(pub i32);

impl AnalogChannel for FixedChannel {
    fn read(&mut self) -> Result<i32> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_simulated_channels() {
        let config = SensorConfig {
            count: 5,
            source: SourceKind::Simulated,
            seed: 7,
            ..SensorConfig::default()
        };
        let mut channels = create_channels(&config).unwrap();
        assert_eq!(channels.len(), 5);
        // Noise may push a reading slightly outside the converter range
        let slack = config.full_scale / 20;
        for ch in channels.iter_mut() {
            let raw = ch.read().unwrap();
            assert!((-slack..=config.full_scale + slack).contains(&raw));
        }
    }

    #[test]
    fn test_create_iio_channels_missing_device() {
        let config = SensorConfig {
            count: 2,
            source: SourceKind::Iio,
            iio_devices: vec!["/nonexistent/iio:device9".into()],
            ..SensorConfig::default()
        };
        assert!(create_channels(&config).is_err());
    }
}
