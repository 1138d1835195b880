//! Linux industrial-I/O (sysfs) channel adapter
//!
//! Each converter shows up as a directory under `/sys/bus/iio/devices/` with
//! one `in_voltageN_raw` attribute per input. Reading the attribute triggers a
//! single conversion and returns the signed raw value as decimal text.

use super::AnalogChannel;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Inputs exposed by each converter (ADS1115 has four single-ended inputs)
pub const INPUTS_PER_DEVICE: usize = 4;

/// One `in_voltageN_raw` attribute
#[derive(Debug, Clone)]
pub struct IioChannel {
    index: usize,
    path: PathBuf,
}

impl IioChannel {
    pub fn new(index: usize, path: PathBuf) -> Self {
        Self { index, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalogChannel for IioChannel {
    fn read(&mut self) -> Result<i32> {
        let text = fs::read_to_string(&self.path).map_err(|e| Error::ChannelRead {
            index: self.index,
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        parse_raw(&text).ok_or_else(|| Error::ChannelRead {
            index: self.index,
            reason: format!("{}: unparseable value {:?}", self.path.display(), text.trim()),
        })
    }
}

fn parse_raw(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// Enumerate `count` channels device-major across `devices`
///
/// Inputs beyond `count` are left unused. Every selected attribute must exist
/// up front; a missing converter is a startup failure, not a runtime one.
pub fn enumerate(devices: &[PathBuf], count: usize) -> Result<Vec<IioChannel>> {
    let available = devices.len() * INPUTS_PER_DEVICE;
    if available < count {
        return Err(Error::InvalidConfig(format!(
            "{} IIO devices provide {} inputs, {} sensors configured",
            devices.len(),
            available,
            count
        )));
    }

    let channels: Vec<IioChannel> = devices
        .iter()
        .flat_map(|dev| (0..INPUTS_PER_DEVICE).map(move |i| dev.join(format!("in_voltage{}_raw", i))))
        .take(count)
        .enumerate()
        .map(|(index, path)| IioChannel::new(index, path))
        .collect();

    if let Some(missing) = channels.iter().find(|ch| !ch.path.exists()) {
        return Err(Error::ChannelRead {
            index: missing.index,
            reason: format!("{} not found", missing.path.display()),
        });
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_device(dir: &Path, values: &[&str]) -> PathBuf {
        for (i, v) in values.iter().enumerate() {
            fs::write(dir.join(format!("in_voltage{}_raw", i)), v).unwrap();
        }
        dir.to_path_buf()
    }

    #[test]
    fn test_parse_raw() {
        assert_eq!(parse_raw("16384\n"), Some(16384));
        assert_eq!(parse_raw("  -12 "), Some(-12));
        assert_eq!(parse_raw("abc"), None);
        assert_eq!(parse_raw(""), None);
    }

    #[test]
    fn test_enumerate_device_major_and_truncated() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let dev_a = fake_device(a.path(), &["1", "2", "3", "4"]);
        let dev_b = fake_device(b.path(), &["5", "6", "7", "8"]);

        let mut channels = enumerate(&[dev_a, dev_b], 6).unwrap();
        assert_eq!(channels.len(), 6);

        let values: Vec<i32> = channels.iter_mut().map(|c| c.read().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_enumerate_too_few_inputs() {
        let a = tempfile::tempdir().unwrap();
        let dev_a = fake_device(a.path(), &["1", "2", "3", "4"]);
        assert!(matches!(
            enumerate(&[dev_a], 5),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_enumerate_missing_attribute() {
        let a = tempfile::tempdir().unwrap();
        let dev_a = fake_device(a.path(), &["1", "2"]);
        assert!(matches!(
            enumerate(&[dev_a], 3),
            Err(Error::ChannelRead { index: 2, .. })
        ));
    }

    #[test]
    fn test_read_garbage_is_error() {
        let a = tempfile::tempdir().unwrap();
        let dev_a = fake_device(a.path(), &["not-a-number"]);
        let mut channels = enumerate(&[dev_a], 1).unwrap();
        assert!(matches!(
            channels[0].read(),
            Err(Error::ChannelRead { index: 0, .. })
        ));
    }
}
