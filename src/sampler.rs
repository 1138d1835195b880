//! Sampling and frame formatting
//!
//! Every tick reads each channel once in fixed order, normalizes the raw
//! readings into `[0, 1]` and renders them as one text line:
//!
//! ```text
//! 0.000;0.500;1.000;0.000\n
//! ```
//!
//! Values always carry exactly three decimals, so a frame decodes back to a
//! vector of the same length within 0.0005 of the sampled values.

use crate::error::{Error, Result};
use crate::sensors::AnalogChannel;
use std::fmt::Write;

/// Field separator within a frame
pub const DELIMITER: char = ';';

/// Decimal digits per value
pub const PRECISION: usize = 3;

/// Map a raw reading into `[0, 1]`
///
/// Over-range and negative glitches are clamped rather than rejected.
#[inline]
pub fn normalize(raw: i32, full_scale: i32) -> f64 {
    (raw as f64 / full_scale as f64).clamp(0.0, 1.0)
}

/// One normalized value per channel, in channel order
#[derive(Debug, Clone, PartialEq)]
pub struct SampleVector(pub Vec<f64>);

impl SampleVector {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Render as a newline-terminated frame
    pub fn to_frame(&self) -> Frame {
        // "0.000" plus delimiter per value
        let mut line = String::with_capacity(self.0.len() * (PRECISION + 3) + 1);
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                line.push(DELIMITER);
            }
            // Writing to a String cannot fail
            let _ = write!(line, "{:.*}", PRECISION, v);
        }
        line.push('\n');
        Frame(line)
    }
}

/// A sample vector rendered as one wire line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(String);

impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Decode a frame line back into values
    pub fn parse(line: &str) -> Result<SampleVector> {
        let body = line
            .strip_suffix('\n')
            .ok_or_else(|| Error::MalformedFrame("missing newline terminator".into()))?;
        let body = body.strip_suffix('\r').unwrap_or(body);
        if body.is_empty() {
            return Err(Error::MalformedFrame("empty frame".into()));
        }

        body.split(DELIMITER)
            .enumerate()
            .map(|(i, field)| {
                field.parse::<f64>().map_err(|_| {
                    Error::MalformedFrame(format!("field {} is not a number: {:?}", i, field))
                })
            })
            .collect::<Result<Vec<f64>>>()
            .map(SampleVector)
    }
}

/// Polls the channel source and produces frames
pub struct Sampler {
    channels: Vec<Box<dyn AnalogChannel>>,
    full_scale: i32,
}

impl Sampler {
    pub fn new(channels: Vec<Box<dyn AnalogChannel>>, full_scale: i32) -> Self {
        Self {
            channels,
            full_scale,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Read every channel once and normalize
    pub fn read_vector(&mut self) -> Result<SampleVector> {
        let full_scale = self.full_scale;
        self.channels
            .iter_mut()
            .map(|ch| ch.read().map(|raw| normalize(raw, full_scale)))
            .collect::<Result<Vec<f64>>>()
            .map(SampleVector)
    }

    /// Read every channel once and render the frame
    pub fn sample(&mut self) -> Result<Frame> {
        Ok(self.read_vector()?.to_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::FixedChannel;
    use approx::assert_abs_diff_eq;

    struct BrokenChannel;

    impl AnalogChannel for BrokenChannel {
        fn read(&mut self) -> Result<i32> {
            Err(Error::ChannelRead {
                index: 0,
                reason: "no converter".into(),
            })
        }
    }

    fn sampler_with(raw: &[i32], full_scale: i32) -> Sampler {
        let channels = raw
            .iter()
            .map(|&r| Box::new(FixedChannel(r)) as Box<dyn AnalogChannel>)
            .collect();
        Sampler::new(channels, full_scale)
    }

    #[test]
    fn test_normalize_in_range() {
        for raw in [0, 1, 100, 16384, 32766, 32767] {
            assert_eq!(normalize(raw, 32767), raw as f64 / 32767.0);
        }
    }

    #[test]
    fn test_normalize_clamps_glitches() {
        assert_eq!(normalize(-5, 32767), 0.0);
        assert_eq!(normalize(i32::MIN, 32767), 0.0);
        assert_eq!(normalize(40000, 32767), 1.0);
        assert_eq!(normalize(i32::MAX, 32767), 1.0);
    }

    #[test]
    fn test_reference_frame() {
        let mut sampler = sampler_with(&[0, 16384, 32767, -5], 32767);
        let frame = sampler.sample().unwrap();
        assert_eq!(frame.as_str(), "0.000;0.500;1.000;0.000\n");
    }

    #[test]
    fn test_frame_round_trip_within_rounding() {
        let raw: Vec<i32> = (0..13).map(|i| i * 2521 - 300).collect();
        let mut sampler = sampler_with(&raw, 32767);
        let vector = sampler.read_vector().unwrap();
        let decoded = Frame::parse(vector.to_frame().as_str()).unwrap();

        assert_eq!(decoded.len(), vector.len());
        for (a, b) in vector.values().iter().zip(decoded.values()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 0.0005);
        }
    }

    #[test]
    fn test_single_channel_frame_has_no_delimiter() {
        let mut sampler = sampler_with(&[32767], 32767);
        assert_eq!(sampler.sample().unwrap().as_str(), "1.000\n");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Frame::parse("0.100;0.200").is_err());
        assert!(Frame::parse("\n").is_err());
        assert!(Frame::parse("0.100;;0.200\n").is_err());
        assert!(Frame::parse("0.100;abc\n").is_err());
    }

    #[test]
    fn test_parse_accepts_crlf() {
        let v = Frame::parse("0.250;0.750\r\n").unwrap();
        assert_eq!(v.values(), &[0.25, 0.75]);
    }

    #[test]
    fn test_channel_failure_propagates() {
        let channels: Vec<Box<dyn AnalogChannel>> =
            vec![Box::new(FixedChannel(1)), Box::new(BrokenChannel)];
        let mut sampler = Sampler::new(channels, 32767);
        assert!(matches!(
            sampler.sample(),
            Err(Error::ChannelRead { .. })
        ));
    }
}
