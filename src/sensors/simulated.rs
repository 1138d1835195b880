//! Simulated pressure channels
//!
//! Each channel follows a slow sine "press and release" cycle with its own
//! period and phase, plus Gaussian noise. Readings occasionally dip a few
//! counts below zero, which is what a real converter does at rest.

use super::AnalogChannel;
use crate::error::Result;
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;
use std::f64::consts::TAU;
use std::time::Instant;

/// Noise standard deviation as a fraction of full scale
const NOISE_FRACTION: f64 = 0.002;

/// Seedable noise source
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// If seed is 0, uses random entropy. Otherwise results are reproducible.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    #[inline]
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }
}

/// One synthetic pressure input
pub struct SimulatedChannel {
    full_scale: i32,
    period_secs: f64,
    phase: f64,
    epoch: Instant,
    noise: NoiseGenerator,
}

impl SimulatedChannel {
    pub fn new(full_scale: i32, period_secs: f64, phase: f64, seed: u64) -> Self {
        Self {
            full_scale,
            period_secs,
            phase,
            epoch: Instant::now(),
            noise: NoiseGenerator::new(seed),
        }
    }

    /// A bank of `count` channels with staggered periods and phases
    pub fn bank(count: usize, full_scale: i32, seed: u64) -> Vec<Self> {
        (0..count)
            .map(|i| {
                let period = 2.0 + 0.37 * i as f64;
                let phase = TAU * i as f64 / count as f64;
                // Per-channel seed so channels don't share a noise sequence
                let channel_seed = if seed == 0 { 0 } else { seed.wrapping_add(i as u64) };
                Self::new(full_scale, period, phase, channel_seed)
            })
            .collect()
    }

    fn value_at(&mut self, elapsed_secs: f64) -> i32 {
        let fs = self.full_scale as f64;
        let level = 0.5 - 0.5 * (TAU * elapsed_secs / self.period_secs + self.phase).cos();
        let raw = level * fs + self.noise.gaussian(fs * NOISE_FRACTION);
        raw.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }
}

impl AnalogChannel for SimulatedChannel {
    fn read(&mut self) -> Result<i32> {
        let elapsed = self.epoch.elapsed().as_secs_f64();
        Ok(self.value_at(elapsed))
    }
}
