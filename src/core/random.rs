//! Seeded random number generation.
//!
//! Every randomized filter draws from a [`RandomStream`]. Seeding the stream
//! with the same value and making the same sequence of draws reproduces the
//! same numbers bit for bit, which is what makes filter actions replayable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// A reproducible pseudo-random stream with a 32-bit seed.
///
/// The stream is not shared between threads. Filters draw whatever per-row
/// or per-tile values they need on the calling thread before dispatching
/// work.
#[derive(Clone)]
pub struct RandomStream {
    seed: u32,
    rng: StdRng,
}

impl RandomStream {
    /// Create a stream seeded from a non-deterministic source.
    pub fn new() -> Self {
        Self::with_seed(Self::non_deterministic_seed())
    }

    /// Create a stream with a fixed seed.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed as u64),
        }
    }

    /// Restart the stream from `seed`.
    pub fn seed(&mut self, seed: u32) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed as u64);
    }

    /// Restart the stream from its current seed.
    pub fn reseed(&mut self) {
        self.seed(self.seed);
    }

    /// The seed the stream was last started from.
    pub fn current_seed(&self) -> u32 {
        self.seed
    }

    /// A seed drawn from the operating system's entropy source.
    pub fn non_deterministic_seed() -> u32 {
        rand::thread_rng().gen()
    }

    /// Uniform integer in `[min, max]`, bounds inclusive.
    pub fn number(&mut self, min: i32, max: i32) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.gen_range(lo..=hi)
    }

    /// Uniform real in `[min, max)`. Returns `min` for an empty interval.
    pub fn number_f64(&mut self, min: f64, max: f64) -> f64 {
        if min.is_nan() || max.is_nan() || min >= max {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    /// `true` with the given probability.
    pub fn yes_or_no(&mut self, probability: f64) -> bool {
        let p = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self.rng.gen_bool(p)
    }

    /// Normally distributed value with mean 0 and deviation `sigma`.
    ///
    /// Box-Muller transform, always consuming exactly two uniform draws.
    pub fn gaussian(&mut self, sigma: f64) -> f64 {
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * sigma
    }

    /// Draw a seed for a derived stream.
    pub fn next_seed(&mut self) -> u32 {
        self.rng.gen()
    }
}

impl Default for RandomStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomStream")
            .field("seed", &self.seed)
            .finish()
    }
}
