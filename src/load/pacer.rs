//! Arrival-interval generation for throughput mode.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MIN_RATE: f64 = 0.001;
const MAX_WAIT_SECS: f64 = 60.0;

/// Produces successive inter-arrival waits for a target rate. Uniform
/// gaps fire at a fixed interval; exponential gaps approximate a Poisson
/// arrival process. A linear ramp scales the rate up from zero over the
/// configured warmup window.
#[derive(Debug)]
pub struct Pacer {
    rate: f64,
    uniform: bool,
    ramp: Duration,
    rng: StdRng,
}

impl Pacer {
    /// `rate` must be positive; callers validate before constructing.
    #[must_use]
    pub fn new(rate: f64, uniform: bool, ramp: Duration) -> Self {
        Self {
            rate,
            uniform,
            ramp,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic variant for tests.
    #[must_use]
    pub fn seeded(rate: f64, uniform: bool, ramp: Duration, seed: u64) -> Self {
        Self {
            rate,
            uniform,
            ramp,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Wait before the next arrival, given the time elapsed since the
    /// run started.
    #[expect(clippy::float_arithmetic, reason = "arrival-process sampling")]
    pub fn next_wait(&mut self, elapsed: Duration) -> Duration {
        let interval = 1.0 / self.effective_rate(elapsed);
        let seconds = if self.uniform {
            interval
        } else {
            // inverse-CDF sample of the exponential distribution
            let draw: f64 = self.rng.gen_range(f64::EPSILON..1.0);
            -draw.ln() * interval
        };
        Duration::from_secs_f64(seconds.clamp(0.0, MAX_WAIT_SECS))
    }

    #[expect(clippy::float_arithmetic, reason = "linear ramp interpolation")]
    fn effective_rate(&self, elapsed: Duration) -> f64 {
        if self.ramp.is_zero() || elapsed >= self.ramp {
            return self.rate.max(MIN_RATE);
        }
        let fraction = elapsed.as_secs_f64() / self.ramp.as_secs_f64();
        (self.rate * fraction).max(MIN_RATE)
    }
}
