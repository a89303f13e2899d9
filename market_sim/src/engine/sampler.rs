//! Sources of the uniform sample driving each price move.
use rand::Rng;

/// Yields one uniform sample in `[0, 1)` per instrument per cycle.
pub trait PriceSampler: Send {
    /// Draw the next sample.
    fn sample(&mut self) -> f64;
}

/// Samples from the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl PriceSampler for ThreadRngSampler {
    fn sample(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct FixedSampler {
    samples: Vec<f64>,
    next: usize,
}

impl FixedSampler {
    /// Creates a sampler over `samples`; an empty list always yields `0.5`.
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples, next: 0 }
    }
}

impl PriceSampler for FixedSampler {
    fn sample(&mut self) -> f64 {
        if self.samples.is_empty() {
            return 0.5;
        }
        let value = self.samples[self.next % self.samples.len()];
        self.next = self.next.wrapping_add(1);
        value
    }
}
