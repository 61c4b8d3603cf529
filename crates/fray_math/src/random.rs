use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// A per-worker random number generator.
///
/// Construction is not free; workers obtain theirs once via [`Random::pool`]
/// and keep it for the whole render, so the hot path never locks.
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build `count` engines from a single seed by chain warm-up: each
    /// engine is seeded with a raw draw from its predecessor, so every slot
    /// produces a distinct, reproducible sequence.
    pub fn pool(seed: u64, count: usize) -> Vec<Random> {
        let mut engines = Vec::with_capacity(count);
        let mut next_seed = seed;
        for _ in 0..count {
            let mut engine = Random::new(next_seed);
            next_seed = engine.rng.next_u64();
            engines.push(engine);
        }
        engines
    }

    /// A random float in [0, 1).
    #[inline]
    pub fn randfloat(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    /// Same as `randfloat`, in double precision.
    #[inline]
    pub fn randdouble(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// A random integer in [a..=b]; a and b may be negative.
    #[inline]
    pub fn randint(&mut self, a: i64, b: i64) -> i64 {
        self.rng.gen_range(a..=b)
    }

    /// A uniform point in the unit disc (x² + y² <= 1), by rejection.
    pub fn unit_disc_sample(&mut self) -> (f64, f64) {
        loop {
            let x = self.randdouble() * 2.0 - 1.0;
            let y = self.randdouble() * 2.0 - 1.0;
            if x * x + y * y <= 1.0 {
                return (x, y);
            }
        }
    }
}
