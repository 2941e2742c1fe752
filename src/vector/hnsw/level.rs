//! Top-layer sampling for new nodes

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Draws node levels from `floor(-ln(U) * mL)`, capped at `max_level`.
///
/// The random source is injected so that graph construction is reproducible.
pub struct LevelSampler {
    rng: Box<dyn RngCore + Send>,
    multiplier: f64,
    max_level: usize,
}

impl LevelSampler {
    pub fn new(rng: impl RngCore + Send + 'static, multiplier: f64, max_level: usize) -> Self {
        Self {
            rng: Box::new(rng),
            multiplier,
            max_level,
        }
    }

    pub fn seeded(seed: u64, multiplier: f64, max_level: usize) -> Self {
        Self::new(StdRng::seed_from_u64(seed), multiplier, max_level)
    }

    pub fn from_entropy(multiplier: f64, max_level: usize) -> Self {
        Self::new(StdRng::from_entropy(), multiplier, max_level)
    }

    pub fn sample(&mut self) -> usize {
        // gen() is in [0, 1); flip to (0, 1] so ln is finite
        let u = 1.0 - self.rng.gen::<f64>();
        let level = (-u.ln() * self.multiplier).floor() as usize;
        level.min(self.max_level)
    }
}

impl std::fmt::Debug for LevelSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelSampler")
            .field("multiplier", &self.multiplier)
            .field("max_level", &self.max_level)
            .finish()
    }
}
