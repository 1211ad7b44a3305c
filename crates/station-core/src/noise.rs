use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random-source seam for the physical model and fault injection.
///
/// The simulation never touches a global RNG; everything randomized goes
/// through this trait so a run can be replayed from a seed and tests can
/// substitute [`NoNoise`].
pub trait Perturbation: Send {
    /// Uniform draw from `[lo, hi)`.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64;
}

/// Seeded generator used by the real simulation.
pub struct SeededNoise {
    rng: StdRng,
}

impl SeededNoise {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Perturbation for SeededNoise {
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        self.rng.gen_range(lo..hi)
    }
}

/// Deterministic stand-in returning the interval midpoint.
///
/// Centers every noise band on zero and, because the midpoint of
/// `[0, 1)` is far above any sane fault probability, never injects a
/// fault.
pub struct NoNoise;

impl Perturbation for NoNoise {
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        (lo + hi) / 2.0
    }
}
