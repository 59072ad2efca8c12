//! Uniform random source for trajectory sampling.
//!
//! Every stochastic choice in the crate — channel sampling, tableau
//! measurement outcomes, noise draws, and random readout projection — goes
//! through a single per-engine [`RandGen`] stream, so seeding an engine makes
//! its trajectories bit-reproducible.
//!
//! Thread-safety policy: engines are single-threaded and own their stream.
//! The only process-wide state is the default-seed factory configured by
//! [`set_seed`] / [`randomize`], which is mutex-guarded; engines created
//! without an explicit seed consume the current default and advance it by
//! one, so consecutive constructions are reproducible without being
//! identical.

use std::sync::Mutex;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::errors::{Error, Result};

static DEFAULT_SEED: Mutex<Option<u64>> = Mutex::new(None);

/// Make engines constructed without an explicit seed start from `seed`.
pub fn set_seed(seed: u64) {
    *DEFAULT_SEED.lock().expect("default-seed lock poisoned") = Some(seed);
}

/// Revert engines constructed without an explicit seed to OS entropy.
pub fn randomize() {
    *DEFAULT_SEED.lock().expect("default-seed lock poisoned") = None;
}

fn next_default_seed() -> Option<u64> {
    let mut slot = DEFAULT_SEED.lock().expect("default-seed lock poisoned");
    let seed = *slot;
    if let Some(seed) = seed {
        *slot = Some(seed.wrapping_add(1));
    }
    seed
}

/// A seedable uniform random generator with 64-bit state.
#[derive(Clone, Debug)]
pub struct RandGen {
    rng: SmallRng,
}

impl RandGen {
    /// Seed from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        RandGen {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Seed deterministically.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        RandGen {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seed from the process-wide default configured by [`set_seed`], or from
    /// OS entropy when no default is set.
    #[must_use]
    pub fn from_default_seed() -> Self {
        match next_default_seed() {
            Some(seed) => RandGen::seeded(seed),
            None => RandGen::from_entropy(),
        }
    }

    /// Draw a float uniformly from the half-open interval `[from, to)`.
    ///
    /// Returns `from` when the interval is empty (`from == to`).
    ///
    /// # Errors
    ///
    /// [`Error::BadArgument`] when `from > to` or either bound is not finite.
    pub fn rand_float(&mut self, from: f64, to: f64) -> Result<f64> {
        if !from.is_finite() || !to.is_finite() || from > to {
            return Err(Error::BadArgument(format!(
                "invalid uniform range [{from}, {to})"
            )));
        }
        Ok(self.uniform(from, to))
    }

    // Hot-path draw with the range already validated.
    pub(crate) fn uniform(&mut self, from: f64, to: f64) -> f64 {
        debug_assert!(from <= to);
        if from == to {
            return from;
        }
        self.rng.gen_range(from..to)
    }
}

impl RngCore for RandGen {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
