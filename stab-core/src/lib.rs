//! CHP-style stabilizer simulation for Clifford circuits.
//!
//! `stab-core` implements the Aaronson–Gottesman destabilizer/stabilizer
//! tableau: a state on `n` qubits is identified by the `n` Pauli operators
//! that stabilize it, together with `n` complementary destabilizers, stored
//! as bit-packed X/Z indicator rows with a phase vector. Clifford gates act
//! as O(n) column updates and Z-basis measurements as O(n²) row reductions,
//! so Clifford circuits simulate in polynomial time.
//!
//! # Quick Start
//!
//! ```
//! use rand::rngs::SmallRng;
//! use rand::SeedableRng;
//! use stab_core::Tableau;
//!
//! let mut rng = SmallRng::seed_from_u64(42);
//! let mut tableau = Tableau::new(2);
//!
//! // Prepare a Bell pair and measure both halves.
//! tableau.apply_h(0);
//! tableau.apply_cx(0, 1);
//! let a = tableau.measure(0, &mut rng);
//! let b = tableau.measure(1, &mut rng);
//! assert_eq!(a, b);
//! ```
//!
//! Randomness is always drawn from a caller-supplied [`rand::Rng`], so a
//! seeded generator makes entire circuits reproducible.

pub mod tableau;

pub use tableau::Tableau;
