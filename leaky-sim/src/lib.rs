//! Monte Carlo simulation of stabilizer circuits with incoherent leakage.
//!
//! `leaky-sim` extends stabilizer-circuit simulation with classical,
//! per-trajectory tracking of *leakage*: population escaping the
//! computational two-level space {|0⟩, |1⟩} of a qubit into higher levels
//! (|2⟩, |3⟩, …). Leakage moves are described by [`LeakyPauliChannel`]
//! tables — samplable stochastic maps from joint leakage statuses to
//! (new status, residual Pauli) outcomes — calibrated from device
//! characterization.
//!
//! # Overview
//!
//! - [`LeakageStatus`]: per-qubit level codes (0 = computational, k ≥ 1 =
//!   level |k+1⟩).
//! - [`LeakyPauliChannel`]: a table of transitions with per-row cumulative
//!   probabilities, validated by
//!   [`safety_check`](LeakyPauliChannel::safety_check).
//! - [`Simulator`]: the trajectory engine. It interprets a [`Circuit`] one
//!   instruction at a time, delegating computational-subspace evolution to a
//!   stabilizer tableau behind the [`TableauBackend`] trait, intercepting
//!   `leaky<k>`-tagged identity instructions, and recording a leakage mask
//!   per measurement.
//! - [`Sampler`]: compiles a circuit once and replays it for many
//!   independent trajectories, projecting each record into u8 labels under a
//!   [`ReadoutStrategy`].
//!
//! # Quick Start
//!
//! ```
//! use leaky_sim::{Circuit, GateType, LeakyPauliChannel, ReadoutStrategy, Sampler};
//!
//! // 1% leak-up on an otherwise resting qubit.
//! let mut channel = LeakyPauliChannel::new(1);
//! channel
//!     .add_transition([0].into(), [0].into(), "I".parse().unwrap(), 0.99)
//!     .unwrap();
//! channel
//!     .add_transition([0].into(), [1].into(), "I".parse().unwrap(), 0.01)
//!     .unwrap();
//! channel
//!     .add_transition([1].into(), [1].into(), "I".parse().unwrap(), 1.0)
//!     .unwrap();
//! channel.safety_check().unwrap();
//!
//! let mut circuit = Circuit::new();
//! circuit.append(GateType::H, &[0]);
//! circuit.append(GateType::Cx, &[0, 1]);
//! circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
//! circuit.append(GateType::M, &[0, 1]);
//!
//! let mut sampler = Sampler::with_seed(2, vec![channel], 42);
//! let records = sampler
//!     .sample(&circuit, 1000, ReadoutStrategy::RawLabel)
//!     .unwrap();
//! // Labels ≥ 2 mark measurements of a leaked qubit.
//! assert_eq!(records.shots(), 1000);
//! ```
//!
//! # Semantics at the subspace boundary
//!
//! Transitions are classified per qubit as R (rest), U (leak up), D (decay
//! down), or L (lateral). R applies the outcome's residual Pauli; U
//! randomizes the amplitude with `X_ERROR(0.5)` and then tracks the qubit
//! only through its leakage status (any later ideal gate touching it is
//! skipped); D resets the tableau qubit and randomizes, giving the correct
//! post-decay marginal; L touches nothing in the tableau.
//!
//! # Reproducibility
//!
//! Every stochastic choice — channel sampling, measurement outcomes, noise,
//! random readout projection — draws from one per-engine stream, so
//! [`Simulator::with_seed`] and [`Sampler::with_seed`] make runs
//! bit-identical. The free functions [`set_seed`] / [`randomize`] configure
//! the default-seed factory used by engines constructed without an explicit
//! seed.

pub mod channel;
pub mod circuit;
pub mod errors;
pub mod readout;
pub mod rng;
pub mod sampler;
pub mod simulator;
#[cfg(test)]
pub(crate) mod statistical_testing;
pub mod status;
pub mod tableau;

pub use channel::{
    LeakyPauliChannel, PauliOp, PauliString, Transition, TransitionType, PROBABILITY_TOLERANCE,
};
pub use circuit::{Circuit, CircuitOp, GateTarget, GateType, Instruction};
pub use errors::{Error, Result};
pub use readout::ReadoutStrategy;
pub use rng::{randomize, set_seed, RandGen};
pub use sampler::{RecordMatrix, Sampler};
pub use simulator::Simulator;
pub use status::{LeakageStatus, MAX_LEVEL_CODE};
pub use tableau::{ChpBackend, TableauBackend};
