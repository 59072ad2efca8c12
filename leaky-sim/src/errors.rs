//! Error kinds surfaced to callers.
//!
//! Every failure is fatal to the in-progress call and leaves no partially
//! applied channel or gate behind, with one documented exception: leakage
//! mask entries already pushed before a measurement-stage failure remain in
//! the log, so callers should [`clear`](crate::Simulator::clear) the
//! simulator after any error.

use thiserror::Error;

use crate::circuit::GateType;

/// Alias for results carrying [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// A status, Pauli string, target group, or record buffer has the wrong
    /// length.
    #[error("expected length {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Adding a transition would push a row's cumulative probability above 1.
    #[error("probabilities for initial status {status} sum to {total}, which exceeds 1")]
    OverUnity { status: String, total: f64 },

    /// A safety check found a row whose probabilities do not sum to 1.
    #[error("probabilities for initial status {status} sum to {total}, expected 1")]
    NotStochastic { status: String, total: f64 },

    /// A safety check found a residual Pauli on a qubit that does not stay
    /// in the computational subspace.
    #[error("transition {from} -> {to} carries Pauli {pauli} on a non-computational qubit")]
    PauliOnNonR {
        from: String,
        to: String,
        pauli: String,
    },

    /// A `leaky<k>` tag referenced a channel index that is not bound.
    #[error("leaky channel index {index} is out of range: {bound} channels bound")]
    UnknownChannel { index: usize, bound: usize },

    /// A measurement or reset outside the Z basis, or a joint Pauli-product
    /// measurement.
    #[error("only Z basis measurements and resets are supported, got {0}")]
    UnsupportedBasis(GateType),

    /// The circuit references a qubit beyond the simulator's capacity.
    #[error("circuit references qubit {qubit} but the simulator has {capacity} qubits")]
    TooManyQubits { qubit: u32, capacity: usize },

    /// An unrecognized readout-strategy code.
    #[error("unrecognized readout strategy code {0}")]
    BadStrategy(u8),

    /// A malformed argument: inverted random range, probability outside
    /// [0, 1], duplicate transition, unknown gate name, and similar misuse.
    #[error("{0}")]
    BadArgument(String),
}
