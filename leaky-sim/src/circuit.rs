//! Circuit representation: gates, targets, instructions, and repeat blocks.
//!
//! This is the instruction-stream shape the trajectory engine consumes.
//! Parsing circuits from text is out of scope; circuits are built
//! programmatically with the helpers on [`Circuit`].

use std::fmt;
use std::str::FromStr;

use derive_more::Display;

use crate::errors::{Error, Result};

/// The gate alphabet understood by the engine.
///
/// Includes the Z-basis measurement/reset family, the unitary gates the
/// tableau backend must support, the standard probabilistic Pauli noise
/// channels, and the non-Z-basis gates that are recognized only to be
/// rejected with [`Error::UnsupportedBasis`].
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GateType {
    I,
    X,
    Y,
    Z,
    H,
    S,
    #[display("S_DAG")]
    SDag,
    #[display("SQRT_X")]
    SqrtX,
    #[display("SQRT_X_DAG")]
    SqrtXDag,
    #[display("SQRT_Y")]
    SqrtY,
    #[display("SQRT_Y_DAG")]
    SqrtYDag,
    #[display("CX")]
    Cx,
    #[display("CZ")]
    Cz,
    #[display("SWAP")]
    Swap,
    M,
    R,
    #[display("MR")]
    Mr,
    #[display("MX")]
    Mx,
    #[display("MY")]
    My,
    #[display("RX")]
    Rx,
    #[display("RY")]
    Ry,
    #[display("MRX")]
    Mrx,
    #[display("MRY")]
    Mry,
    #[display("MPP")]
    Mpp,
    #[display("X_ERROR")]
    XError,
    #[display("Y_ERROR")]
    YError,
    #[display("Z_ERROR")]
    ZError,
    #[display("DEPOLARIZE1")]
    Depolarize1,
    #[display("DEPOLARIZE2")]
    Depolarize2,
}

impl GateType {
    /// True for Clifford gates the tableau backend applies as unitaries.
    #[must_use]
    pub fn is_unitary(self) -> bool {
        use GateType::*;
        matches!(
            self,
            I | X | Y | Z | H | S | SDag | SqrtX | SqrtXDag | SqrtY | SqrtYDag | Cx | Cz | Swap
        )
    }

    /// True when the gate acts on one qubit per target.
    #[must_use]
    pub fn is_single_qubit(self) -> bool {
        self.arity() == 1
    }

    /// Number of qubits per target group (1 or 2).
    #[must_use]
    pub fn arity(self) -> usize {
        use GateType::*;
        match self {
            Cx | Cz | Swap | Depolarize2 => 2,
            _ => 1,
        }
    }

    /// True when the gate appends to the measurement record.
    #[must_use]
    pub fn produces_measurements(self) -> bool {
        use GateType::*;
        matches!(self, M | Mr | Mx | My | Mrx | Mry | Mpp)
    }

    /// True when the gate resets its targets.
    #[must_use]
    pub fn is_reset(self) -> bool {
        use GateType::*;
        matches!(self, R | Mr | Rx | Ry | Mrx | Mry)
    }

    /// True for probabilistic noise channels.
    #[must_use]
    pub fn is_noise(self) -> bool {
        use GateType::*;
        matches!(self, XError | YError | ZError | Depolarize1 | Depolarize2)
    }
}

impl FromStr for GateType {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        use GateType::*;
        Ok(match name {
            "I" => I,
            "X" => X,
            "Y" => Y,
            "Z" => Z,
            "H" | "H_XZ" => H,
            "S" | "SQRT_Z" => S,
            "S_DAG" | "SQRT_Z_DAG" => SDag,
            "SQRT_X" => SqrtX,
            "SQRT_X_DAG" => SqrtXDag,
            "SQRT_Y" => SqrtY,
            "SQRT_Y_DAG" => SqrtYDag,
            "CX" | "CNOT" | "ZCX" => Cx,
            "CZ" | "ZCZ" => Cz,
            "SWAP" => Swap,
            "M" | "MZ" => M,
            "R" | "RZ" => R,
            "MR" | "MRZ" => Mr,
            "MX" => Mx,
            "MY" => My,
            "RX" => Rx,
            "RY" => Ry,
            "MRX" => Mrx,
            "MRY" => Mry,
            "MPP" => Mpp,
            "X_ERROR" => XError,
            "Y_ERROR" => YError,
            "Z_ERROR" => ZError,
            "DEPOLARIZE1" => Depolarize1,
            "DEPOLARIZE2" => Depolarize2,
            other => {
                return Err(Error::BadArgument(format!("unknown gate name {other:?}")));
            }
        })
    }
}

const INVERTED_BIT: u32 = 1 << 31;

/// A qubit target, optionally carrying an inversion flag.
///
/// Inversion is meaningful on measurement gates only, where it flips the
/// recorded bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GateTarget {
    data: u32,
}

impl GateTarget {
    /// A plain qubit target.
    #[must_use]
    pub fn qubit(index: u32) -> Self {
        debug_assert_eq!(index & INVERTED_BIT, 0);
        GateTarget { data: index }
    }

    /// A qubit target whose measurement result is recorded inverted.
    #[must_use]
    pub fn inverted_qubit(index: u32) -> Self {
        GateTarget {
            data: index | INVERTED_BIT,
        }
    }

    /// The qubit index with flags stripped.
    #[must_use]
    pub fn qubit_value(self) -> u32 {
        self.data & !INVERTED_BIT
    }

    #[must_use]
    pub fn is_inverted(self) -> bool {
        self.data & INVERTED_BIT != 0
    }
}

impl From<u32> for GateTarget {
    fn from(index: u32) -> Self {
        GateTarget::qubit(index)
    }
}

/// One instruction: a gate, its targets, numeric arguments, and an optional
/// free-form tag.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub gate: GateType,
    pub targets: Vec<GateTarget>,
    pub args: Vec<f64>,
    pub tag: String,
}

impl Instruction {
    #[must_use]
    pub fn new(gate: GateType, targets: Vec<GateTarget>, args: Vec<f64>) -> Self {
        Instruction {
            gate,
            targets,
            args,
            tag: String::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.gate)?;
        if !self.tag.is_empty() {
            write!(f, "[{}]", self.tag)?;
        }
        if !self.args.is_empty() {
            write!(f, "(")?;
            for (index, arg) in self.args.iter().enumerate() {
                if index > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ")")?;
        }
        for target in &self.targets {
            if target.is_inverted() {
                write!(f, " !{}", target.qubit_value())?;
            } else {
                write!(f, " {}", target.qubit_value())?;
            }
        }
        Ok(())
    }
}

/// A circuit element: a plain instruction or a nested repeat block.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CircuitOp {
    Instruction(Instruction),
    Repeat { repetitions: u64, body: Circuit },
}

/// An ordered instruction stream with nestable repeat blocks.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Circuit {
    ops: Vec<CircuitOp>,
}

impl Circuit {
    #[must_use]
    pub fn new() -> Self {
        Circuit::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Circuit {
            ops: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.ops.push(CircuitOp::Instruction(instruction));
    }

    /// Append `gate` on plain qubit targets with no arguments.
    pub fn append(&mut self, gate: GateType, qubits: &[u32]) {
        self.push(Instruction::new(
            gate,
            qubits.iter().copied().map(GateTarget::qubit).collect(),
            Vec::new(),
        ));
    }

    /// Append `gate` with numeric arguments (noise probabilities).
    pub fn append_with_args(&mut self, gate: GateType, args: &[f64], qubits: &[u32]) {
        self.push(Instruction::new(
            gate,
            qubits.iter().copied().map(GateTarget::qubit).collect(),
            args.to_vec(),
        ));
    }

    /// Append a tagged `gate` (e.g. a `leaky<k>`-annotated identity).
    pub fn append_tagged(&mut self, gate: GateType, tag: &str, qubits: &[u32]) {
        self.push(Instruction::new(
            gate,
            qubits.iter().copied().map(GateTarget::qubit).collect(),
            Vec::new(),
        ).with_tag(tag));
    }

    /// Append `body` repeated `repetitions` times.
    pub fn repeat(&mut self, repetitions: u64, body: Circuit) {
        self.ops.push(CircuitOp::Repeat { repetitions, body });
    }

    pub fn iter(&self) -> impl Iterator<Item = &CircuitOp> {
        self.ops.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total number of measurement-record entries one execution produces.
    #[must_use]
    pub fn num_measurements(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                CircuitOp::Instruction(instruction) => {
                    if instruction.gate.produces_measurements() {
                        instruction.targets.len()
                    } else {
                        0
                    }
                }
                CircuitOp::Repeat { repetitions, body } => {
                    body.num_measurements() * usize::try_from(*repetitions).unwrap_or(usize::MAX)
                }
            })
            .sum()
    }

    /// The largest qubit index referenced, or `None` for an empty circuit.
    #[must_use]
    pub fn max_qubit(&self) -> Option<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                CircuitOp::Instruction(instruction) => instruction
                    .targets
                    .iter()
                    .map(|target| target.qubit_value())
                    .max(),
                CircuitOp::Repeat { body, .. } => body.max_qubit(),
            })
            .max()
    }
}

/// Extract the channel index from a `leaky<k>` tag.
///
/// The leftmost `leaky<` occurrence is the one validated: it must be
/// followed by one or more base-10 digits and a closing `>`. Malformed
/// forms (`leaky<`, `leaky<x>`, unterminated) yield `None`, as does any
/// other tag content.
#[must_use]
pub(crate) fn leaky_tag_index(tag: &str) -> Option<usize> {
    let start = tag.find("leaky<")? + "leaky<".len();
    let rest = &tag[start..];
    let end = rest.find('>')?;
    let digits = &rest[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
