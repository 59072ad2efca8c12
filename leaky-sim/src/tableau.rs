//! The seam between the trajectory engine and the stabilizer-tableau
//! simulator it delegates computational-subspace evolution to.

use crate::circuit::{GateTarget, GateType};
use crate::errors::{Error, Result};
use crate::rng::RandGen;

/// The contract the trajectory engine requires from a stabilizer simulator.
///
/// Implementations evolve a tableau over the computational subspace, keep an
/// ordered 0/1 measurement record, and reset in place between trajectories.
/// All randomness must come from the `rng` handed to [`apply`](Self::apply)
/// so that seeded trajectories stay reproducible.
///
/// [`ChpBackend`] is the reference implementation; a mock that records gate
/// calls is enough to test the engine's dispatch logic.
pub trait TableauBackend {
    /// The register size.
    fn num_qubits(&self) -> usize;

    /// Apply one instruction: `gate` with numeric `args` on `targets`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedBasis`] for non-Z-basis measurements or resets,
    /// [`Error::BadArgument`] for malformed arguments.
    fn apply(
        &mut self,
        gate: GateType,
        args: &[f64],
        targets: &[GateTarget],
        rng: &mut RandGen,
    ) -> Result<()>;

    /// The measurement record, in the order measurement targets were applied.
    fn measurement_record(&self) -> &[bool];

    /// Return to the all-zero state and empty record without reallocating.
    fn clear(&mut self);
}

/// Reference backend: a CHP destabilizer/stabilizer tableau from
/// [`stab_core`] plus the ordered measurement record.
#[derive(Clone, Debug)]
pub struct ChpBackend {
    tableau: stab_core::Tableau,
    record: Vec<bool>,
}

impl ChpBackend {
    #[must_use]
    pub fn new(num_qubits: usize) -> Self {
        ChpBackend {
            tableau: stab_core::Tableau::new(num_qubits),
            record: Vec::new(),
        }
    }

    fn noise_probability(gate: GateType, args: &[f64]) -> Result<f64> {
        match args {
            [probability] if (0.0..=1.0).contains(probability) => Ok(*probability),
            _ => Err(Error::BadArgument(format!(
                "{gate} takes a single probability argument in [0, 1], got {args:?}"
            ))),
        }
    }
}

impl TableauBackend for ChpBackend {
    fn num_qubits(&self) -> usize {
        self.tableau.qubit_count()
    }

    fn apply(
        &mut self,
        gate: GateType,
        args: &[f64],
        targets: &[GateTarget],
        rng: &mut RandGen,
    ) -> Result<()> {
        use GateType::*;
        match gate {
            I => {}
            X | Y | Z | H | S | SDag | SqrtX | SqrtXDag | SqrtY | SqrtYDag => {
                for target in targets {
                    let qubit = target.qubit_value() as usize;
                    match gate {
                        X => self.tableau.apply_x(qubit),
                        Y => self.tableau.apply_y(qubit),
                        Z => self.tableau.apply_z(qubit),
                        H => self.tableau.apply_h(qubit),
                        S => self.tableau.apply_s(qubit),
                        SDag => self.tableau.apply_s_dag(qubit),
                        SqrtX => self.tableau.apply_sqrt_x(qubit),
                        SqrtXDag => self.tableau.apply_sqrt_x_dag(qubit),
                        SqrtY => self.tableau.apply_sqrt_y(qubit),
                        _ => self.tableau.apply_sqrt_y_dag(qubit),
                    }
                }
            }
            Cx | Cz | Swap => {
                for pair in targets.chunks(2) {
                    let [a, b] = pair else {
                        return Err(Error::ShapeMismatch {
                            expected: 2,
                            actual: pair.len(),
                        });
                    };
                    let a = a.qubit_value() as usize;
                    let b = b.qubit_value() as usize;
                    match gate {
                        Cx => self.tableau.apply_cx(a, b),
                        Cz => self.tableau.apply_cz(a, b),
                        _ => self.tableau.apply_swap(a, b),
                    }
                }
            }
            M => {
                for target in targets {
                    let outcome = self.tableau.measure(target.qubit_value() as usize, rng);
                    self.record.push(outcome ^ target.is_inverted());
                }
            }
            R => {
                for target in targets {
                    self.tableau.reset(target.qubit_value() as usize, rng);
                }
            }
            Mr => {
                for target in targets {
                    let outcome = self.tableau.measure_reset(target.qubit_value() as usize, rng);
                    self.record.push(outcome ^ target.is_inverted());
                }
            }
            XError | YError | ZError | Depolarize1 => {
                let probability = Self::noise_probability(gate, args)?;
                for target in targets {
                    let qubit = target.qubit_value() as usize;
                    match gate {
                        XError => self.tableau.x_error(qubit, probability, rng),
                        YError => self.tableau.y_error(qubit, probability, rng),
                        ZError => self.tableau.z_error(qubit, probability, rng),
                        _ => self.tableau.depolarize1(qubit, probability, rng),
                    }
                }
            }
            Depolarize2 => {
                let probability = Self::noise_probability(gate, args)?;
                for pair in targets.chunks(2) {
                    let [a, b] = pair else {
                        return Err(Error::ShapeMismatch {
                            expected: 2,
                            actual: pair.len(),
                        });
                    };
                    self.tableau.depolarize2(
                        a.qubit_value() as usize,
                        b.qubit_value() as usize,
                        probability,
                        rng,
                    );
                }
            }
            Mx | My | Rx | Ry | Mrx | Mry | Mpp => {
                return Err(Error::UnsupportedBasis(gate));
            }
        }
        Ok(())
    }

    fn measurement_record(&self) -> &[bool] {
        &self.record
    }

    fn clear(&mut self) {
        self.tableau.clear();
        self.record.clear();
    }
}
