//! The trajectory engine: interprets a circuit one instruction at a time,
//! tracking leakage classically and delegating computational-subspace
//! evolution to a tableau backend.

use smallvec::SmallVec;

use crate::channel::{LeakyPauliChannel, PauliOp, TransitionType};
use crate::circuit::{leaky_tag_index, Circuit, CircuitOp, GateTarget, GateType, Instruction};
use crate::errors::{Error, Result};
use crate::readout::ReadoutStrategy;
use crate::rng::RandGen;
use crate::status::LeakageStatus;
use crate::tableau::{ChpBackend, TableauBackend};

/// One pre-classified instruction: tag parsed, targets arity-grouped.
#[derive(Clone, Debug)]
pub(crate) enum Op {
    LeakyChannel {
        channel: usize,
        targets: Vec<u32>,
    },
    Measure {
        targets: Vec<GateTarget>,
    },
    Reset {
        targets: Vec<GateTarget>,
    },
    MeasureReset {
        targets: Vec<GateTarget>,
    },
    Noise {
        gate: GateType,
        args: Vec<f64>,
        targets: Vec<GateTarget>,
    },
    Unitary {
        gate: GateType,
        groups: Vec<SmallVec<[GateTarget; 2]>>,
    },
}

impl Op {
    fn measurement_count(&self) -> usize {
        match self {
            Op::Measure { targets } | Op::MeasureReset { targets } => targets.len(),
            _ => 0,
        }
    }
}

/// Classify one instruction, parsing its tag and splitting unitary targets
/// into arity-sized groups.
pub(crate) fn classify(instruction: &Instruction) -> Result<Op> {
    let gate = instruction.gate;
    if !gate.produces_measurements()
        && instruction.targets.iter().any(|target| target.is_inverted())
    {
        return Err(Error::BadArgument(format!(
            "inverted targets are only valid on measurement gates, not {gate}"
        )));
    }
    if gate == GateType::I {
        if let Some(channel) = leaky_tag_index(&instruction.tag) {
            return Ok(Op::LeakyChannel {
                channel,
                targets: instruction
                    .targets
                    .iter()
                    .map(|target| target.qubit_value())
                    .collect(),
            });
        }
    }
    Ok(match gate {
        GateType::M => Op::Measure {
            targets: instruction.targets.clone(),
        },
        GateType::R => Op::Reset {
            targets: instruction.targets.clone(),
        },
        GateType::Mr => Op::MeasureReset {
            targets: instruction.targets.clone(),
        },
        GateType::Mx
        | GateType::My
        | GateType::Rx
        | GateType::Ry
        | GateType::Mrx
        | GateType::Mry
        | GateType::Mpp => return Err(Error::UnsupportedBasis(gate)),
        gate if gate.is_noise() => {
            if instruction.targets.len() % gate.arity() != 0 {
                return Err(Error::ShapeMismatch {
                    expected: gate.arity(),
                    actual: instruction.targets.len(),
                });
            }
            Op::Noise {
                gate,
                args: instruction.args.clone(),
                targets: instruction.targets.clone(),
            }
        }
        gate => {
            let arity = gate.arity();
            if instruction.targets.len() % arity != 0 {
                return Err(Error::ShapeMismatch {
                    expected: arity,
                    actual: instruction.targets.len(),
                });
            }
            Op::Unitary {
                gate,
                groups: instruction
                    .targets
                    .chunks_exact(arity)
                    .map(|group| group.iter().copied().collect())
                    .collect(),
            }
        }
    })
}

/// A circuit compiled to a flat op list: repeat blocks expanded and every
/// instruction classified exactly once, so the per-shot replay loop does no
/// tag parsing or target splitting.
#[derive(Clone, Debug, Default)]
pub(crate) struct Program {
    pub(crate) ops: Vec<Op>,
    pub(crate) num_measurements: usize,
    pub(crate) max_qubit: Option<u32>,
}

impl Program {
    pub(crate) fn compile(circuit: &Circuit) -> Result<Self> {
        let mut program = Program::default();
        program.append_circuit(circuit)?;
        Ok(program)
    }

    fn append_circuit(&mut self, circuit: &Circuit) -> Result<()> {
        for op in circuit.iter() {
            match op {
                CircuitOp::Instruction(instruction) => {
                    let target_max = instruction
                        .targets
                        .iter()
                        .map(|target| target.qubit_value())
                        .max();
                    let op = classify(instruction)?;
                    self.num_measurements += op.measurement_count();
                    self.max_qubit = self.max_qubit.max(target_max);
                    self.ops.push(op);
                }
                CircuitOp::Repeat { repetitions, body } => {
                    let block = Program::compile(body)?;
                    for _ in 0..*repetitions {
                        self.ops.extend(block.ops.iter().cloned());
                        self.num_measurements += block.num_measurements;
                    }
                    self.max_qubit = self.max_qubit.max(block.max_qubit);
                }
            }
        }
        Ok(())
    }
}

/// Stochastic trajectory simulator for stabilizer circuits with leakage.
///
/// The engine keeps a [`LeakageStatus`] for the whole register, a leakage
/// mask log aligned with the measurement record, a list of bound channels
/// addressed by `leaky<k>` tags, and an owned tableau backend for the
/// computational subspace. All stochastic choices flow through one
/// [`RandGen`] stream, so [`Simulator::with_seed`] makes whole trajectories
/// reproducible.
///
/// # Examples
///
/// ```
/// use leaky_sim::{Circuit, GateType, LeakyPauliChannel, ReadoutStrategy, Simulator};
///
/// // A channel that deterministically leaks its qubit.
/// let mut channel = LeakyPauliChannel::new(1);
/// channel
///     .add_transition([0].into(), [1].into(), "I".parse().unwrap(), 1.0)
///     .unwrap();
/// channel.safety_check().unwrap();
///
/// let mut circuit = Circuit::new();
/// circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
/// circuit.append(GateType::M, &[0]);
///
/// let mut simulator = Simulator::with_seed(1, vec![channel], 42);
/// simulator.do_circuit(&circuit).unwrap();
/// assert_eq!(
///     simulator.current_measurement_record(ReadoutStrategy::RawLabel),
///     vec![2]
/// );
/// ```
pub struct Simulator<B: TableauBackend = ChpBackend> {
    num_qubits: usize,
    leakage_status: LeakageStatus,
    leakage_masks: Vec<u8>,
    channels: Vec<LeakyPauliChannel>,
    tableau: B,
    rng: RandGen,
}

impl Simulator<ChpBackend> {
    /// Create an engine with the reference tableau backend, seeded from the
    /// process-wide default-seed factory (see [`crate::set_seed`]).
    #[must_use]
    pub fn new(num_qubits: usize, channels: Vec<LeakyPauliChannel>) -> Self {
        Simulator::with_backend(
            num_qubits,
            channels,
            ChpBackend::new(num_qubits),
            RandGen::from_default_seed(),
        )
    }

    /// Create an engine with a deterministic seed.
    #[must_use]
    pub fn with_seed(num_qubits: usize, channels: Vec<LeakyPauliChannel>, seed: u64) -> Self {
        Simulator::with_backend(
            num_qubits,
            channels,
            ChpBackend::new(num_qubits),
            RandGen::seeded(seed),
        )
    }
}

impl<B: TableauBackend> Simulator<B> {
    /// Create an engine over a caller-supplied backend and random stream.
    ///
    /// # Panics
    ///
    /// Panics when the backend's register size disagrees with `num_qubits`.
    #[must_use]
    pub fn with_backend(
        num_qubits: usize,
        channels: Vec<LeakyPauliChannel>,
        tableau: B,
        rng: RandGen,
    ) -> Self {
        assert_eq!(
            tableau.num_qubits(),
            num_qubits,
            "backend register size must match the engine"
        );
        Simulator {
            num_qubits,
            leakage_status: LeakageStatus::new(num_qubits),
            leakage_masks: Vec::new(),
            channels,
            tableau,
            rng,
        }
    }

    #[must_use]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The register's current leakage status.
    #[must_use]
    pub fn leakage_status(&self) -> &LeakageStatus {
        &self.leakage_status
    }

    /// The leakage mask log: one level code per measurement performed, in
    /// record order.
    #[must_use]
    pub fn leakage_masks(&self) -> &[u8] {
        &self.leakage_masks
    }

    /// The channels addressable by `leaky<k>` tags.
    #[must_use]
    pub fn channels(&self) -> &[LeakyPauliChannel] {
        &self.channels
    }

    /// Interpret a whole circuit, recursing into repeat blocks.
    ///
    /// # Errors
    ///
    /// Any classification or execution error; see [`enum@Error`].
    pub fn do_circuit(&mut self, circuit: &Circuit) -> Result<()> {
        for op in circuit.iter() {
            match op {
                CircuitOp::Instruction(instruction) => self.do_instruction(instruction)?,
                CircuitOp::Repeat { repetitions, body } => {
                    for _ in 0..*repetitions {
                        self.do_circuit(body)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Interpret a single instruction.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedBasis`] for non-Z-basis measurements/resets.
    /// - [`Error::UnknownChannel`] for an out-of-range `leaky<k>` tag.
    /// - [`Error::TooManyQubits`] for targets beyond the register.
    /// - [`Error::ShapeMismatch`] for target lists not divisible by arity.
    pub fn do_instruction(&mut self, instruction: &Instruction) -> Result<()> {
        let op = classify(instruction)?;
        self.run_op(&op)
    }

    /// Apply a leaky Pauli channel to `targets`, split into groups of the
    /// channel's width and processed left to right.
    ///
    /// A group whose joint status has no row in the channel ends the whole
    /// call: the remaining groups are skipped as well. Callers relying on
    /// partial rows should bind complete tables instead.
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeMismatch`] when `targets.len()` is not a multiple of
    ///   the channel width.
    /// - [`Error::TooManyQubits`] for targets beyond the register.
    pub fn apply_leaky_channel(
        &mut self,
        targets: &[u32],
        channel: &LeakyPauliChannel,
    ) -> Result<()> {
        self.check_qubits(targets.iter().copied())?;
        let Simulator {
            leakage_status,
            tableau,
            rng,
            ..
        } = self;
        apply_channel_groups(channel, targets, leakage_status, tableau, rng)
    }

    /// Reset the leakage status, the mask log, and the tableau backend to
    /// their initial state. Bound channels are kept.
    pub fn clear(&mut self) {
        self.leakage_status.clear();
        self.leakage_masks.clear();
        self.tableau.clear();
    }

    /// Project the measurement record into labels under `strategy`.
    ///
    /// RawLabel reports the tableau bit for computational positions and
    /// `code + 1` for leaked ones; the projection strategies report only
    /// 0/1.
    pub fn current_measurement_record(&mut self, strategy: ReadoutStrategy) -> Vec<u8> {
        let Simulator {
            leakage_masks,
            tableau,
            rng,
            ..
        } = self;
        let record = tableau.measurement_record();
        debug_assert_eq!(leakage_masks.len(), record.len());
        leakage_masks
            .iter()
            .zip(record)
            .map(|(&mask, &bit)| project(strategy, mask, bit, rng))
            .collect()
    }

    /// Project the measurement record into `buffer` under `strategy`.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] when `buffer` does not have exactly one slot
    /// per recorded measurement.
    pub fn append_measurement_record_into(
        &mut self,
        buffer: &mut [u8],
        strategy: ReadoutStrategy,
    ) -> Result<()> {
        let Simulator {
            leakage_masks,
            tableau,
            rng,
            ..
        } = self;
        let record = tableau.measurement_record();
        debug_assert_eq!(leakage_masks.len(), record.len());
        if buffer.len() != leakage_masks.len() {
            return Err(Error::ShapeMismatch {
                expected: leakage_masks.len(),
                actual: buffer.len(),
            });
        }
        for ((slot, &mask), &bit) in buffer.iter_mut().zip(leakage_masks.iter()).zip(record) {
            *slot = project(strategy, mask, bit, rng);
        }
        Ok(())
    }

    pub(crate) fn run_program(&mut self, program: &Program) -> Result<()> {
        for op in &program.ops {
            self.run_op(op)?;
        }
        Ok(())
    }

    fn run_op(&mut self, op: &Op) -> Result<()> {
        match op {
            Op::LeakyChannel { channel, targets } => {
                self.check_qubits(targets.iter().copied())?;
                let Simulator {
                    channels,
                    leakage_status,
                    tableau,
                    rng,
                    ..
                } = self;
                let channel = channels.get(*channel).ok_or(Error::UnknownChannel {
                    index: *channel,
                    bound: channels.len(),
                })?;
                apply_channel_groups(channel, targets, leakage_status, tableau, rng)
            }
            Op::Measure { targets } => {
                self.check_targets(targets)?;
                self.do_measurement(targets)
            }
            Op::Reset { targets } => {
                self.check_targets(targets)?;
                self.do_reset(targets)
            }
            Op::MeasureReset { targets } => {
                self.check_targets(targets)?;
                self.do_measurement(targets)?;
                self.do_reset(targets)
            }
            Op::Noise {
                gate,
                args,
                targets,
            } => {
                self.check_targets(targets)?;
                self.tableau.apply(*gate, args, targets, &mut self.rng)
            }
            Op::Unitary { gate, groups } => {
                for group in groups {
                    self.check_targets(group)?;
                    let leaked = group
                        .iter()
                        .any(|target| self.leakage_status.is_leaked(target.qubit_value() as usize));
                    // An ideal gate cannot act once any operand has left the
                    // computational subspace.
                    if !leaked {
                        self.tableau.apply(*gate, &[], group, &mut self.rng)?;
                    }
                }
                Ok(())
            }
        }
    }

    // Push the mask entries left to right, then let the backend append its
    // bits in the same order.
    fn do_measurement(&mut self, targets: &[GateTarget]) -> Result<()> {
        for target in targets {
            self.leakage_masks
                .push(self.leakage_status.get(target.qubit_value() as usize));
        }
        self.tableau
            .apply(GateType::M, &[], targets, &mut self.rng)
    }

    // Any leakage collapses to the computational subspace on reset.
    fn do_reset(&mut self, targets: &[GateTarget]) -> Result<()> {
        for target in targets {
            self.leakage_status.reset(target.qubit_value() as usize);
        }
        self.tableau
            .apply(GateType::R, &[], targets, &mut self.rng)
    }

    fn check_targets(&self, targets: &[GateTarget]) -> Result<()> {
        self.check_qubits(targets.iter().map(|target| target.qubit_value()))
    }

    fn check_qubits(&self, qubits: impl Iterator<Item = u32>) -> Result<()> {
        for qubit in qubits {
            if qubit as usize >= self.num_qubits {
                return Err(Error::TooManyQubits {
                    qubit,
                    capacity: self.num_qubits,
                });
            }
        }
        Ok(())
    }
}

fn project(strategy: ReadoutStrategy, mask: u8, bit: bool, rng: &mut RandGen) -> u8 {
    if mask == 0 {
        return u8::from(bit);
    }
    match strategy {
        ReadoutStrategy::RawLabel => mask + 1,
        ReadoutStrategy::RandomLeakageProjection => u8::from(rng.uniform(0.0, 1.0) >= 0.5),
        ReadoutStrategy::DeterministicLeakageProjection => 1,
    }
}

fn apply_channel_groups<B: TableauBackend>(
    channel: &LeakyPauliChannel,
    targets: &[u32],
    status: &mut LeakageStatus,
    tableau: &mut B,
    rng: &mut RandGen,
) -> Result<()> {
    let width = channel.qubit_count();
    if targets.len() % width != 0 {
        return Err(Error::ShapeMismatch {
            expected: width,
            actual: targets.len(),
        });
    }
    for group in targets.chunks_exact(width) {
        let from: LeakageStatus = group.iter().map(|&qubit| status.get(qubit as usize)).collect();
        let Some(transition) = channel.sample(&from, rng) else {
            // No row for this joint status: the channel does not fire, and
            // the remaining groups are skipped as well.
            return Ok(());
        };
        for (index, &qubit) in group.iter().enumerate() {
            handle_transition(
                status,
                tableau,
                rng,
                qubit,
                from.get(index),
                transition.to.get(index),
                transition.pauli.get(index),
            )?;
        }
    }
    Ok(())
}

// Commit the new level code, then apply the computational-subspace side
// effect of the move:
// - R keeps the qubit computational and applies the residual Pauli;
// - U randomizes the amplitude with X_ERROR(0.5) before the qubit leaves the
//   subspace, with no tableau reset, so a later measurement shows the 50/50
//   an outside observer would see;
// - D resets first (forgetting the pre-leak history) and then randomizes,
//   giving the correct marginal after decay;
// - L has no tableau effect (channel validation pins its residual to I).
fn handle_transition<B: TableauBackend>(
    status: &mut LeakageStatus,
    tableau: &mut B,
    rng: &mut RandGen,
    target: u32,
    from_code: u8,
    to_code: u8,
    pauli: PauliOp,
) -> Result<()> {
    status.set(target as usize, to_code);
    let target = [GateTarget::qubit(target)];
    match TransitionType::classify(from_code, to_code) {
        TransitionType::R => {
            let gate = match pauli {
                PauliOp::I => return Ok(()),
                PauliOp::X => GateType::X,
                PauliOp::Y => GateType::Y,
                PauliOp::Z => GateType::Z,
            };
            tableau.apply(gate, &[], &target, rng)
        }
        TransitionType::U => tableau.apply(GateType::XError, &[0.5], &target, rng),
        TransitionType::D => {
            tableau.apply(GateType::R, &[], &target, rng)?;
            tableau.apply(GateType::XError, &[0.5], &target, rng)
        }
        TransitionType::L => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PauliString;

    fn leak_channel(from: u8, to: u8) -> LeakyPauliChannel {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([from].into(), [to].into(), PauliString::identity(1), 1.0)
            .unwrap();
        channel
    }

    #[test]
    fn construction_starts_clean() {
        let simulator = Simulator::with_seed(3, Vec::new(), 42);
        assert_eq!(simulator.num_qubits(), 3);
        assert_eq!(simulator.leakage_status(), &LeakageStatus::new(3));
        assert!(simulator.leakage_masks().is_empty());
    }

    #[test]
    fn default_constructor_routes_through_the_seed_factory() {
        let simulator = Simulator::new(2, Vec::new());
        assert_eq!(simulator.num_qubits(), 2);
        assert!(!simulator.leakage_status().any_leaked());
    }

    #[test]
    fn noiseless_circuit_measures_deterministically() {
        let mut simulator = Simulator::with_seed(4, Vec::new(), 42);
        let mut circuit = Circuit::new();
        circuit.append(GateType::X, &[0, 2]);
        circuit.append(GateType::M, &[0, 1, 2, 3]);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![1, 0, 1, 0]
        );
    }

    #[test]
    fn bell_pair_outcomes_agree() {
        for seed in 0..20 {
            let mut simulator = Simulator::with_seed(2, Vec::new(), seed);
            let mut circuit = Circuit::new();
            circuit.append(GateType::H, &[0]);
            circuit.append(GateType::Cx, &[0, 1]);
            circuit.append(GateType::M, &[0, 1]);
            simulator.do_circuit(&circuit).unwrap();
            let record = simulator.current_measurement_record(ReadoutStrategy::RawLabel);
            assert_eq!(record[0], record[1]);
        }
    }

    #[test]
    fn repeat_blocks_execute_their_body() {
        let mut simulator = Simulator::with_seed(1, Vec::new(), 42);
        let mut body = Circuit::new();
        body.append(GateType::X, &[0]);
        body.append(GateType::M, &[0]);
        let mut circuit = Circuit::new();
        circuit.repeat(3, body);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![1, 0, 1]
        );
    }

    #[test]
    fn leaky_tagged_identity_applies_the_bound_channel() {
        let mut simulator = Simulator::with_seed(2, vec![leak_channel(0, 1)], 42);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[1]);
        circuit.append(GateType::M, &[0, 1]);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(simulator.leakage_masks(), &[0, 1]);
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![0, 2]
        );
    }

    #[test]
    fn untagged_identity_is_inert() {
        let mut simulator = Simulator::with_seed(1, vec![leak_channel(0, 1)], 42);
        let mut circuit = Circuit::new();
        circuit.append(GateType::I, &[0]);
        circuit.append_tagged(GateType::I, "calibration point", &[0]);
        circuit.append_tagged(GateType::I, "leaky<x>", &[0]);
        circuit.append(GateType::M, &[0]);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![0]
        );
    }

    #[test]
    fn tags_on_non_identity_gates_are_ignored() {
        let mut simulator = Simulator::with_seed(1, vec![leak_channel(0, 1)], 42);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::X, "leaky<0>", &[0]);
        circuit.append(GateType::M, &[0]);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![1]
        );
    }

    #[test]
    fn out_of_range_channel_index_is_reported() {
        let mut simulator = Simulator::with_seed(1, vec![leak_channel(0, 1)], 42);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<3>", &[0]);
        assert_eq!(
            simulator.do_circuit(&circuit),
            Err(Error::UnknownChannel { index: 3, bound: 1 })
        );
    }

    #[test]
    fn non_z_bases_are_rejected() {
        let mut simulator = Simulator::with_seed(1, Vec::new(), 42);
        for gate in [
            GateType::Mx,
            GateType::My,
            GateType::Rx,
            GateType::Ry,
            GateType::Mrx,
            GateType::Mry,
            GateType::Mpp,
        ] {
            let instruction = Instruction::new(gate, vec![GateTarget::qubit(0)], Vec::new());
            assert_eq!(
                simulator.do_instruction(&instruction),
                Err(Error::UnsupportedBasis(gate))
            );
        }
    }

    #[test]
    fn targets_beyond_capacity_are_rejected() {
        let mut simulator = Simulator::with_seed(2, Vec::new(), 42);
        let mut circuit = Circuit::new();
        circuit.append(GateType::H, &[2]);
        assert_eq!(
            simulator.do_circuit(&circuit),
            Err(Error::TooManyQubits {
                qubit: 2,
                capacity: 2
            })
        );
    }

    #[test]
    fn odd_two_qubit_target_lists_are_rejected() {
        let mut simulator = Simulator::with_seed(3, Vec::new(), 42);
        let instruction = Instruction::new(
            GateType::Cx,
            (0..3).map(GateTarget::qubit).collect(),
            Vec::new(),
        );
        assert!(matches!(
            simulator.do_instruction(&instruction),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn reset_returns_leaked_qubits_to_computational() {
        let mut simulator = Simulator::with_seed(1, vec![leak_channel(0, 1)], 42);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
        circuit.append(GateType::R, &[0]);
        circuit.append(GateType::M, &[0]);
        simulator.do_circuit(&circuit).unwrap();
        assert!(!simulator.leakage_status().any_leaked());
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![0]
        );
    }

    #[test]
    fn measure_reset_records_the_leak_then_collapses_it() {
        let mut simulator = Simulator::with_seed(1, vec![leak_channel(0, 2)], 42);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
        circuit.append(GateType::Mr, &[0]);
        circuit.append(GateType::M, &[0]);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(simulator.leakage_masks(), &[2, 0]);
        let record = simulator.current_measurement_record(ReadoutStrategy::RawLabel);
        assert_eq!(record[0], 3);
        assert!(record[1] <= 1);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut simulator = Simulator::with_seed(2, vec![leak_channel(0, 1)], 42);
        let mut circuit = Circuit::new();
        circuit.append(GateType::X, &[0]);
        circuit.append_tagged(GateType::I, "leaky<0>", &[1]);
        circuit.append(GateType::M, &[0, 1]);
        simulator.do_circuit(&circuit).unwrap();
        simulator.clear();
        assert!(simulator.leakage_masks().is_empty());
        assert_eq!(simulator.leakage_status(), &LeakageStatus::new(2));
        assert!(simulator
            .current_measurement_record(ReadoutStrategy::RawLabel)
            .is_empty());
        simulator.clear();
        assert!(simulator.leakage_masks().is_empty());
        assert_eq!(simulator.channels().len(), 1);
    }

    #[test]
    fn record_buffer_length_is_validated() {
        let mut simulator = Simulator::with_seed(1, Vec::new(), 42);
        let mut circuit = Circuit::new();
        circuit.append(GateType::M, &[0]);
        simulator.do_circuit(&circuit).unwrap();
        let mut wrong = [0u8; 2];
        assert_eq!(
            simulator.append_measurement_record_into(&mut wrong, ReadoutStrategy::RawLabel),
            Err(Error::ShapeMismatch {
                expected: 1,
                actual: 2
            })
        );
        let mut right = [9u8; 1];
        simulator
            .append_measurement_record_into(&mut right, ReadoutStrategy::RawLabel)
            .unwrap();
        assert_eq!(right, [0]);
    }

    // ========== Dispatch against a recording backend ==========

    #[derive(Default)]
    struct RecordingBackend {
        num_qubits: usize,
        calls: Vec<(GateType, Vec<f64>, Vec<u32>)>,
        record: Vec<bool>,
    }

    impl RecordingBackend {
        fn new(num_qubits: usize) -> Self {
            RecordingBackend {
                num_qubits,
                ..RecordingBackend::default()
            }
        }
    }

    impl TableauBackend for RecordingBackend {
        fn num_qubits(&self) -> usize {
            self.num_qubits
        }

        fn apply(
            &mut self,
            gate: GateType,
            args: &[f64],
            targets: &[GateTarget],
            _rng: &mut RandGen,
        ) -> Result<()> {
            if gate.produces_measurements() {
                self.record.extend(targets.iter().map(|_| false));
            }
            self.calls.push((
                gate,
                args.to_vec(),
                targets.iter().map(|target| target.qubit_value()).collect(),
            ));
            Ok(())
        }

        fn measurement_record(&self) -> &[bool] {
            &self.record
        }

        fn clear(&mut self) {
            self.calls.clear();
            self.record.clear();
        }
    }

    fn recording_simulator(
        num_qubits: usize,
        channels: Vec<LeakyPauliChannel>,
    ) -> Simulator<RecordingBackend> {
        Simulator::with_backend(
            num_qubits,
            channels,
            RecordingBackend::new(num_qubits),
            RandGen::seeded(42),
        )
    }

    #[test]
    fn ideal_gates_skip_groups_with_leaked_targets() {
        let mut simulator = recording_simulator(3, vec![leak_channel(0, 1)]);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[1]);
        circuit.append(GateType::Cx, &[0, 1, 0, 2]);
        circuit.append(GateType::H, &[0, 1]);
        simulator.do_circuit(&circuit).unwrap();
        let gates: Vec<(GateType, Vec<u32>)> = simulator
            .tableau
            .calls
            .iter()
            .map(|(gate, _, qubits)| (*gate, qubits.clone()))
            .collect();
        assert_eq!(
            gates,
            vec![
                // Leak-up randomization; no reset and no CX on the leaked pair.
                (GateType::XError, vec![1]),
                (GateType::Cx, vec![0, 2]),
                (GateType::H, vec![0]),
            ]
        );
        assert_eq!(simulator.tableau.calls[0].1, vec![0.5]);
    }

    #[test]
    fn decay_resets_then_randomizes() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([1].into(), [0].into(), PauliString::identity(1), 1.0)
            .unwrap();
        let mut simulator = recording_simulator(1, vec![channel]);
        simulator.leakage_status.set(0, 1);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
        simulator.do_circuit(&circuit).unwrap();
        let gates: Vec<GateType> = simulator
            .tableau
            .calls
            .iter()
            .map(|(gate, _, _)| *gate)
            .collect();
        assert_eq!(gates, vec![GateType::R, GateType::XError]);
        assert!(!simulator.leakage_status().any_leaked());
    }

    #[test]
    fn rest_transitions_apply_the_residual_pauli() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [0].into(), "Y".parse().unwrap(), 1.0)
            .unwrap();
        let mut simulator = recording_simulator(1, vec![channel]);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
        simulator.do_circuit(&circuit).unwrap();
        let gates: Vec<GateType> = simulator
            .tableau
            .calls
            .iter()
            .map(|(gate, _, _)| *gate)
            .collect();
        assert_eq!(gates, vec![GateType::Y]);
    }

    #[test]
    fn lateral_transitions_touch_nothing_in_the_tableau() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([1].into(), [2].into(), PauliString::identity(1), 1.0)
            .unwrap();
        let mut simulator = recording_simulator(1, vec![channel]);
        simulator.leakage_status.set(0, 1);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
        simulator.do_circuit(&circuit).unwrap();
        assert!(simulator.tableau.calls.is_empty());
        assert_eq!(simulator.leakage_status().get(0), 2);
    }

    #[test]
    fn unknown_row_ends_the_whole_channel_application() {
        // Qubit 0 is computational, so its group samples; qubit 1 starts
        // leaked with no matching row, which ends the call before the third
        // group is processed.
        let mut simulator = recording_simulator(3, vec![leak_channel(0, 1)]);
        simulator.leakage_status.set(1, 1);
        simulator
            .apply_leaky_channel(&[0, 1, 2], &leak_channel(0, 1))
            .unwrap();
        assert_eq!(simulator.leakage_status().get(0), 1);
        assert_eq!(simulator.leakage_status().get(1), 1);
        assert_eq!(simulator.leakage_status().get(2), 0);
        assert_eq!(simulator.tableau.calls.len(), 1);
    }

    #[test]
    fn channel_width_must_divide_target_count() {
        let mut simulator = recording_simulator(3, Vec::new());
        let mut channel = LeakyPauliChannel::new(2);
        channel
            .add_transition(
                [0, 0].into(),
                [0, 0].into(),
                PauliString::identity(2),
                1.0,
            )
            .unwrap();
        assert!(matches!(
            simulator.apply_leaky_channel(&[0, 1, 2], &channel),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn two_qubit_channel_groups_pairs_left_to_right() {
        let mut channel = LeakyPauliChannel::new(2);
        channel
            .add_transition([0, 0].into(), [0, 1].into(), "XI".parse().unwrap(), 1.0)
            .unwrap();
        let mut simulator = Simulator::with_seed(4, vec![channel], 42);
        let mut circuit = Circuit::new();
        circuit.append_tagged(GateType::I, "leaky<0>", &[0, 1, 2, 3]);
        circuit.append(GateType::M, &[0, 1, 2, 3]);
        simulator.do_circuit(&circuit).unwrap();
        assert_eq!(
            simulator.current_measurement_record(ReadoutStrategy::RawLabel),
            vec![1, 2, 1, 2]
        );
    }
}
