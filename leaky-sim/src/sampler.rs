//! Monte Carlo batch sampling of leaky circuits.

use crate::channel::LeakyPauliChannel;
use crate::circuit::Circuit;
use crate::errors::{Error, Result};
use crate::readout::ReadoutStrategy;
use crate::simulator::{Program, Simulator};
use crate::tableau::{ChpBackend, TableauBackend};

/// A `shots × num_measurements` matrix of readout labels, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordMatrix {
    data: Vec<u8>,
    shots: usize,
    num_measurements: usize,
}

impl RecordMatrix {
    fn zeros(shots: usize, num_measurements: usize) -> Self {
        RecordMatrix {
            data: vec![0; shots * num_measurements],
            shots,
            num_measurements,
        }
    }

    #[must_use]
    pub fn shots(&self) -> usize {
        self.shots
    }

    #[must_use]
    pub fn num_measurements(&self) -> usize {
        self.num_measurements
    }

    /// One shot's labels, in measurement order.
    ///
    /// # Panics
    ///
    /// Panics when `shot` is out of range.
    #[must_use]
    pub fn row(&self, shot: usize) -> &[u8] {
        assert!(shot < self.shots, "shot {shot} out of range");
        &self.data[shot * self.num_measurements..(shot + 1) * self.num_measurements]
    }

    /// Iterate over shot rows.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.num_measurements.max(1))
    }

    /// The whole matrix as one row-major slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn row_mut(&mut self, shot: usize) -> &mut [u8] {
        &mut self.data[shot * self.num_measurements..(shot + 1) * self.num_measurements]
    }
}

/// Batch sampler: compiles a circuit once and replays it for many
/// independent trajectories.
///
/// # Examples
///
/// ```
/// use leaky_sim::{Circuit, GateType, LeakyPauliChannel, ReadoutStrategy, Sampler};
///
/// let mut channel = LeakyPauliChannel::new(1);
/// channel
///     .add_transition([0].into(), [1].into(), "I".parse().unwrap(), 1.0)
///     .unwrap();
///
/// let mut circuit = Circuit::new();
/// circuit.append_tagged(GateType::I, "leaky<0>", &[0]);
/// circuit.append(GateType::M, &[0]);
///
/// let mut sampler = Sampler::with_seed(1, vec![channel], 42);
/// let records = sampler
///     .sample(&circuit, 8, ReadoutStrategy::RawLabel)
///     .unwrap();
/// assert_eq!(records.shots(), 8);
/// assert!(records.rows().all(|row| row == &[2]));
/// ```
pub struct Sampler<B: TableauBackend = ChpBackend> {
    simulator: Simulator<B>,
}

impl Sampler<ChpBackend> {
    /// A sampler over a fresh engine seeded from the default-seed factory.
    #[must_use]
    pub fn new(num_qubits: usize, channels: Vec<LeakyPauliChannel>) -> Self {
        Sampler {
            simulator: Simulator::new(num_qubits, channels),
        }
    }

    /// A sampler over a fresh engine with a deterministic seed.
    #[must_use]
    pub fn with_seed(num_qubits: usize, channels: Vec<LeakyPauliChannel>, seed: u64) -> Self {
        Sampler {
            simulator: Simulator::with_seed(num_qubits, channels, seed),
        }
    }
}

impl<B: TableauBackend> Sampler<B> {
    /// A sampler over an existing engine (custom backend or random stream).
    #[must_use]
    pub fn from_simulator(simulator: Simulator<B>) -> Self {
        Sampler { simulator }
    }

    /// The underlying engine.
    #[must_use]
    pub fn simulator(&self) -> &Simulator<B> {
        &self.simulator
    }

    /// Run `shots` independent trajectories of `circuit` and project each
    /// measurement record under `strategy`.
    ///
    /// The circuit is compiled once — repeat blocks expanded, tags parsed,
    /// targets grouped — and the flat program is replayed per shot, so the
    /// per-shot cost is pure execution.
    ///
    /// # Errors
    ///
    /// - [`Error::TooManyQubits`] when the circuit uses more qubits than the
    ///   engine has.
    /// - Any classification error from compiling the circuit.
    pub fn sample(
        &mut self,
        circuit: &Circuit,
        shots: usize,
        strategy: ReadoutStrategy,
    ) -> Result<RecordMatrix> {
        let program = Program::compile(circuit)?;
        if let Some(qubit) = program.max_qubit {
            if qubit as usize >= self.simulator.num_qubits() {
                return Err(Error::TooManyQubits {
                    qubit,
                    capacity: self.simulator.num_qubits(),
                });
            }
        }
        let mut records = RecordMatrix::zeros(shots, program.num_measurements);
        for shot in 0..shots {
            self.simulator.clear();
            self.simulator.run_program(&program)?;
            self.simulator
                .append_measurement_record_into(records.row_mut(shot), strategy)?;
        }
        Ok(records)
    }
}
