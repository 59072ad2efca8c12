//! Leaky Pauli channels: samplable stochastic maps over joint leakage
//! statuses.
//!
//! A channel is a table keyed by the joint leakage status of the qubits it
//! acts on. Each occupied row holds an ordered list of outcomes — a final
//! status plus a residual Pauli word on the qubits that stay computational —
//! with a cumulative-probability vector aligned to the outcomes for
//! upper-bound sampling. Rows are few in practice, so lookup is a linear
//! scan.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use smallvec::SmallVec;

use crate::errors::{Error, Result};
use crate::rng::RandGen;
use crate::status::LeakageStatus;

/// Row totals may miss 1 by at most this much before validation fails.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// A single-qubit Pauli letter.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PauliOp {
    I,
    X,
    Y,
    Z,
}

/// A fixed-length word of Pauli letters, index-aligned with a
/// [`LeakageStatus`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PauliString {
    ops: SmallVec<[PauliOp; 2]>,
}

impl PauliString {
    /// The all-identity word on `qubit_count` qubits.
    #[must_use]
    pub fn identity(qubit_count: usize) -> Self {
        PauliString {
            ops: smallvec::smallvec![PauliOp::I; qubit_count],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The letter at `qubit`.
    ///
    /// # Panics
    ///
    /// Panics when `qubit` is out of range.
    #[must_use]
    pub fn get(&self, qubit: usize) -> PauliOp {
        self.ops[qubit]
    }

    /// Iterate over the letters in qubit order.
    pub fn iter(&self) -> impl Iterator<Item = PauliOp> + '_ {
        self.ops.iter().copied()
    }
}

impl FromIterator<PauliOp> for PauliString {
    fn from_iter<I: IntoIterator<Item = PauliOp>>(ops: I) -> Self {
        PauliString {
            ops: ops.into_iter().collect(),
        }
    }
}

impl FromStr for PauliString {
    type Err = Error;

    fn from_str(word: &str) -> Result<Self> {
        word.chars()
            .map(|letter| match letter {
                'I' => Ok(PauliOp::I),
                'X' => Ok(PauliOp::X),
                'Y' => Ok(PauliOp::Y),
                'Z' => Ok(PauliOp::Z),
                other => Err(Error::BadArgument(format!(
                    "invalid Pauli letter {other:?} in {word:?}"
                ))),
            })
            .collect()
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in self.iter() {
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

/// How a single qubit's level code moves across a transition.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitionType {
    /// Rest: stays in the computational subspace.
    R,
    /// Leak up: computational to a leakage level.
    U,
    /// Decay down: a leakage level back to computational.
    D,
    /// Lateral: between leakage levels.
    L,
}

impl TransitionType {
    /// Classify the move between two level codes.
    #[must_use]
    pub fn classify(from: u8, to: u8) -> Self {
        match (from, to) {
            (0, 0) => TransitionType::R,
            (0, _) => TransitionType::U,
            (_, 0) => TransitionType::D,
            _ => TransitionType::L,
        }
    }
}

/// One sampled channel outcome: the status to commit and the residual Pauli
/// on the qubits that stay computational.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub to: LeakageStatus,
    pub pauli: PauliString,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct ChannelRow {
    from: LeakageStatus,
    transitions: Vec<Transition>,
    cumulative: Vec<f64>,
}

/// A stochastic map from joint leakage statuses to (status, Pauli) outcomes.
///
/// Build with [`add_transition`](Self::add_transition), validate with
/// [`safety_check`](Self::safety_check), then treat as read-only while bound
/// to simulators. Insertion order defines row order and outcome order.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeakyPauliChannel {
    qubit_count: usize,
    rows: Vec<ChannelRow>,
}

impl LeakyPauliChannel {
    /// An empty channel acting on `qubit_count` qubits.
    ///
    /// # Panics
    ///
    /// Panics when `qubit_count` is zero.
    #[must_use]
    pub fn new(qubit_count: usize) -> Self {
        assert!(qubit_count >= 1, "a channel must act on at least one qubit");
        LeakyPauliChannel {
            qubit_count,
            rows: Vec::new(),
        }
    }

    /// The number of qubits the channel acts on.
    #[must_use]
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Total number of outcomes across all rows.
    #[must_use]
    pub fn num_transitions(&self) -> usize {
        self.rows.iter().map(|row| row.transitions.len()).sum()
    }

    /// Append the outcome `(to, pauli)` with probability `probability` to the
    /// row keyed by `from`, creating the row on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeMismatch`] when any of `from`, `to`, or `pauli` does
    ///   not match the channel width.
    /// - [`Error::BadArgument`] when `probability` is outside [0, 1] or the
    ///   outcome was already added to this row.
    /// - [`Error::OverUnity`] when the row's cumulative probability would
    ///   exceed 1.
    pub fn add_transition(
        &mut self,
        from: LeakageStatus,
        to: LeakageStatus,
        pauli: PauliString,
        probability: f64,
    ) -> Result<()> {
        self.check_width(from.len())?;
        self.check_width(to.len())?;
        self.check_width(pauli.len())?;
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::BadArgument(format!(
                "transition probability {probability} is outside [0, 1]"
            )));
        }

        let index = match self.rows.iter().position(|row| row.from == from) {
            Some(index) => index,
            None => {
                self.rows.push(ChannelRow {
                    from,
                    transitions: Vec::new(),
                    cumulative: Vec::new(),
                });
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[index];

        if row
            .transitions
            .iter()
            .any(|transition| transition.to == to && transition.pauli == pauli)
        {
            return Err(Error::BadArgument(format!(
                "duplicate transition {} --{pauli}--> {to}",
                row.from
            )));
        }

        let total = row.cumulative.last().copied().unwrap_or(0.0) + probability;
        if total > 1.0 + PROBABILITY_TOLERANCE {
            return Err(Error::OverUnity {
                status: row.from.to_string(),
                total,
            });
        }
        row.transitions.push(Transition { to, pauli });
        row.cumulative.push(total);
        Ok(())
    }

    /// The incremental probability of the exact outcome `(to, pauli)` from
    /// `from`, or 0.0 when the row or outcome is absent.
    #[must_use]
    pub fn get_prob_from_to(
        &self,
        from: &LeakageStatus,
        to: &LeakageStatus,
        pauli: &PauliString,
    ) -> f64 {
        let Some(row) = self.rows.iter().find(|row| &row.from == from) else {
            return 0.0;
        };
        let Some(index) = row
            .transitions
            .iter()
            .position(|transition| &transition.to == to && &transition.pauli == pauli)
        else {
            return 0.0;
        };
        if index == 0 {
            row.cumulative[0]
        } else {
            row.cumulative[index] - row.cumulative[index - 1]
        }
    }

    /// Sample an outcome for the joint status `from`.
    ///
    /// Returns `None` when `from` has no row, which callers treat as "the
    /// channel does not fire". A row whose mass sums below 1 is sampled
    /// conditioned on firing: the draw is uniform over `[0, cumulative.last)`
    /// rather than `[0, 1)`.
    #[must_use]
    pub fn sample(&self, from: &LeakageStatus, rng: &mut RandGen) -> Option<&Transition> {
        let row = self.rows.iter().find(|row| &row.from == from)?;
        let total = *row.cumulative.last().expect("occupied rows are non-empty");
        let draw = rng.uniform(0.0, total);
        let index = row.cumulative.partition_point(|&cumulative| cumulative <= draw);
        Some(&row.transitions[index.min(row.transitions.len() - 1)])
    }

    /// Validate the whole table.
    ///
    /// # Errors
    ///
    /// - [`Error::NotStochastic`] when a row's probabilities do not sum to 1
    ///   within [`PROBABILITY_TOLERANCE`].
    /// - [`Error::PauliOnNonR`] when an outcome carries a non-identity Pauli
    ///   letter on a qubit whose transition is not R.
    pub fn safety_check(&self) -> Result<()> {
        for row in &self.rows {
            let total = *row.cumulative.last().expect("occupied rows are non-empty");
            if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(Error::NotStochastic {
                    status: row.from.to_string(),
                    total,
                });
            }
            for transition in &row.transitions {
                for qubit in 0..self.qubit_count {
                    let kind =
                        TransitionType::classify(row.from.get(qubit), transition.to.get(qubit));
                    if kind != TransitionType::R && transition.pauli.get(qubit) != PauliOp::I {
                        return Err(Error::PauliOnNonR {
                            from: row.from.to_string(),
                            to: transition.to.to_string(),
                            pauli: transition.pauli.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn check_width(&self, actual: usize) -> Result<()> {
        if actual == self.qubit_count {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                expected: self.qubit_count,
                actual,
            })
        }
    }
}

impl fmt::Display for LeakyPauliChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transitions:")?;
        if self.rows.is_empty() {
            return writeln!(f, "   None");
        }
        for row in &self.rows {
            for (index, transition) in row.transitions.iter().enumerate() {
                let probability = if index == 0 {
                    row.cumulative[0]
                } else {
                    row.cumulative[index] - row.cumulative[index - 1]
                };
                writeln!(
                    f,
                    "    {} --{}--> {}: {},",
                    row.from, transition.pauli, transition.to, probability
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pauli(word: &str) -> PauliString {
        word.parse().expect("valid Pauli word")
    }

    #[test]
    fn empty_channel_has_no_transitions() {
        let channel = LeakyPauliChannel::new(1);
        assert_eq!(channel.qubit_count(), 1);
        assert_eq!(channel.num_transitions(), 0);
        assert!(channel.safety_check().is_ok());
    }

    #[test]
    fn add_transition_accumulates_rows_in_insertion_order() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [0].into(), pauli("X"), 0.25)
            .unwrap();
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 0.75)
            .unwrap();
        channel
            .add_transition([1].into(), [0].into(), pauli("I"), 1.0)
            .unwrap();
        assert_eq!(channel.num_transitions(), 3);
        assert!(channel.safety_check().is_ok());
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let mut channel = LeakyPauliChannel::new(2);
        let result = channel.add_transition([0].into(), [0, 0].into(), pauli("II"), 1.0);
        assert_eq!(
            result,
            Err(Error::ShapeMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn over_unity_is_rejected() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [0].into(), pauli("X"), 0.7)
            .unwrap();
        let result = channel.add_transition([0].into(), [1].into(), pauli("I"), 0.5);
        assert!(matches!(result, Err(Error::OverUnity { .. })));
    }

    #[test]
    fn duplicate_outcome_is_rejected() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 0.5)
            .unwrap();
        let result = channel.add_transition([0].into(), [1].into(), pauli("I"), 0.5);
        assert!(matches!(result, Err(Error::BadArgument(_))));
    }

    #[test]
    fn probability_outside_unit_interval_is_rejected() {
        let mut channel = LeakyPauliChannel::new(1);
        let result = channel.add_transition([0].into(), [1].into(), pauli("I"), 1.5);
        assert!(matches!(result, Err(Error::BadArgument(_))));
    }

    #[test]
    fn get_prob_recovers_incremental_probabilities() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [0].into(), pauli("X"), 0.25)
            .unwrap();
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 0.75)
            .unwrap();
        let from = LeakageStatus::from([0]);
        assert_eq!(
            channel.get_prob_from_to(&from, &[0].into(), &pauli("X")),
            0.25
        );
        assert_eq!(
            channel.get_prob_from_to(&from, &[1].into(), &pauli("I")),
            0.75
        );
        assert_eq!(
            channel.get_prob_from_to(&from, &[2].into(), &pauli("I")),
            0.0
        );
        assert_eq!(
            channel.get_prob_from_to(&[1].into(), &[0].into(), &pauli("I")),
            0.0
        );
    }

    #[test]
    fn sample_unknown_row_returns_none() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 1.0)
            .unwrap();
        let mut rng = RandGen::seeded(42);
        assert!(channel.sample(&[2].into(), &mut rng).is_none());
    }

    #[test]
    fn sample_single_outcome_always_fires() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 1.0)
            .unwrap();
        let mut rng = RandGen::seeded(42);
        for _ in 0..100 {
            let transition = channel.sample(&[0].into(), &mut rng).unwrap();
            assert_eq!(transition.to, LeakageStatus::from([1]));
        }
    }

    #[test]
    fn sample_renormalizes_partial_rows() {
        // A row summing to 0.5 conditions on firing: the single outcome is
        // returned on every draw.
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 0.5)
            .unwrap();
        let mut rng = RandGen::seeded(42);
        for _ in 0..100 {
            let transition = channel.sample(&[0].into(), &mut rng).unwrap();
            assert_eq!(transition.to, LeakageStatus::from([1]));
        }
    }

    #[test]
    fn sample_respects_weights() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [0].into(), pauli("X"), 0.9)
            .unwrap();
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 0.1)
            .unwrap();
        let mut rng = RandGen::seeded(42);
        let trials = 10_000;
        let mut stayed = 0;
        for _ in 0..trials {
            if channel.sample(&[0].into(), &mut rng).unwrap().to == LeakageStatus::from([0]) {
                stayed += 1;
            }
        }
        crate::statistical_testing::assert_rate_within(stayed, trials, 0.9, 0.05, "weighted row");
    }

    #[test]
    fn safety_check_rejects_unnormalized_rows() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 1.0)
            .unwrap();
        channel
            .add_transition([1].into(), [2].into(), pauli("I"), 0.5)
            .unwrap();
        assert!(matches!(
            channel.safety_check(),
            Err(Error::NotStochastic { .. })
        ));
    }

    #[test]
    fn safety_check_rejects_pauli_on_leaking_qubit() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([1].into(), [1].into(), pauli("X"), 1.0)
            .unwrap();
        assert!(matches!(
            channel.safety_check(),
            Err(Error::PauliOnNonR { .. })
        ));
    }

    #[test]
    fn safety_check_allows_pauli_on_resting_qubit_of_mixed_pair() {
        let mut channel = LeakyPauliChannel::new(2);
        channel
            .add_transition([0, 0].into(), [0, 1].into(), pauli("XI"), 1.0)
            .unwrap();
        assert!(channel.safety_check().is_ok());
    }

    #[test]
    fn transition_type_classification() {
        assert_eq!(TransitionType::classify(0, 0), TransitionType::R);
        assert_eq!(TransitionType::classify(0, 1), TransitionType::U);
        assert_eq!(TransitionType::classify(0, 2), TransitionType::U);
        assert_eq!(TransitionType::classify(1, 0), TransitionType::D);
        assert_eq!(TransitionType::classify(3, 0), TransitionType::D);
        assert_eq!(TransitionType::classify(1, 3), TransitionType::L);
        assert_eq!(TransitionType::classify(2, 2), TransitionType::L);
    }

    #[test]
    fn display_lists_transitions_in_insertion_order() {
        let mut channel = LeakyPauliChannel::new(1);
        channel
            .add_transition([0].into(), [0].into(), pauli("X"), 0.5)
            .unwrap();
        channel
            .add_transition([0].into(), [1].into(), pauli("I"), 0.5)
            .unwrap();
        let rendered = channel.to_string();
        assert_eq!(
            rendered,
            "Transitions:\n    |C⟩ --X--> |C⟩: 0.5,\n    |C⟩ --I--> |2⟩: 0.5,\n"
        );
    }

    #[test]
    fn display_of_empty_channel_mentions_none() {
        let channel = LeakyPauliChannel::new(2);
        assert_eq!(channel.to_string(), "Transitions:\n   None\n");
    }

    #[test]
    fn pauli_string_parsing_round_trips() {
        assert_eq!(pauli("IXYZ").to_string(), "IXYZ");
        assert!(matches!(
            "IQ".parse::<PauliString>(),
            Err(Error::BadArgument(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn row_split_into_parts_passes_safety_check(parts in 1usize..6) {
            let mut channel = LeakyPauliChannel::new(1);
            let share = 1.0 / parts as f64;
            for level in 0..parts {
                let to = LeakageStatus::from([(level + 1) as u8]);
                channel
                    .add_transition([0].into(), to, PauliString::identity(1), share)
                    .unwrap();
            }
            prop_assert!(channel.safety_check().is_ok());
        }

        #[test]
        fn sampled_outcomes_carry_positive_mass(seed in 0u64..1000) {
            let mut channel = LeakyPauliChannel::new(1);
            channel
                .add_transition([0].into(), [0].into(), PauliString::identity(1), 0.5)
                .unwrap();
            channel
                .add_transition([0].into(), [1].into(), PauliString::identity(1), 0.5)
                .unwrap();
            let mut rng = RandGen::seeded(seed);
            let from = LeakageStatus::from([0]);
            let transition = channel.sample(&from, &mut rng).unwrap();
            prop_assert!(
                channel.get_prob_from_to(&from, &transition.to, &transition.pauli) > 0.0
            );
        }
    }
}
