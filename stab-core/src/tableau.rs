//! The destabilizer/stabilizer tableau and its update rules.
//!
//! Rows `0..n` hold the destabilizer generators, rows `n..2n` the stabilizer
//! generators, and row `2n` is scratch space for deterministic-measurement
//! reduction. X and Z indicator bits are packed into `u64` words per row;
//! phases live in a separate vector as exponents of `i` (0 for +1, 2 for −1).

use rand::Rng;

const WORD_BITS: usize = 64;

/// A stabilizer state of a fixed-size qubit register.
///
/// Created at |0…0⟩ by [`Tableau::new`]; gates mutate it in place and
/// [`Tableau::clear`] returns it to |0…0⟩ without reallocating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tableau {
    qubit_count: usize,
    words: usize,
    x: Vec<u64>,
    z: Vec<u64>,
    phase: Vec<u8>,
}

#[inline]
const fn word_of(qubit: usize) -> usize {
    qubit / WORD_BITS
}

#[inline]
const fn mask_of(qubit: usize) -> u64 {
    1 << (qubit % WORD_BITS)
}

impl Tableau {
    /// Create a tableau of `qubit_count` qubits initialized to |0…0⟩.
    #[must_use]
    pub fn new(qubit_count: usize) -> Self {
        let words = qubit_count.div_ceil(WORD_BITS);
        let rows = 2 * qubit_count + 1;
        let mut tableau = Tableau {
            qubit_count,
            words,
            x: vec![0; rows * words],
            z: vec![0; rows * words],
            phase: vec![0; rows],
        };
        tableau.set_identity();
        tableau
    }

    /// The number of qubits in the register.
    #[must_use]
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Reset to |0…0⟩ in place, keeping the allocation.
    pub fn clear(&mut self) {
        self.x.fill(0);
        self.z.fill(0);
        self.phase.fill(0);
        self.set_identity();
    }

    fn set_identity(&mut self) {
        let n = self.qubit_count;
        for qubit in 0..n {
            let word = word_of(qubit);
            let mask = mask_of(qubit);
            self.x[qubit * self.words + word] |= mask;
            self.z[(n + qubit) * self.words + word] |= mask;
        }
    }

    // ========== Clifford gates ==========

    /// Hadamard on `qubit`.
    pub fn apply_h(&mut self, qubit: usize) {
        debug_assert!(qubit < self.qubit_count);
        let word = word_of(qubit);
        let mask = mask_of(qubit);
        for row in 0..2 * self.qubit_count {
            let index = row * self.words + word;
            let x_bit = self.x[index] & mask;
            let z_bit = self.z[index] & mask;
            self.x[index] ^= x_bit ^ z_bit;
            self.z[index] ^= z_bit ^ x_bit;
            if x_bit != 0 && z_bit != 0 {
                self.phase[row] = (self.phase[row] + 2) & 3;
            }
        }
    }

    /// Phase gate S (= √Z) on `qubit`.
    pub fn apply_s(&mut self, qubit: usize) {
        debug_assert!(qubit < self.qubit_count);
        let word = word_of(qubit);
        let mask = mask_of(qubit);
        for row in 0..2 * self.qubit_count {
            let index = row * self.words + word;
            if self.x[index] & mask != 0 && self.z[index] & mask != 0 {
                self.phase[row] = (self.phase[row] + 2) & 3;
            }
            self.z[index] ^= self.x[index] & mask;
        }
    }

    /// S† on `qubit`.
    pub fn apply_s_dag(&mut self, qubit: usize) {
        self.apply_s(qubit);
        self.apply_s(qubit);
        self.apply_s(qubit);
    }

    /// Pauli Z on `qubit`.
    pub fn apply_z(&mut self, qubit: usize) {
        self.apply_s(qubit);
        self.apply_s(qubit);
    }

    /// Pauli X on `qubit`.
    pub fn apply_x(&mut self, qubit: usize) {
        self.apply_h(qubit);
        self.apply_z(qubit);
        self.apply_h(qubit);
    }

    /// Pauli Y on `qubit`.
    pub fn apply_y(&mut self, qubit: usize) {
        self.apply_z(qubit);
        self.apply_x(qubit);
    }

    /// √X on `qubit`.
    pub fn apply_sqrt_x(&mut self, qubit: usize) {
        self.apply_h(qubit);
        self.apply_s(qubit);
        self.apply_h(qubit);
    }

    /// √X† on `qubit`.
    pub fn apply_sqrt_x_dag(&mut self, qubit: usize) {
        self.apply_h(qubit);
        self.apply_s_dag(qubit);
        self.apply_h(qubit);
    }

    /// √Y on `qubit`.
    pub fn apply_sqrt_y(&mut self, qubit: usize) {
        self.apply_z(qubit);
        self.apply_h(qubit);
    }

    /// √Y† on `qubit`.
    pub fn apply_sqrt_y_dag(&mut self, qubit: usize) {
        self.apply_h(qubit);
        self.apply_z(qubit);
    }

    /// Controlled-X with control `control` and target `target`.
    pub fn apply_cx(&mut self, control: usize, target: usize) {
        debug_assert!(control < self.qubit_count);
        debug_assert!(target < self.qubit_count);
        debug_assert_ne!(control, target);
        let control_word = word_of(control);
        let control_mask = mask_of(control);
        let target_word = word_of(target);
        let target_mask = mask_of(target);
        for row in 0..2 * self.qubit_count {
            let base = row * self.words;
            let x_control = self.x[base + control_word] & control_mask != 0;
            let z_target = self.z[base + target_word] & target_mask != 0;
            if x_control {
                self.x[base + target_word] ^= target_mask;
            }
            if z_target {
                self.z[base + control_word] ^= control_mask;
            }
            let x_target = self.x[base + target_word] & target_mask != 0;
            let z_control = self.z[base + control_word] & control_mask != 0;
            if x_control && z_target && x_target == z_control {
                self.phase[row] = (self.phase[row] + 2) & 3;
            }
        }
    }

    /// Controlled-Z between `a` and `b`.
    pub fn apply_cz(&mut self, a: usize, b: usize) {
        self.apply_h(b);
        self.apply_cx(a, b);
        self.apply_h(b);
    }

    /// Swap qubits `a` and `b`.
    pub fn apply_swap(&mut self, a: usize, b: usize) {
        self.apply_cx(a, b);
        self.apply_cx(b, a);
        self.apply_cx(a, b);
    }

    // ========== Measurement and reset ==========

    /// Projectively measure `qubit` in the Z basis.
    ///
    /// The outcome is deterministic when Z on `qubit` is (±) a stabilizer
    /// and an unbiased coin drawn from `rng` otherwise.
    pub fn measure<R: Rng + ?Sized>(&mut self, qubit: usize, rng: &mut R) -> bool {
        debug_assert!(qubit < self.qubit_count);
        let n = self.qubit_count;
        let word = word_of(qubit);
        let mask = mask_of(qubit);

        let random_row = (0..n).find(|&row| self.x[(n + row) * self.words + word] & mask != 0);

        if let Some(pivot) = random_row {
            // The outcome is random: replace stabilizer `pivot` with Z_qubit
            // carrying a coin-flip sign and fix up every other row that
            // anticommutes with it.
            self.copy_row(pivot + n, pivot);
            self.set_row_to_observable(pivot + n, qubit + n);
            self.phase[pivot + n] = if rng.gen::<bool>() { 2 } else { 0 };
            for row in 0..2 * n {
                if row != pivot && self.x[row * self.words + word] & mask != 0 {
                    self.multiply_row_into(pivot, row);
                }
            }
            self.phase[pivot + n] != 0
        } else {
            // Deterministic: accumulate the stabilizers whose destabilizer
            // partner touches X_qubit into the scratch row and read its sign.
            let pivot = (0..n)
                .find(|&row| self.x[row * self.words + word] & mask != 0)
                .unwrap_or(0);
            self.copy_row(pivot + n, 2 * n);
            for row in pivot + 1..n {
                if self.x[row * self.words + word] & mask != 0 {
                    self.multiply_row_into(row + n, 2 * n);
                }
            }
            self.phase[2 * n] != 0
        }
    }

    /// Measure `qubit`, then force it to |0⟩. Returns the pre-reset outcome.
    pub fn measure_reset<R: Rng + ?Sized>(&mut self, qubit: usize, rng: &mut R) -> bool {
        let outcome = self.measure(qubit, rng);
        if outcome {
            self.apply_x(qubit);
        }
        outcome
    }

    /// Reset `qubit` to |0⟩, discarding the implied measurement outcome.
    pub fn reset<R: Rng + ?Sized>(&mut self, qubit: usize, rng: &mut R) {
        self.measure_reset(qubit, rng);
    }

    // ========== Noise ==========

    /// Apply X to `qubit` with probability `probability`.
    pub fn x_error<R: Rng + ?Sized>(&mut self, qubit: usize, probability: f64, rng: &mut R) {
        if rng.gen::<f64>() < probability {
            self.apply_x(qubit);
        }
    }

    /// Apply Y to `qubit` with probability `probability`.
    pub fn y_error<R: Rng + ?Sized>(&mut self, qubit: usize, probability: f64, rng: &mut R) {
        if rng.gen::<f64>() < probability {
            self.apply_y(qubit);
        }
    }

    /// Apply Z to `qubit` with probability `probability`.
    pub fn z_error<R: Rng + ?Sized>(&mut self, qubit: usize, probability: f64, rng: &mut R) {
        if rng.gen::<f64>() < probability {
            self.apply_z(qubit);
        }
    }

    /// With probability `probability`, apply a uniformly random non-identity
    /// Pauli to `qubit`.
    pub fn depolarize1<R: Rng + ?Sized>(&mut self, qubit: usize, probability: f64, rng: &mut R) {
        if rng.gen::<f64>() < probability {
            self.apply_pauli_bits(qubit, rng.gen_range(1..4));
        }
    }

    /// With probability `probability`, apply a uniformly random non-identity
    /// two-qubit Pauli to the pair `(a, b)`.
    pub fn depolarize2<R: Rng + ?Sized>(&mut self, a: usize, b: usize, probability: f64, rng: &mut R) {
        if rng.gen::<f64>() < probability {
            let bits = rng.gen_range(1u8..16);
            self.apply_pauli_bits(a, bits & 3);
            self.apply_pauli_bits(b, bits >> 2);
        }
    }

    // Pauli selected by two bits: 0 ↦ I, 1 ↦ X, 2 ↦ Z, 3 ↦ Y.
    fn apply_pauli_bits(&mut self, qubit: usize, bits: u8) {
        match bits {
            0 => {}
            1 => self.apply_x(qubit),
            2 => self.apply_z(qubit),
            _ => self.apply_y(qubit),
        }
    }

    // ========== Row operations ==========

    // Overwrite row `destination` with row `source`.
    fn copy_row(&mut self, source: usize, destination: usize) {
        for word in 0..self.words {
            self.x[destination * self.words + word] = self.x[source * self.words + word];
            self.z[destination * self.words + word] = self.z[source * self.words + word];
        }
        self.phase[destination] = self.phase[source];
    }

    // Overwrite `row` with the `observable`-th generator: X_q for
    // `observable` = q < n, Z_q for `observable` = n + q.
    fn set_row_to_observable(&mut self, row: usize, observable: usize) {
        let n = self.qubit_count;
        for word in 0..self.words {
            self.x[row * self.words + word] = 0;
            self.z[row * self.words + word] = 0;
        }
        self.phase[row] = 0;
        if observable < n {
            self.x[row * self.words + word_of(observable)] = mask_of(observable);
        } else {
            let qubit = observable - n;
            self.z[row * self.words + word_of(qubit)] = mask_of(qubit);
        }
    }

    // Phase exponent of i picked up when row `target`'s operator is
    // left-multiplied by row `source`'s operator.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn product_phase(&self, source: usize, target: usize) -> u8 {
        let mut exponent: i32 = 0;
        for qubit in 0..self.qubit_count {
            let word = word_of(qubit);
            let mask = mask_of(qubit);
            let xs = self.x[source * self.words + word] & mask != 0;
            let zs = self.z[source * self.words + word] & mask != 0;
            let xt = self.x[target * self.words + word] & mask != 0;
            let zt = self.z[target * self.words + word] & mask != 0;
            exponent += match (xs, zs) {
                (true, false) => match (xt, zt) {
                    (true, true) => 1,
                    (false, true) => -1,
                    _ => 0,
                },
                (true, true) => match (xt, zt) {
                    (false, true) => 1,
                    (true, false) => -1,
                    _ => 0,
                },
                (false, true) => match (xt, zt) {
                    (true, false) => 1,
                    (true, true) => -1,
                    _ => 0,
                },
                (false, false) => 0,
            };
        }
        exponent += i32::from(self.phase[source]) + i32::from(self.phase[target]);
        (exponent.rem_euclid(4)) as u8
    }

    // Left-multiply row `target` by row `source`, storing the product in
    // `target`.
    fn multiply_row_into(&mut self, source: usize, target: usize) {
        self.phase[target] = self.product_phase(source, target);
        for word in 0..self.words {
            self.x[target * self.words + word] ^= self.x[source * self.words + word];
            self.z[target * self.words + word] ^= self.z[source * self.words + word];
        }
    }
}
