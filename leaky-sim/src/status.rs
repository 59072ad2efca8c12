//! Per-qubit leakage level tracking.

use std::fmt;

use smallvec::SmallVec;

/// Largest representable leakage level code.
///
/// Code 0 is the computational subspace; code k ≥ 1 is the k-th leakage
/// level |k+1⟩, so the default ceiling covers models with up to 16 levels.
pub const MAX_LEVEL_CODE: u8 = 15;

/// Classical leakage state of an ordered set of qubits.
///
/// One level code per qubit: 0 for the computational subspace {|0⟩, |1⟩},
/// k ≥ 1 for the k-th leakage level |k+1⟩. Equality is structural.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeakageStatus {
    codes: SmallVec<[u8; 2]>,
}

impl LeakageStatus {
    /// All-computational status for `qubit_count` qubits.
    #[must_use]
    pub fn new(qubit_count: usize) -> Self {
        LeakageStatus {
            codes: smallvec::smallvec![0; qubit_count],
        }
    }

    /// The number of qubits described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Set the level code of `qubit`.
    ///
    /// # Panics
    ///
    /// Panics when `qubit` is out of range or `code` exceeds
    /// [`MAX_LEVEL_CODE`].
    pub fn set(&mut self, qubit: usize, code: u8) {
        assert!(
            code <= MAX_LEVEL_CODE,
            "level code {code} exceeds the maximum of {MAX_LEVEL_CODE}"
        );
        self.codes[qubit] = code;
    }

    /// Return `qubit` to the computational subspace.
    ///
    /// # Panics
    ///
    /// Panics when `qubit` is out of range.
    pub fn reset(&mut self, qubit: usize) {
        self.codes[qubit] = 0;
    }

    /// Return every qubit to the computational subspace.
    pub fn clear(&mut self) {
        self.codes.fill(0);
    }

    /// The level code of `qubit`.
    ///
    /// # Panics
    ///
    /// Panics when `qubit` is out of range.
    #[must_use]
    pub fn get(&self, qubit: usize) -> u8 {
        self.codes[qubit]
    }

    /// True when `qubit` sits outside the computational subspace.
    #[must_use]
    pub fn is_leaked(&self, qubit: usize) -> bool {
        self.codes[qubit] > 0
    }

    /// True when any qubit sits outside the computational subspace.
    #[must_use]
    pub fn any_leaked(&self) -> bool {
        self.codes.iter().any(|&code| code > 0)
    }

    /// Iterate over the level codes in qubit order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.codes.iter().copied()
    }
}

impl From<&[u8]> for LeakageStatus {
    fn from(codes: &[u8]) -> Self {
        codes.iter().copied().collect()
    }
}

impl<const N: usize> From<[u8; N]> for LeakageStatus {
    fn from(codes: [u8; N]) -> Self {
        codes.into_iter().collect()
    }
}

impl FromIterator<u8> for LeakageStatus {
    fn from_iter<I: IntoIterator<Item = u8>>(codes: I) -> Self {
        let codes: SmallVec<[u8; 2]> = codes.into_iter().collect();
        assert!(
            codes.iter().all(|&code| code <= MAX_LEVEL_CODE),
            "level code exceeds the maximum of {MAX_LEVEL_CODE}"
        );
        LeakageStatus { codes }
    }
}

impl fmt::Display for LeakageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in self.iter() {
            if code == 0 {
                write!(f, "|C⟩")?;
            } else {
                write!(f, "|{}⟩", code + 1)?;
            }
        }
        Ok(())
    }
}
