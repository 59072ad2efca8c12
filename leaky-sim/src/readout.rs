//! Projection of leaked measurement positions into classical labels.

use crate::errors::Error;

/// How a measurement position whose qubit was leaked is reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ReadoutStrategy {
    /// Report the raw label: the tableau bit for computational positions,
    /// `code + 1` for leaked ones. Labels ≥ 2 are therefore always leakage
    /// labels and never collide with computational 0/1.
    #[default]
    RawLabel = 0,
    /// Project each leaked position to a fresh unbiased coin flip.
    RandomLeakageProjection = 1,
    /// Project each leaked position to 1.
    DeterministicLeakageProjection = 2,
}

impl TryFrom<u8> for ReadoutStrategy {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        match code {
            0 => Ok(ReadoutStrategy::RawLabel),
            1 => Ok(ReadoutStrategy::RandomLeakageProjection),
            2 => Ok(ReadoutStrategy::DeterministicLeakageProjection),
            other => Err(Error::BadStrategy(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for strategy in [
            ReadoutStrategy::RawLabel,
            ReadoutStrategy::RandomLeakageProjection,
            ReadoutStrategy::DeterministicLeakageProjection,
        ] {
            assert_eq!(ReadoutStrategy::try_from(strategy as u8).unwrap(), strategy);
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(ReadoutStrategy::try_from(3), Err(Error::BadStrategy(3)));
        assert_eq!(ReadoutStrategy::try_from(255), Err(Error::BadStrategy(255)));
    }
}
