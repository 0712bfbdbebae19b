use thiserror::Error;

/// Change recorded against a session or stream count.
///
/// See [`Metrics`](crate::Metrics) for how each one is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Delta {
    /// An attempt failed. Raw value `0`.
    Failed,
    /// An attempt succeeded, and is now active. Raw value `1`.
    Opened,
    /// An active one finished. Raw value `-1`.
    Closed,
}

/// Raw value given to [`Delta::try_from`] is not `0`, `1`, or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid delta: {0}")]
pub struct DeltaError(pub i64);

impl Delta {
    /// Gets the raw value of this delta.
    #[must_use]
    pub const fn raw(self) -> i64 {
        match self {
            Self::Failed => 0,
            Self::Opened => 1,
            Self::Closed => -1,
        }
    }

    /// Converts a raw value into a delta.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is not `0`, `1`, or `-1`. Passing anything else is a
    /// bug in the caller, not a condition to recover from; use
    /// [`Delta::try_from`] if the value comes from outside.
    #[must_use]
    #[track_caller]
    pub fn from_raw(raw: i64) -> Self {
        match Self::try_from(raw) {
            Ok(delta) => delta,
            Err(err) => panic!("{err}"),
        }
    }
}

impl TryFrom<i64> for Delta {
    type Error = DeltaError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Failed),
            1 => Ok(Self::Opened),
            -1 => Ok(Self::Closed),
            _ => Err(DeltaError(raw)),
        }
    }
}

impl From<Delta> for i64 {
    fn from(value: Delta) -> Self {
        value.raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values() {
        for delta in [Delta::Failed, Delta::Opened, Delta::Closed] {
            assert_eq!(Delta::from_raw(delta.raw()), delta);
        }
        assert_eq!(Delta::try_from(2), Err(DeltaError(2)));
        assert_eq!(Delta::try_from(-2), Err(DeltaError(-2)));
    }

    #[test]
    #[should_panic(expected = "invalid delta: 5")]
    fn out_of_range_panics() {
        let _ = Delta::from_raw(5);
    }
}
