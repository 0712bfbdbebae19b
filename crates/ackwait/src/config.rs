//! Configuration for constructing an [`AckWaiter`].
//!
//! [`AckWaiter`]: crate::AckWaiter

use crate::seq::{SeedError, Seq};

/// Configuration for an [`AckWaiter`].
///
/// [`AckWaiter`]: crate::AckWaiter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct WaiterConfig {
    /// Sequence number handed out by the first wait.
    pub first_seq: FirstSeq,
}

/// How the first sequence number of an [`AckWaiter`] is chosen.
///
/// [`AckWaiter`]: crate::AckWaiter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum FirstSeq {
    /// Drawn from the OS random source, so that sequence numbers can't be
    /// guessed by someone observing traffic.
    #[default]
    Random,
    /// Fixed value, for tests and deterministic setups.
    Fixed(Seq),
}

impl FirstSeq {
    /// Gets the concrete sequence number, drawing a random one if needed.
    ///
    /// # Errors
    ///
    /// Errors if this is [`FirstSeq::Random`] and the random source is
    /// unavailable.
    pub fn resolve(self) -> Result<Seq, SeedError> {
        match self {
            Self::Random => Seq::random(),
            Self::Fixed(seq) => Ok(seq),
        }
    }
}
