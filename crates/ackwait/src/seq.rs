//! See [`Seq`].

use {
    core::{convert::Infallible, fmt},
    derive_more::{From, Into},
    octs::{BufTooShortOr, Decode, Encode, FixedEncodeLen, Read, Write},
    thiserror::Error,
};

/// Sequence number correlating one dispatched action with its
/// acknowledgment.
///
/// The sequence space is the full range of a [`u16`], and wraps around: the
/// value after [`Seq::MAX`] is `Seq(0)`. On the wire, a sequence number is
/// always exactly 2 bytes, big-endian.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, From, Into)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Seq(pub u16);

/// Failed to draw a random sequence number from the OS random source.
///
/// A waiter which failed to seed must not be used: falling back to a fixed
/// starting value would make sequence numbers predictable.
#[derive(Debug, Clone, Copy, Error)]
#[error("failed to draw random sequence number")]
pub struct SeedError(#[source] pub getrandom::Error);

impl Seq {
    /// Largest sequence number before the space wraps around to `Seq(0)`.
    pub const MAX: Self = Self(u16::MAX);

    /// Creates a new sequence number from a raw number.
    #[must_use]
    pub const fn new(n: u16) -> Self {
        Self(n)
    }

    /// Gets the sequence number which comes directly after `self`, wrapping
    /// around after [`Seq::MAX`].
    ///
    /// # Example
    ///
    /// ```
    /// # use ackwait::Seq;
    /// assert_eq!(Seq(3).next(), Seq(4));
    /// assert_eq!(Seq::MAX.next(), Seq(0));
    /// ```
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Draws a sequence number from the OS cryptographically secure random
    /// source.
    ///
    /// # Errors
    ///
    /// Errors if the random source is unavailable.
    pub fn random() -> Result<Self, SeedError> {
        let mut buf = [0; 2];
        getrandom::fill(&mut buf).map_err(SeedError)?;
        Ok(Self::from_be_slice(&buf))
    }

    /// Encodes this sequence number into its 2-byte big-endian wire form.
    ///
    /// # Example
    ///
    /// ```
    /// # use ackwait::Seq;
    /// assert_eq!(Seq(0x1234).to_be_bytes(), [0x12, 0x34]);
    /// ```
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Decodes a sequence number from the first 2 bytes of `buf`,
    /// big-endian.
    ///
    /// This decoding is permissive: if `buf` is shorter than 2 bytes, this
    /// gives `Seq(0)` instead of failing. Since `Seq(0)` is also a legitimate
    /// sequence number, it can't be used to detect a missing value. Use the
    /// [`Decode`] impl if a short buffer must be treated as an error.
    ///
    /// # Example
    ///
    /// ```
    /// # use ackwait::Seq;
    /// assert_eq!(Seq::from_be_slice(&[0x12, 0x34]), Seq(0x1234));
    /// assert_eq!(Seq::from_be_slice(&[0x12, 0x34, 0xff]), Seq(0x1234));
    /// assert_eq!(Seq::from_be_slice(&[0x12]), Seq(0));
    /// assert_eq!(Seq::from_be_slice(&[]), Seq(0));
    /// ```
    #[must_use]
    pub fn from_be_slice(buf: &[u8]) -> Self {
        match buf {
            [hi, lo, ..] => Self(u16::from_be_bytes([*hi, *lo])),
            _ => Self(0),
        }
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Seq").field(&self.0).finish()
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FixedEncodeLen for Seq {
    const ENCODE_LEN: usize = u16::ENCODE_LEN;
}

impl Encode for Seq {
    type Error = Infallible;

    fn encode(&self, mut dst: impl Write) -> Result<(), BufTooShortOr<Self::Error>> {
        dst.write(&self.0)
    }
}

impl Decode for Seq {
    type Error = Infallible;

    fn decode(mut src: impl Read) -> Result<Self, BufTooShortOr<Self::Error>> {
        Ok(Self(src.read()?))
    }
}
