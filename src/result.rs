use core::fmt::Debug;

/// Error type
///
/// `E` is the error of the underlying pin implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// Wire never floated high before the reset pulse (short or missing pull-up)
    WireFault,
    /// No presence pulse after a reset, nothing is on the wire
    NoDevice,
    /// A ROM code or scratchpad frame failed its CRC-8 check
    CrcMismatch {
        computed: u8,
        stored: u8,
    },
    /// A ROM code was handed to a driver for a different device family
    FamilyCodeMismatch {
        expected: u8,
        found: u8,
    },
    Port(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Port(e)
    }
}
