/// All possible errors emitted by the driver
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<SpiError> {
    /// Internal Spi error. The chip select has already been released.
    Spi(SpiError),

    /// The busy bit did not clear within the configured poll budget
    Timeout,

    /// The device reported a write or erase in progress
    Busy,

    /// Buffer length not valid for the operation
    InvalidLength,

    /// Address out of bound
    OutOfBounds,

    /// Address not aligned
    NotAligned,
}
