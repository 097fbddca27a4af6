//! Chip-select bracketing of one atomic exchange on a SPI bus.
//!
//! [`SelectDevice`] owns a [`SpiBus`] and the select line of one flash chip and
//! exposes them as a [`SpiDevice`]: the select line is driven low for the whole
//! of a transaction and driven high again afterwards, including when the bus
//! reports a failure half way through. A select line left low would make the
//! device ignore, or misparse, every following instruction.

use embedded_hal::{
    delay::DelayNs,
    digital::OutputPin,
    spi::{self, ErrorKind, ErrorType, Operation, SpiBus, SpiDevice},
};

/// Failure of a [`SelectDevice`] transaction
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError<SpiError, PinError> {
    /// The byte exchange failed. The select line was released.
    Spi(SpiError),
    /// The select line could not be driven.
    Select(PinError),
}

impl<SpiError, PinError> spi::Error for BusError<SpiError, PinError>
where
    SpiError: spi::Error,
    PinError: core::fmt::Debug,
{
    fn kind(&self) -> ErrorKind {
        match self {
            BusError::Spi(e) => e.kind(),
            BusError::Select(_) => ErrorKind::ChipSelectFault,
        }
    }
}

/// A flash chip on a bus it does not share: the bus, its select line and a
/// delay for [`Operation::DelayNs`].
pub struct SelectDevice<BUS, CS, D> {
    bus: BUS,
    cs: CS,
    delay: D,
}

impl<BUS, CS, D> SelectDevice<BUS, CS, D>
where
    CS: OutputPin,
{
    /// Takes ownership of the bus and select line. The line is driven high
    /// (deselected) before returning.
    pub fn new(bus: BUS, mut cs: CS, delay: D) -> Result<Self, CS::Error> {
        cs.set_high()?;
        Ok(Self { bus, cs, delay })
    }

    /// Give back the bus, select line and delay.
    pub fn release(self) -> (BUS, CS, D) {
        (self.bus, self.cs, self.delay)
    }
}

impl<BUS, CS, D> SelectDevice<BUS, CS, D>
where
    BUS: SpiBus,
    D: DelayNs,
{
    fn exchange(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BUS::Error> {
        for op in operations {
            match op {
                Operation::Read(buf) => self.bus.read(buf)?,
                Operation::Write(buf) => self.bus.write(buf)?,
                Operation::Transfer(read, write) => self.bus.transfer(read, write)?,
                Operation::TransferInPlace(buf) => self.bus.transfer_in_place(buf)?,
                Operation::DelayNs(ns) => {
                    self.bus.flush()?;
                    self.delay.delay_ns(*ns);
                }
            }
        }
        // Every byte must be clocked out before the select line goes high
        self.bus.flush()
    }
}

impl<BUS, CS, D> ErrorType for SelectDevice<BUS, CS, D>
where
    BUS: ErrorType,
    CS: OutputPin,
{
    type Error = BusError<BUS::Error, CS::Error>;
}

impl<BUS, CS, D> SpiDevice for SelectDevice<BUS, CS, D>
where
    BUS: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(BusError::Select)?;
        let res = self.exchange(operations);
        let deselect = self.cs.set_high();

        #[cfg(feature = "defmt")]
        if res.is_err() {
            defmt::warn!("Bus fault, select released");
        }

        res.map_err(BusError::Spi)?;
        deselect.map_err(BusError::Select)
    }
}
