use crate::{address::Address, error::Error};

/// Instruction set of the 25-series flash, single SPI mode.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Read data
    Read = 0x03,
    /// Program up to one page
    ProgramPage = 0x02,
    /// Erase a 4kB sector
    SectorErase = 0x20,
    /// Erase a 64kB block
    BlockErase = 0xD8,
    /// Erase the whole array
    ChipErase = 0xC7,
    /// Read status register 1
    ReadStatus = 0x05,
    /// Read status register 3
    ReadStatus3 = 0x15,
    /// Set the write enable latch
    WriteEnable = 0x06,
    /// Clear the write enable latch
    WriteDisable = 0x04,
    /// Read 8-bit manufacturer ID, 16-bit device ID
    ReadJedecId = 0x9F,
    /// Legacy manufacturer and device ID, response length depends on the family
    ReadManufacturerId = 0x90,
    /// Read the individual block/sector lock bit
    ReadBlockLock = 0x3D,
    ResetEnable = 0x66,
    ResetMemory = 0x99,

    /// Filler clocked out while the device answers
    Dummy = 0xFF,
}

impl Command {
    /// Frame of a command without address.
    pub const fn frame(self) -> [u8; 1] {
        [self as u8]
    }

    /// Frame of a register read: the opcode and one don't-care cycle
    /// during which the register byte is shifted out.
    pub const fn frame_with_dummy(self) -> [u8; 2] {
        [self as u8, Command::Dummy as u8]
    }

    /// `[opcode, A23-A16, A15-A8, A7-A0]`, the same layout for every
    /// address-bearing instruction.
    pub fn addr_frame<E>(self, addr: Address) -> Result<[u8; 4], Error<E>> {
        let [a2, a1, a0] = addr.to_be_bytes().ok_or(Error::OutOfBounds)?;
        Ok([self as u8, a2, a1, a0])
    }

    /// Instructions that need the write enable latch set.
    pub const fn is_write_class(self) -> bool {
        matches!(
            self,
            Command::ProgramPage | Command::SectorErase | Command::BlockErase | Command::ChipErase
        )
    }
}
