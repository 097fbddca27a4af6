use crate::{
    address::{Address, Block64, Sector},
    check_erase, check_write,
    command::Command,
    config::{Config, BLOCK64_SIZE, PAGE_SIZE, SECTOR_SIZE},
    error::Error,
    register::*,
};
use embedded_hal::{
    delay::DelayNs,
    spi::{Operation, SpiDevice},
};

/// Blocking driver for one 25-series flash chip.
///
/// Each public operation is one or more complete transactions on `SPI`; no
/// transaction is left open between calls. Write-class operations enable
/// writes right before the instruction and only return once the device is
/// idle again.
pub struct Flash<SPI, D> {
    spi: SPI,
    delay: D,
    config: Config,
}

impl<SPI, D, E> Flash<SPI, D>
where
    SPI: SpiDevice<Error = E>,
    D: DelayNs,
{
    pub fn new(spi: SPI, delay: D, config: Config) -> Self {
        Self { spi, delay, config }
    }

    /// Create the driver and wait until the device is ready to take instructions.
    pub fn init(spi: SPI, delay: D, config: Config) -> Result<Self, Error<E>> {
        let mut this = Self::new(spi, delay, config);
        this.wait_done()?;
        #[cfg(feature = "defmt")]
        {
            let status = this.read_status()?;
            defmt::debug!("Initial status: {:?}", status);
        }
        Ok(this)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Size of the device in bytes
    pub fn capacity(&self) -> usize {
        self.config.geometry.addressable() as usize
    }

    /// Give back the bus handle and the delay.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    fn check_addr(&self, addr: Address) -> Result<(), Error<E>> {
        check_write(self.config.geometry.addressable(), addr.0, 1)
    }

    fn check_range(&self, addr: Address, len: usize) -> Result<(), Error<E>> {
        check_write(self.config.geometry.addressable(), addr.0, len)
    }

    fn command_write(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        self.spi.write(bytes).map_err(Error::Spi)
    }

    fn command_transfer(&mut self, bytes: &mut [u8]) -> Result<(), Error<E>> {
        self.spi.transfer_in_place(bytes).map_err(Error::Spi)
    }

    fn write_read_base(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), Error<E>> {
        self.spi
            .transaction(&mut [Operation::Write(write), Operation::Read(read)])
            .map_err(Error::Spi)
    }

    fn write_base(&mut self, frame: &[u8], buff: &[u8]) -> Result<(), Error<E>> {
        self.spi
            .transaction(&mut [Operation::Write(frame), Operation::Write(buff)])
            .map_err(Error::Spi)
    }

    /// Read the status register. The value is read fresh on every call.
    pub fn read_status(&mut self) -> Result<StatusRegister, Error<E>> {
        let mut command = Command::ReadStatus.frame_with_dummy();
        self.command_transfer(&mut command)?;
        Ok(command[1].into())
    }

    /// Read status register 3, holding the write protect scheme selection.
    pub fn read_status3(&mut self) -> Result<StatusRegister3, Error<E>> {
        let mut command = Command::ReadStatus3.frame_with_dummy();
        self.command_transfer(&mut command)?;
        Ok(command[1].into())
    }

    /// Read the busy bit once, [`Error::Busy`] if a write or erase is in progress.
    pub fn poll_busy(&mut self) -> Result<(), Error<E>> {
        if self.read_status()?.busy {
            return Err(Error::Busy);
        }
        Ok(())
    }

    pub fn is_busy(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_status()?.busy)
    }

    pub fn is_write_enabled(&mut self) -> Result<bool, Error<E>> {
        Ok(self.read_status()?.write_enable_latch)
    }

    /// Block until the busy bit clears.
    ///
    /// The status register is polled every `poll_interval_us`, for at most
    /// `poll_budget_us`. A busy bit still set after that is reported as
    /// [`Error::Timeout`].
    pub fn wait_done(&mut self) -> Result<(), Error<E>> {
        let max_polls = self.config.max_polls();
        let mut polls = 0;
        loop {
            if !self.read_status()?.busy {
                return Ok(());
            }
            polls += 1;
            if polls >= max_polls {
                #[cfg(feature = "defmt")]
                defmt::error!("Flash still busy after {=u32} polls", polls);
                return Err(Error::Timeout);
            }
            self.delay.delay_us(self.config.poll_interval_us);
        }
    }

    /// Set the write enable latch. The device clears it once the next
    /// write-class instruction completes, so this is done internally before
    /// each of them.
    pub fn write_enable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&Command::WriteEnable.frame())?;
        self.delay.delay_us(self.config.write_enable_settle_us);
        Ok(())
    }

    /// Clear the write enable latch
    pub fn write_disable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&Command::WriteDisable.frame())
    }

    fn prepare_write(&mut self) -> Result<(), Error<E>> {
        self.wait_done()?;
        self.write_enable()
    }

    /// Read the JEDEC manufacturer and device identification.
    pub fn read_jedec_id(&mut self) -> Result<JedecId, Error<E>> {
        let mut id = [0u8; 3];
        self.write_read_base(&Command::ReadJedecId.frame(), &mut id)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("JEDEC id {=[u8]:x}", id);
        Ok(id.into())
    }

    /// Read the legacy manufacturer/device identification into `buff`.
    ///
    /// The length of the answer depends on the device family, so all of
    /// `buff` is clocked in and returned as is. At least 2 bytes are needed.
    pub fn read_manufacturer_id(&mut self, buff: &mut [u8]) -> Result<(), Error<E>> {
        if buff.len() < 2 {
            return Err(Error::InvalidLength);
        }
        self.write_read_base(&Command::ReadManufacturerId.frame(), buff)
    }

    /// Read the lock bit of the block or sector containing `addr`.
    pub fn read_lock(&mut self, addr: Address) -> Result<LockStatus, Error<E>> {
        self.check_addr(addr)?;
        let frame = Command::ReadBlockLock.addr_frame(addr)?;
        let mut lock = [0u8; 1];
        self.write_read_base(&frame, &mut lock)?;
        Ok(lock[0].into())
    }

    /// Read `buff.len()` bytes starting at `addr`.
    pub fn read(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        self.check_range(addr, buff.len())?;
        let frame = Command::Read.addr_frame(addr)?;
        self.wait_done()?;

        let res = self.write_read_base(&frame, buff);
        #[cfg(feature = "defmt")]
        if res.is_ok() {
            defmt::trace!("Read from {=u32}, {=usize}: {:?}", addr.0, buff.len(), buff);
        } else {
            defmt::error!("Read from {=u32} failed", addr.0);
        }
        res
    }

    /// Program one full page at a page aligned `addr`.
    ///
    /// Programming can only clear bits: the page ends up holding the AND of
    /// its previous content and `buff`. Erase the sector first to store
    /// arbitrary data.
    pub fn program_page(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        if buff.len() != PAGE_SIZE as usize {
            return Err(Error::InvalidLength);
        }
        if !addr.is_aligned(PAGE_SIZE) {
            return Err(Error::NotAligned);
        }
        self.write_page(addr, buff)
    }

    /// Program `buff` at `addr`, which may be anywhere as long as the
    /// whole of `buff` stays within one page. The device would otherwise
    /// wrap around to the start of the page.
    pub fn write_page(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        if buff.is_empty() || (addr.0 % PAGE_SIZE) as usize + buff.len() > PAGE_SIZE as usize {
            return Err(Error::InvalidLength);
        }
        self.check_range(addr, buff.len())?;
        let frame = Command::ProgramPage.addr_frame(addr)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Program {=u32} len {=usize}", addr.0, buff.len());
        self.prepare_write()?;
        self.write_base(&frame, buff)?;
        self.wait_done()
    }

    fn erase_base(&mut self, addr: Address, cmd: Command, size: u32) -> Result<(), Error<E>> {
        debug_assert!(cmd.is_write_class());
        self.check_addr(addr)?;
        if !addr.is_aligned(size) {
            return Err(Error::NotAligned);
        }
        let frame = cmd.addr_frame(addr)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Erase {=u32} len {=u32}", addr.0, size);
        self.prepare_write()?;
        self.command_write(&frame)?;
        self.wait_done()
    }

    /// Erase the 4kB sector starting at `addr`, every byte reads 0xFF afterwards.
    pub fn erase_sector(&mut self, addr: Address) -> Result<(), Error<E>> {
        self.erase_base(addr, Command::SectorErase, SECTOR_SIZE)
    }

    /// Erase the 64kB block starting at `addr`.
    pub fn erase_block64(&mut self, addr: Address) -> Result<(), Error<E>> {
        self.erase_base(addr, Command::BlockErase, BLOCK64_SIZE)
    }

    /// Erase a sector by id
    pub fn erase_sector_id(&mut self, sector: Sector) -> Result<(), Error<E>> {
        self.erase_sector(Address::from_sector(sector))
    }

    /// Erase a 64kB block by id
    pub fn erase_block64_id(&mut self, block: Block64) -> Result<(), Error<E>> {
        self.erase_block64(Address::from_block64(block))
    }

    /// Erase the whole chip.
    pub fn erase_chip(&mut self) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::warn!("Chip erase");
        self.prepare_write()?;
        self.command_write(&Command::ChipErase.frame())?;
        self.wait_done()
    }

    /// Software reset to the power-on state: enable reset then reset, each in
    /// its own transaction. No instruction is accepted during `reset_us`.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.wait_done()?;
        self.command_write(&Command::ResetEnable.frame())?;
        self.command_write(&Command::ResetMemory.frame())?;
        self.delay.delay_us(self.config.reset_us);
        Ok(())
    }
}

/// Implementation of the `NorFlash` traits of the `embedded_storage` crate.
/// Writes are split on page boundaries and erases are done sector by sector.
mod es {
    use super::*;
    use core::fmt::Debug;
    use embedded_storage::nor_flash::{
        ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
    };

    impl<E> From<NorFlashErrorKind> for Error<E> {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned => Error::NotAligned,
                NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
                _ => Error::InvalidLength,
            }
        }
    }

    impl<SpiError> NorFlashError for Error<SpiError>
    where
        SpiError: Debug,
    {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
                Error::NotAligned => NorFlashErrorKind::NotAligned,
                Error::InvalidLength
                | Error::Spi(_)
                | Error::Busy
                | Error::Timeout => NorFlashErrorKind::Other,
            }
        }
    }

    impl<SPI, D, E> ErrorType for Flash<SPI, D>
    where
        SPI: SpiDevice<Error = E>,
        E: Debug,
    {
        type Error = Error<E>;
    }

    impl<SPI, D, E> ReadNorFlash for Flash<SPI, D>
    where
        SPI: SpiDevice<Error = E>,
        D: DelayNs,
        E: Debug,
    {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            Flash::read(self, Address(offset), bytes)
        }

        fn capacity(&self) -> usize {
            Flash::capacity(self)
        }
    }

    impl<SPI, D, E> NorFlash for Flash<SPI, D>
    where
        SPI: SpiDevice<Error = E>,
        D: DelayNs,
        E: Debug,
    {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = SECTOR_SIZE as usize;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(self.config.geometry.addressable(), from, to)?;
            let mut sector = from;
            while sector < to {
                self.erase_sector(Address(sector))?;
                sector += SECTOR_SIZE;
            }
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_write(self.config.geometry.addressable(), offset, bytes.len())?;
            let mut cursor = offset;
            let mut bytes = bytes;
            while !bytes.is_empty() {
                let page_remain = (PAGE_SIZE - cursor % PAGE_SIZE) as usize;
                let (now, later) = bytes.split_at(page_remain.min(bytes.len()));
                self.write_page(Address(cursor), now)?;
                cursor += now.len() as u32;
                bytes = later;
            }
            Ok(())
        }
    }

    /// Programming only clears bits, so a byte may be written again without
    /// an erase as long as the new value only clears more bits.
    impl<SPI, D, E> MultiwriteNorFlash for Flash<SPI, D>
    where
        SPI: SpiDevice<Error = E>,
        D: DelayNs,
        E: Debug,
    {
    }
}
