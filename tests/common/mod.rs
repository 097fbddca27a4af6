//! A simulated W25 flash chip for host tests.
//!
//! The chip is shared between a [`SimBus`] (the SPI bus) and a [`SimSelect`]
//! (its chip-select line). Bytes are interpreted as they are clocked, and
//! instructions take effect when the select line goes high, like on the real
//! device. Anything the real device would silently ignore or misparse is
//! recorded in [`Chip::violations`].
#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{self, OutputPin},
    spi::{self, ErrorKind, SpiBus},
};
use w25_flash::{
    blocking::Flash,
    bus::SelectDevice,
    config::{Config, Geometry, SECTOR_SIZE},
};

pub const CAPACITY: u32 = 0x2_0000;
pub const JEDEC: [u8; 3] = [0xEF, 0x40, 0x18];
pub const LEGACY: [u8; 2] = [0xEF, 0x17];

pub struct Chip {
    pub mem: Vec<u8>,
    pub locks: Vec<bool>,
    pub status3: u8,
    /// Cells that read back as zero no matter what, like worn out bits
    pub stuck_zero: Vec<usize>,
    /// Status reads a write-class instruction keeps the device busy for
    pub busy_cost: u32,
    busy_polls: u32,
    wel: bool,
    reset_enabled: bool,
    selected: bool,
    rx: Vec<u8>,
    /// Fail the exchange of this byte index in the current transaction
    pub fail_at_byte: Option<usize>,
    /// Bytes sent by the host, one entry per completed transaction
    pub frames: Vec<Vec<u8>>,
    /// Every status register 1 value sent back to the host
    pub status_log: Vec<u8>,
    /// WEL as seen by each accepted write-class instruction
    pub wel_at_write: Vec<bool>,
    /// Select line levels, `true` for high
    pub select_levels: Vec<bool>,
    pub violations: Vec<String>,
}

impl Chip {
    pub fn new(capacity: u32) -> Self {
        Self {
            mem: vec![0xFF; capacity as usize],
            locks: vec![false; (capacity / SECTOR_SIZE) as usize],
            status3: 0x60,
            stuck_zero: Vec::new(),
            busy_cost: 3,
            busy_polls: 0,
            wel: false,
            reset_enabled: false,
            selected: false,
            rx: Vec::new(),
            fail_at_byte: None,
            frames: Vec::new(),
            status_log: Vec::new(),
            wel_at_write: Vec::new(),
            select_levels: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn status(&self) -> u8 {
        let mut status = 0;
        if self.busy_polls > 0 {
            status |= 0x01;
        }
        if self.wel {
            status |= 0x02;
        }
        status
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Report busy for the next `polls` status reads.
    pub fn set_busy_for(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Keep the busy bit set forever, as a failed device would.
    pub fn stick_busy(&mut self) {
        self.busy_polls = u32::MAX;
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.frames.iter().filter_map(|f| f.first().copied()).collect()
    }

    fn addr(&self) -> usize {
        ((self.rx[1] as usize) << 16 | (self.rx[2] as usize) << 8 | self.rx[3] as usize)
            % self.mem.len()
    }

    fn clock(&mut self, mosi: u8) -> Result<u8, ErrorKind> {
        if !self.selected {
            self.violations.push(format!("byte {mosi:#04x} clocked while deselected"));
            return Ok(0xFF);
        }
        let pos = self.rx.len();
        if self.fail_at_byte == Some(pos) {
            self.fail_at_byte = None;
            return Err(ErrorKind::Other);
        }
        if pos == 0 && self.busy_polls > 0 && mosi != 0x05 {
            self.violations.push(format!("instruction {mosi:#04x} while busy"));
        }
        self.rx.push(mosi);
        if pos == 0 {
            return Ok(0xFF);
        }

        let miso = match self.rx[0] {
            0x05 => {
                let status = self.status();
                self.status_log.push(status);
                status
            }
            0x15 => self.status3,
            0x9F if pos <= 3 => JEDEC[pos - 1],
            0x90 if pos >= 4 => LEGACY[(pos - 4) % 2],
            0x03 if pos >= 4 => {
                let idx = (self.addr() + pos - 4) % self.mem.len();
                self.mem[idx]
            }
            0x3D if pos == 4 => {
                let sector = self.addr() / SECTOR_SIZE as usize;
                self.locks[sector] as u8
            }
            _ => 0xFF,
        };
        Ok(miso)
    }

    fn start_write(&mut self) -> bool {
        self.wel_at_write.push(self.wel);
        if !self.wel {
            self.violations
                .push(format!("write-class {:#04x} without write enable", self.rx[0]));
            return false;
        }
        self.busy_polls = self.busy_cost;
        if self.busy_cost == 0 {
            self.wel = false;
        }
        true
    }

    fn erase(&mut self, start: usize, size: usize) {
        let start = start - start % size;
        self.mem[start..start + size].fill(0xFF);
        for &idx in &self.stuck_zero {
            self.mem[idx] = 0x00;
        }
    }

    fn commit(&mut self) {
        self.frames.push(self.rx.clone());
        let Some(&opcode) = self.rx.first() else {
            return;
        };
        let len = self.rx.len();
        match opcode {
            0x05 if len >= 2 && self.busy_polls > 0 && self.busy_polls != u32::MAX => {
                self.busy_polls -= 1;
                if self.busy_polls == 0 {
                    self.wel = false;
                }
            }
            0x06 if len == 1 => self.wel = true,
            0x04 if len == 1 => self.wel = false,
            0x02 if len > 4 => {
                if self.start_write() {
                    let addr = self.addr();
                    let base = addr & !0xFF;
                    for (i, byte) in self.rx[4..].iter().enumerate() {
                        let idx = base + ((addr + i) & 0xFF);
                        self.mem[idx] &= *byte;
                    }
                }
            }
            0x20 if len == 4 => {
                if self.start_write() {
                    self.erase(self.addr(), SECTOR_SIZE as usize);
                }
            }
            0xD8 if len == 4 => {
                if self.start_write() {
                    self.erase(self.addr(), 0x1_0000);
                }
            }
            0xC7 if len == 1 => {
                if self.start_write() {
                    self.erase(0, self.mem.len());
                }
            }
            0x66 if len == 1 => self.reset_enabled = true,
            0x99 if len == 1 && self.reset_enabled => {
                self.reset_enabled = false;
                self.wel = false;
                self.busy_polls = 0;
            }
            0x02 | 0x20 | 0xD8 | 0xC7 | 0x06 | 0x04 | 0x66 | 0x99 => {
                self.violations
                    .push(format!("malformed instruction {:02x?}", self.rx));
            }
            _ => {}
        }
        if opcode != 0x66 {
            self.reset_enabled = false;
        }
        self.rx.clear();
    }
}

pub type Shared = Rc<RefCell<Chip>>;

pub struct SimBus(pub Shared);

impl spi::ErrorType for SimBus {
    type Error = ErrorKind;
}

impl SpiBus for SimBus {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        for word in words {
            *word = chip.clock(0x00)?;
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        for word in words {
            chip.clock(*word)?;
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        for i in 0..read.len().max(write.len()) {
            let miso = chip.clock(write.get(i).copied().unwrap_or(0x00))?;
            if let Some(word) = read.get_mut(i) {
                *word = miso;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        for word in words {
            *word = chip.clock(*word)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub struct SimSelect(pub Shared);

impl digital::ErrorType for SimSelect {
    type Error = Infallible;
}

impl OutputPin for SimSelect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.selected {
            chip.violations.push("selected twice".into());
        }
        chip.selected = true;
        chip.rx.clear();
        chip.select_levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.selected {
            chip.commit();
        }
        chip.selected = false;
        chip.select_levels.push(true);
        Ok(())
    }
}

/// Delay that only accounts for the requested time.
#[derive(Clone, Default)]
pub struct TestDelay(pub Rc<Cell<u64>>);

impl TestDelay {
    pub fn elapsed_ns(&self) -> u64 {
        self.0.get()
    }
}

impl DelayNs for TestDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + ns as u64);
    }
}

pub type SimDevice = SelectDevice<SimBus, SimSelect, TestDelay>;
pub type SimFlash = Flash<SimDevice, TestDelay>;

pub fn test_config() -> Config {
    Config::new(Geometry::new(CAPACITY))
        .with_poll_interval_us(10)
        .with_poll_budget_us(1_000)
}

pub fn device(chip: &Shared) -> SimDevice {
    SelectDevice::new(SimBus(chip.clone()), SimSelect(chip.clone()), TestDelay::default())
        .unwrap()
}

/// A driver on a fresh, fully erased simulated chip.
pub fn sim_flash() -> (SimFlash, Shared, TestDelay) {
    sim_flash_with(Chip::new(CAPACITY), test_config())
}

pub fn sim_flash_with(chip: Chip, config: Config) -> (SimFlash, Shared, TestDelay) {
    let chip = Rc::new(RefCell::new(chip));
    let delay = TestDelay::default();
    let flash = Flash::new(device(&chip), delay.clone(), config);
    // Forget the select level set up by `SelectDevice::new`
    chip.borrow_mut().select_levels.clear();
    (flash, chip, delay)
}
