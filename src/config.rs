//! Device geometry, register masks and the polling policy of the driver.

/// Program granularity of the device.
pub const PAGE_SIZE: u32 = 0x100;
/// Smallest erasable unit.
pub const SECTOR_SIZE: u32 = 0x1000;
/// 64kB erase block, 16 sectors.
pub const BLOCK64_SIZE: u32 = 0x010000;
/// Largest address a 3-byte address frame can carry.
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;

/// Status register 1: erase or write in progress.
pub const STATUS_BUSY: u8 = 0x01;
/// Status register 1: write enable latch.
pub const STATUS_WEL: u8 = 0x02;
/// Status register 3: write protect scheme selection.
pub const STATUS3_WPS: u8 = 0x04;
/// Block lock register: the block or sector is locked.
pub const LOCK_BIT: u8 = 0x01;

/// Size of one flash device. Pages, sectors and blocks have the same size
/// across the family, see [`PAGE_SIZE`], [`SECTOR_SIZE`] and [`BLOCK64_SIZE`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Total size in bytes
    pub capacity: u32,
}

impl Geometry {
    pub const fn new(capacity: u32) -> Self {
        Self { capacity }
    }

    /// Bytes reachable with a 3-byte address frame. A capacity beyond
    /// `MAX_ADDRESS + 1` is cut down to it.
    pub const fn addressable(&self) -> u32 {
        if self.capacity > MAX_ADDRESS {
            MAX_ADDRESS + 1
        } else {
            self.capacity
        }
    }

    pub const fn sector_count(&self) -> u32 {
        self.capacity / SECTOR_SIZE
    }

    pub const fn page_count(&self) -> u32 {
        self.capacity / PAGE_SIZE
    }
}

/// W25Q16, 2MB
pub const W25Q16: Geometry = Geometry::new(0x0020_0000);
/// W25Q32, 4MB
pub const W25Q32: Geometry = Geometry::new(0x0040_0000);
/// W25Q64, 8MB
pub const W25Q64: Geometry = Geometry::new(0x0080_0000);
/// W25Q128, 16MB, the largest device a 3-byte address reaches.
pub const W25Q128: Geometry = Geometry::new(0x0100_0000);

/// Driver configuration: device geometry and timing policy.
///
/// Timings are in microseconds. The poll budget bounds every busy wait: a
/// sector erase on this device class takes up to 400ms, a chip erase up to
/// 200s, so the default budget covers the chip erase.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub geometry: Geometry,
    /// Delay between two status polls
    pub poll_interval_us: u32,
    /// Total time a busy wait may take before reporting a timeout
    pub poll_budget_us: u32,
    /// Delay between the write enable and the write-class command
    pub write_enable_settle_us: u32,
    /// Time the device needs after a software reset (tRST)
    pub reset_us: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(W25Q128)
    }
}

impl Config {
    pub const fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            poll_interval_us: 100,
            poll_budget_us: 200_000_000,
            write_enable_settle_us: 1,
            reset_us: 30,
        }
    }

    pub const fn with_poll_interval_us(mut self, interval: u32) -> Self {
        self.poll_interval_us = interval;
        self
    }

    pub const fn with_poll_budget_us(mut self, budget: u32) -> Self {
        self.poll_budget_us = budget;
        self
    }

    pub const fn with_write_enable_settle_us(mut self, settle: u32) -> Self {
        self.write_enable_settle_us = settle;
        self
    }

    pub const fn with_reset_us(mut self, reset: u32) -> Self {
        self.reset_us = reset;
        self
    }

    /// Number of status reads a busy wait may issue, at least one.
    pub const fn max_polls(&self) -> u32 {
        if self.poll_interval_us == 0 {
            return if self.poll_budget_us == 0 { 1 } else { self.poll_budget_us };
        }
        let polls = self.poll_budget_us / self.poll_interval_us;
        if polls == 0 {
            1
        } else {
            polls
        }
    }
}
