use crate::config::{BLOCK64_SIZE, MAX_ADDRESS, PAGE_SIZE, SECTOR_SIZE};

/// A 64kB block id, containing 16 sectors
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Block64(pub u16);

/// A sector id, containing 16 pages for a total of 4kB.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sector(pub u16);

/// A page id within a sector, containing 256 bytes
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page(pub u8);

/// A 24-bit byte offset on the memory chip
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u32);

impl Address {
    /// Represents any address in memory.
    pub fn from_addr(sector: Sector, page: Page, offset: u8) -> Self {
        let addr = sector.0 as u32 * SECTOR_SIZE + page.0 as u32 * PAGE_SIZE + offset as u32;
        Address(addr)
    }

    /// Represents a specific page in memory.
    pub fn from_page(sector: Sector, page: Page) -> Self {
        Self::from_addr(sector, page, 0)
    }

    /// Represents a specific sector in memory.
    pub fn from_sector(sector: Sector) -> Self {
        Self::from_addr(sector, Page(0), 0)
    }

    /// Represents a specific 64kB block in memory.
    pub fn from_block64(block: Block64) -> Self {
        Address(block.0 as u32 * BLOCK64_SIZE)
    }

    /// True when the value fits in the 3 address bytes sent on the wire.
    pub fn is_24bit(self) -> bool {
        self.0 <= MAX_ADDRESS
    }

    /// The big-endian address bytes, `None` if any of the top 8 bits is set.
    pub fn to_be_bytes(self) -> Option<[u8; 3]> {
        if !self.is_24bit() {
            return None;
        }
        Some([(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8])
    }

    pub fn is_aligned(self, boundary: u32) -> bool {
        self.0 % boundary == 0
    }
}

impl From<u16> for Block64 {
    fn from(block_id: u16) -> Block64 {
        Block64(block_id)
    }
}

impl From<u16> for Sector {
    fn from(sector_id: u16) -> Sector {
        Sector(sector_id)
    }
}

impl From<u8> for Page {
    fn from(page_id: u8) -> Page {
        Page(page_id)
    }
}

impl From<u32> for Address {
    fn from(addr: u32) -> Address {
        Address(addr)
    }
}

impl From<Address> for u32 {
    fn from(addr: Address) -> u32 {
        addr.0
    }
}

impl From<Sector> for Address {
    fn from(sector: Sector) -> Address {
        Address::from_sector(sector)
    }
}
