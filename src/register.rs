use bit::BitIndex;

use crate::config::{LOCK_BIT, STATUS3_WPS, STATUS_BUSY, STATUS_WEL};

/// Manufacturer, memory type and capacity as returned by the JEDEC ID instruction.
/// No interpretation is made of the vendor or part.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JedecId {
    pub manufacturer: u8,
    pub memory_type: u8,
    pub capacity: u8,
}

impl From<[u8; 3]> for JedecId {
    fn from(raw: [u8; 3]) -> Self {
        JedecId {
            manufacturer: raw[0],
            memory_type: raw[1],
            capacity: raw[2],
        }
    }
}

impl From<JedecId> for [u8; 3] {
    fn from(id: JedecId) -> Self {
        [id.manufacturer, id.memory_type, id.capacity]
    }
}

/// Status register 1
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    pub status_register_protect: bool,
    pub top_bottom_protect: bool,
    pub protected_block: u8,
    pub write_enable_latch: bool,
    pub busy: bool,
    /// The raw byte read from the device
    pub raw: u8,
}

impl From<u8> for StatusRegister {
    fn from(val: u8) -> StatusRegister {
        StatusRegister {
            status_register_protect: val.bit(7),
            top_bottom_protect: val.bit(6),
            protected_block: val.bit_range(2..6),
            write_enable_latch: val & STATUS_WEL != 0,
            busy: val & STATUS_BUSY != 0,
            raw: val,
        }
    }
}

/// Write protection scheme selected in status register 3
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionScheme {
    /// Protection from the BP/TB bits of status register 1
    StatusBits,
    /// Protection from the individual block/sector lock bits
    IndividualLocks,
}

impl From<bool> for ProtectionScheme {
    fn from(val: bool) -> Self {
        if val {
            ProtectionScheme::IndividualLocks
        } else {
            ProtectionScheme::StatusBits
        }
    }
}

/// Status register 3
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister3 {
    pub protection: ProtectionScheme,
    pub driver_strength: u8,
    pub raw: u8,
}

impl From<u8> for StatusRegister3 {
    fn from(val: u8) -> StatusRegister3 {
        StatusRegister3 {
            protection: (val & STATUS3_WPS != 0).into(),
            driver_strength: val.bit_range(5..7),
            raw: val,
        }
    }
}

/// Lock state of one block or sector
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub raw: u8,
}

impl From<u8> for LockStatus {
    fn from(val: u8) -> LockStatus {
        LockStatus {
            locked: val & LOCK_BIT != 0,
            raw: val,
        }
    }
}
