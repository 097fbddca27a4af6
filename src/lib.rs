#![no_std]
//! This is a platform agnostic, blocking driver for the 25-series SPI NOR flash
//! (Winbond W25Q command set) using [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! Every mutating instruction is wrapped the way the device requires it: a
//! write enable in its own transaction right before the instruction, then
//! status polling until the busy bit clears. Polling is bounded, see
//! [`config::Config`].
//!
//! Supported geometries:
//! * W25Q16, see [`config::W25Q16`]
//! * W25Q32, see [`config::W25Q32`]
//! * W25Q64, see [`config::W25Q64`]
//! * W25Q128, see [`config::W25Q128`]
//!
//! The driver takes any [`embedded_hal::spi::SpiDevice`]. When the chip select
//! is a plain GPIO, [`bus::SelectDevice`] binds it to a [`embedded_hal::spi::SpiBus`].

pub mod address;
pub mod blocking;
pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod register;
pub mod request;

pub use crate::config::{BLOCK64_SIZE, PAGE_SIZE, SECTOR_SIZE};

use crate::error::Error;

pub(crate) fn check_erase<E>(capacity: u32, from: u32, to: u32) -> Result<(), Error<E>> {
    if from > to || to > capacity {
        return Err(Error::OutOfBounds);
    }
    if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}

pub(crate) fn check_write<E>(capacity: u32, offset: u32, length: usize) -> Result<(), Error<E>> {
    let Ok(length) = u32::try_from(length) else {
        return Err(Error::OutOfBounds);
    };
    if length > capacity || offset > capacity - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}
