//! Handoff of flash requests from an interrupt context to the main loop.
//!
//! The interrupt side only enqueues a [`Request`] token through its
//! [`RequestProducer`]; a single loop owning the [`Flash`] driver drains the
//! [`RequestConsumer`] and services each request to completion. No flag is
//! shared between the two contexts.

use embedded_hal::{delay::DelayNs, spi::SpiDevice};
use heapless::spsc::{Consumer, Producer, Queue};

use crate::{
    address::Address,
    blocking::Flash,
    config::PAGE_SIZE,
    error::Error,
    register::JedecId,
};

/// Number of bytes clocked in for the legacy manufacturer/device ID.
pub const LEGACY_ID_LEN: usize = 5;

/// A page sized buffer owned by the servicing loop
pub type PageBuffer = [u8; PAGE_SIZE as usize];

/// Actions an interrupt context may ask for
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Read both identification registers
    Detect,
    /// Erase sector 0, program page 0 with a counting pattern and verify it
    ReadWriteCycle,
}

/// Outcome of one serviced [`Request`]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Detected {
        jedec: JedecId,
        legacy: [u8; LEGACY_ID_LEN],
    },
    /// The read back page is left in the page buffer.
    Cycled {
        /// Offset of the first byte that did not read back as written
        mismatch: Option<usize>,
    },
}

/// Storage for pending requests, `N - 1` of them at most.
pub struct RequestQueue<const N: usize> {
    queue: Queue<Request, N>,
}

impl<const N: usize> RequestQueue<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Split into the interrupt and main loop ends.
    pub fn split(&mut self) -> (RequestProducer<'_, N>, RequestConsumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        (RequestProducer { producer }, RequestConsumer { consumer })
    }
}

impl<const N: usize> Default for RequestQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Enqueueing end, used from the interrupt context.
pub struct RequestProducer<'a, const N: usize> {
    producer: Producer<'a, Request, N>,
}

impl<const N: usize> RequestProducer<'_, N> {
    /// Queue a request. A full queue hands the request back.
    pub fn submit(&mut self, request: Request) -> Result<(), Request> {
        self.producer.enqueue(request)
    }
}

/// Dequeueing end, owned by the loop that owns the driver.
pub struct RequestConsumer<'a, const N: usize> {
    consumer: Consumer<'a, Request, N>,
}

impl<const N: usize> RequestConsumer<'_, N> {
    pub fn dequeue(&mut self) -> Option<Request> {
        self.consumer.dequeue()
    }

    pub fn pending(&self) -> usize {
        self.consumer.len()
    }
}

/// Service one request to completion.
pub fn service<SPI, D, E>(
    flash: &mut Flash<SPI, D>,
    request: Request,
    page: &mut PageBuffer,
) -> Result<Report, Error<E>>
where
    SPI: SpiDevice<Error = E>,
    D: DelayNs,
{
    match request {
        Request::Detect => {
            let jedec = flash.read_jedec_id()?;
            let mut legacy = [0u8; LEGACY_ID_LEN];
            flash.read_manufacturer_id(&mut legacy)?;
            Ok(Report::Detected { jedec, legacy })
        }
        Request::ReadWriteCycle => {
            let start = Address(0);
            flash.read(start, &mut page[..])?;
            #[cfg(feature = "defmt")]
            defmt::info!("Page 0 before program: {=[u8]:x}", &page[..]);

            for (i, byte) in page.iter_mut().enumerate() {
                *byte = i as u8;
            }
            flash.erase_sector(start)?;
            flash.program_page(start, &page[..])?;

            flash.read(start, &mut page[..])?;
            let mismatch = page.iter().enumerate().position(|(i, &b)| b != i as u8);
            #[cfg(feature = "defmt")]
            if let Some(offset) = mismatch {
                defmt::warn!("Page 0 verify failed at {=usize}", offset);
            }
            Ok(Report::Cycled { mismatch })
        }
    }
}

/// Service every pending request in arrival order, handing each outcome to
/// `handler`. A failed request does not stop the following ones. Returns the
/// number of requests serviced.
pub fn run_pending<SPI, D, E, const N: usize>(
    requests: &mut RequestConsumer<'_, N>,
    flash: &mut Flash<SPI, D>,
    page: &mut PageBuffer,
    mut handler: impl FnMut(Request, Result<Report, Error<E>>),
) -> usize
where
    SPI: SpiDevice<Error = E>,
    D: DelayNs,
{
    let mut serviced = 0;
    while let Some(request) = requests.dequeue() {
        let outcome = service(flash, request, page);
        handler(request, outcome);
        serviced += 1;
    }
    serviced
}
