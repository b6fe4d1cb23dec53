//! Byte-exchange transport.

use alloc::vec::Vec;
use embedded_hal::spi::{Error as _, ErrorKind, SpiBus};

use crate::AnyhowResult;

/// Failures reported by the bundled transports.
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    #[cfg_attr(feature = "std", error("SPI peripheral busy at start of transfer."))]
    Busy,
    #[cfg_attr(feature = "std", error("Timed out waiting to transmit byte {index}."))]
    TxTimeout { index: usize },
    #[cfg_attr(feature = "std", error("Timed out waiting to receive byte {index}."))]
    RxTimeout { index: usize },
    #[cfg_attr(feature = "std", error("Timed out waiting for SPI peripheral to go idle."))]
    IdleTimeout,
    #[cfg_attr(feature = "std", error("SPI bus error: {0:?}."))]
    Bus(ErrorKind),
}

/// Trait for objects which exchange bytes with a flash over SPI.
///
/// Providers only need to implement `exchange()`, which clocks out every byte in
/// `data` while capturing one received byte per byte sent. Chip select is not
/// touched by the transport; framing is done separately through `ChipSelect`.
///
/// If it provides a performance optimisation, providers may also implement
/// `write()`, which does not require the received data.
pub trait Transport {
    /// Write all bytes in `data` while capturing received data.
    ///
    /// Returns exactly `data.len()` received bytes.
    fn exchange(&mut self, data: &[u8]) -> AnyhowResult<Vec<u8>>;

    /// Write all bytes in `data`, discarding the received data.
    fn write(&mut self, data: &[u8]) -> AnyhowResult<()> {
        // Default implementation uses `exchange()` and ignores the result data.
        self.exchange(data)?;
        Ok(())
    }

    /// Clock `length` filler bytes of 0x00 and return the received data.
    fn read(&mut self, length: usize) -> AnyhowResult<Vec<u8>> {
        self.exchange(&alloc::vec![0u8; length])
    }

    /// Write `data`, then read `length` bytes with no gap in framing between them.
    fn sequential(&mut self, data: &[u8], length: usize) -> AnyhowResult<Vec<u8>> {
        self.write(data)?;
        self.read(length)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, data: &[u8]) -> AnyhowResult<Vec<u8>> {
        (**self).exchange(data)
    }

    fn write(&mut self, data: &[u8]) -> AnyhowResult<()> {
        (**self).write(data)
    }

    fn read(&mut self, length: usize) -> AnyhowResult<Vec<u8>> {
        (**self).read(length)
    }

    fn sequential(&mut self, data: &[u8], length: usize) -> AnyhowResult<Vec<u8>> {
        (**self).sequential(data, length)
    }
}

/// Transport over an `embedded-hal` SPI bus.
///
/// The bus must not manage chip select itself; use a separate `ChipSelect`.
#[derive(Debug)]
pub struct HalBus<B> {
    bus: B,
}

impl<B: SpiBus<u8>> HalBus<B> {
    pub fn new(bus: B) -> Self {
        HalBus { bus }
    }

    /// Release the underlying bus.
    pub fn release(self) -> B {
        self.bus
    }

    fn bus_error(e: B::Error) -> TransportError {
        log::error!("SPI bus error: {:?}", e);
        TransportError::Bus(e.kind())
    }
}

impl<B: SpiBus<u8>> Transport for HalBus<B> {
    fn exchange(&mut self, data: &[u8]) -> AnyhowResult<Vec<u8>> {
        let mut buf = data.to_vec();
        self.bus.transfer_in_place(&mut buf).map_err(Self::bus_error)?;
        self.bus.flush().map_err(Self::bus_error)?;
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> AnyhowResult<()> {
        self.bus.write(data).map_err(Self::bus_error)?;
        self.bus.flush().map_err(Self::bus_error)?;
        Ok(())
    }
}
