//! Register-polled SPI transport.
//!
//! Drives a master-mode SPI peripheral one byte at a time, polling its
//! status flags. Each wait on a flag is bounded by a retry count with a 1us
//! delay between retries.

use alloc::vec::Vec;
use embedded_hal::delay::DelayNs;

use crate::transport::{Transport, TransportError};
use crate::AnyhowResult;

/// Register-level access to a master-mode SPI peripheral configured for
/// 8-bit, full-duplex frames.
pub trait SpiPeripheral {
    /// A transfer is in progress (BSY).
    fn is_busy(&self) -> bool;

    /// The transmit data register can accept a byte (TXE).
    fn tx_empty(&self) -> bool;

    /// A received byte is waiting in the data register (RXNE).
    fn rx_not_empty(&self) -> bool;

    /// Load a byte into the data register, starting its transmission.
    fn write_data(&mut self, byte: u8);

    /// Take the received byte from the data register.
    fn read_data(&mut self) -> u8;
}

/// Transport which polls an `SpiPeripheral` for each byte.
pub struct PolledSpi<P: SpiPeripheral, D: DelayNs> {
    periph: P,
    delay: D,

    /// Maximum number of 1us waits on any single status flag.
    retries: u32,
}

impl<P: SpiPeripheral, D: DelayNs> PolledSpi<P, D> {
    /// Create a new PolledSpi, waiting at most 1000us on each status flag.
    pub fn new(periph: P, delay: D) -> Self {
        PolledSpi { periph, delay, retries: 1000 }
    }

    /// Get the number of 1us retries allowed when waiting on a status flag.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Set the number of 1us retries allowed when waiting on a status flag.
    pub fn set_retries(&mut self, n: u32) {
        self.retries = n;
    }

    /// Release the peripheral and delay.
    pub fn release(self) -> (P, D) {
        (self.periph, self.delay)
    }

    fn wait_for<F: Fn(&P) -> bool>(&mut self, ready: F, err: TransportError)
        -> AnyhowResult<()>
    {
        for _ in 0..self.retries {
            if ready(&self.periph) {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        if ready(&self.periph) {
            return Ok(());
        }
        log::warn!("SPI peripheral wait failed: {:?}", err);
        Err(err.into())
    }
}

impl<P: SpiPeripheral, D: DelayNs> Transport for PolledSpi<P, D> {
    fn exchange(&mut self, data: &[u8]) -> AnyhowResult<Vec<u8>> {
        if self.periph.is_busy() {
            log::warn!("SPI peripheral busy at start of exchange");
            return Err(TransportError::Busy.into());
        }

        let mut rx = Vec::with_capacity(data.len());
        for (index, byte) in data.iter().enumerate() {
            self.wait_for(|p| p.tx_empty(), TransportError::TxTimeout { index })?;
            self.periph.write_data(*byte);
            self.wait_for(|p| p.rx_not_empty(), TransportError::RxTimeout { index })?;
            rx.push(self.periph.read_data());
        }

        self.wait_for(|p| !p.is_busy(), TransportError::IdleTimeout)?;
        Ok(rx)
    }
}
