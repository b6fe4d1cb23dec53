// Copyright 2020, 2021 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! w25q-flash
//!
//! This crate provides a driver for Winbond W25Q serial NOR flash memories,
//! including status register access, reading, page programming with readback
//! verification, erasing, and individual block locking.
//!
//! The driver talks to the flash through three borrowed collaborators:
//! a [`Transport`] which exchanges bytes on the SPI bus, a [`ChipSelect`]
//! which frames each command, and an `embedded_hal` delay.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
use alloc::vec::Vec;
use core::convert::TryFrom;

use embedded_hal::delay::DelayNs;
#[cfg(feature = "std")]
use indicatif::{ProgressBar, ProgressStyle};

pub mod address;
pub mod chip_select;
pub mod id;
pub mod polled;
pub mod sreg;
pub mod transport;

#[cfg(all(test, feature = "std"))]
mod sim;

pub use address::{Address, BLOCK_SIZE, CAPACITY, PAGE_SIZE, SECTOR_SIZE};
pub use chip_select::{ChipSelect, GpioChipSelect};
pub use id::FlashId;
pub use polled::{PolledSpi, SpiPeripheral};
pub use sreg::{StatusRegister, StatusRegister1, StatusRegister2, StatusRegister3};
pub use transport::{HalBus, Transport, TransportError};

#[cfg(feature = "std")]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Mismatch during flash readback verification at 0x{address:06X}: \
             wrote 0x{wrote:02X}, read 0x{read:02X}.")]
    ReadbackError { address: u32, wrote: u8, read: u8 },
    #[error("Status register {register:?} reads 0x{read:02X} after write, \
             expected 0x{expected:02X} under mask 0x{mask:02X}.")]
    StatusMismatch { register: StatusRegister, mask: u8, expected: u8, read: u8 },
    #[error("Write enable latch was not set by WriteEnable.")]
    WriteEnableFailed,
    #[error("Write enable latch still set after reset.")]
    ResetFailed,
    #[error("Invalid flash coordinates: sector {sector}, page {page}.")]
    InvalidCoordinates { sector: u8, page: u8 },
    #[error("Address out of range for memory: 0x{address:08X}.")]
    InvalidAddress { address: u32 },
    #[error("Programming {length} bytes at page offset {offset} would cross a page boundary.")]
    PageOverflow { offset: u8, length: usize },
    #[error("Verification buffer holds {verify} bytes but {data} bytes are being programmed.")]
    BufferLength { data: usize, verify: usize },
    #[error("Block {block} is already locked.")]
    AlreadyLocked { block: u8 },
    #[error("Block {block} is already unlocked.")]
    AlreadyUnlocked { block: u8 },
    #[error("Flash still busy after {polls} status polls.")]
    BusyTimeout { polls: u32 },
    #[error("Write enable latch still set after {polls} status polls.")]
    LatchTimeout { polls: u32 },

    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Access(anyhow::Error),
}
#[cfg(not(feature = "std"))]
#[derive(Debug)]
pub enum Error<E> {
    ReadbackError { address: u32, wrote: u8, read: u8 },
    StatusMismatch { register: StatusRegister, mask: u8, expected: u8, read: u8 },
    WriteEnableFailed,
    ResetFailed,
    InvalidCoordinates { sector: u8, page: u8 },
    InvalidAddress { address: u32 },
    PageOverflow { offset: u8, length: usize },
    BufferLength { data: usize, verify: usize },
    AlreadyLocked { block: u8 },
    AlreadyUnlocked { block: u8 },
    BusyTimeout { polls: u32 },
    LatchTimeout { polls: u32 },

    Transport(TransportError),
    Access(E),
}

#[cfg(feature = "std")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        // Keep failures from the bundled transports distinguishable.
        match err.downcast::<TransportError>() {
            Ok(err) => Error::Transport(err),
            Err(err) => Error::Access(err),
        }
    }
}
#[cfg(not(feature = "std"))]
impl<E> From<TransportError> for Error<E> {
    fn from(err: TransportError) -> Self {
        Error::Transport(err)
    }
}

#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, Error>;
#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, Error<()>>;

#[cfg(feature = "std")]
pub type AnyhowResult<T> = anyhow::Result<T>;
#[cfg(not(feature = "std"))]
pub type AnyhowResult<T> = Result<T>;

/// Settling time after writing a status register (tW).
const STATUS_WRITE_DELAY_US: u32 = 1;
/// Time for the device to come out of a software reset (tRST).
const RESET_DELAY_US: u32 = 30;
/// Minimum time to wait after ChipErase before polling BUSY.
const CHIP_ERASE_DELAY_MS: u32 = 150;

/// Bit in the ReadBlockLock response which is set for a locked block.
const BLOCK_LOCK_BIT: u8 = 0b0000_0001;

/// W25Q SPI Flash.
///
/// This struct provides methods for interacting with a W25Q flash chip.
/// Every status value is read fresh from the chip; the struct itself only
/// stores its polling configuration.
pub struct Flash<'a, S: Transport, C: ChipSelect, D: DelayNs> {
    spi: &'a mut S,
    cs: &'a mut C,
    delay: &'a mut D,

    /// Maximum number of status register polls when waiting for BUSY
    /// or WEL to clear.
    /// The default allows for a full chip erase at the default interval.
    poll_limit: u32,

    /// Delay between status register polls, in microseconds.
    poll_interval_us: u32,
}

impl<'a, S: Transport, C: ChipSelect, D: DelayNs> Flash<'a, S, C, D> {
    #[cfg(feature = "std")]
    const DATA_PROGRESS_TPL: &'static str =
        " {msg} [{bar:40}] {bytes}/{total_bytes} ({bytes_per_sec}; {eta_precise})";
    #[cfg(feature = "std")]
    const DATA_PROGRESS_CHARS: &'static str = "=> ";

    /// Create a new Flash instance using the given transport, chip select and delay.
    pub fn new(spi: &'a mut S, cs: &'a mut C, delay: &'a mut D) -> Self {
        Flash {
            spi,
            cs,
            delay,
            poll_limit: 20_000_000,
            poll_interval_us: 10,
        }
    }

    /// Get the maximum number of status polls used when waiting for BUSY or WEL to clear.
    pub fn poll_limit(&self) -> u32 {
        self.poll_limit
    }

    /// Set the maximum number of status polls used when waiting for BUSY or WEL to clear.
    ///
    /// The status register is always polled at least once.
    pub fn set_poll_limit(&mut self, n: u32) {
        self.poll_limit = n;
    }

    /// Get the delay between status polls in microseconds.
    pub fn poll_interval_us(&self) -> u32 {
        self.poll_interval_us
    }

    /// Set the delay between status polls in microseconds.
    ///
    /// A value of 0 polls back-to-back.
    pub fn set_poll_interval_us(&mut self, us: u32) {
        self.poll_interval_us = us;
    }

    /// Prepare the flash for use.
    ///
    /// Sets the WPS bit in status register 3 so that writes are protected by
    /// the individual block locks, then clears every block lock.
    pub fn init(&mut self) -> Result<()> {
        log::debug!("Initialising flash");
        let status3 = self.read_status3()?;
        log::debug!("Status register 3 before init: 0x{:02X}", status3.0);
        self.status_reg_write(StatusRegister::Three, StatusRegister3::WPS, StatusRegister3::WPS)?;

        // All block lock bits are set at power-on.
        self.global_unlock()
    }

    /// Read the raw value of a status register.
    pub fn status_reg_read(&mut self, register: StatusRegister) -> Result<u8> {
        self.exchange(register.read_command(), &[], 1).map(|data| data[0])
    }

    /// Read status register 1.
    pub fn read_status1(&mut self) -> Result<StatusRegister1> {
        self.status_reg_read(StatusRegister::One).map(StatusRegister1)
    }

    /// Read status register 2.
    pub fn read_status2(&mut self) -> Result<StatusRegister2> {
        self.status_reg_read(StatusRegister::Two).map(StatusRegister2)
    }

    /// Read status register 3.
    pub fn read_status3(&mut self) -> Result<StatusRegister3> {
        self.status_reg_read(StatusRegister::Three).map(StatusRegister3)
    }

    /// Write the bits of `value` selected by `mask` into a status register.
    ///
    /// Bits outside `mask` keep their current value. The write is volatile,
    /// using the VolatileWriteEnable instruction, so it is lost at power-off.
    ///
    /// After the write completes the register is read back, and
    /// `Error::StatusMismatch` is returned if the masked bits differ.
    pub fn status_reg_write(&mut self, register: StatusRegister, mask: u8, value: u8)
        -> Result<()>
    {
        log::debug!("Writing status register {:?}: mask=0x{:02X} value=0x{:02X}",
                    register, mask, value);
        self.wait_while_busy()?;

        let old = self.status_reg_read(register)?;
        let new = sreg::masked(old, mask, value);

        self.volatile_write_enable()?;
        self.write(register.write_command(), &[new])?;
        self.delay.delay_us(STATUS_WRITE_DELAY_US);
        self.wait_while_busy()?;
        self.wait_write_latch_clear()?;

        let read = self.status_reg_read(register)?;
        if read & mask != value & mask {
            log::error!("Status register {:?} readback 0x{:02X} does not match 0x{:02X} under mask 0x{:02X}",
                        register, read, value, mask);
            return Err(Error::StatusMismatch { register, mask, expected: value & mask, read });
        }
        Ok(())
    }

    /// Send the WriteEnable command, setting the WEL in the status register.
    ///
    /// Returns `Error::WriteEnableFailed` if WEL is not set afterwards.
    pub fn write_enable(&mut self) -> Result<()> {
        self.wait_while_busy()?;
        self.command(Command::WriteEnable)?;
        let status1 = self.read_status1()?;
        if !status1.get_wel() {
            log::error!("WEL not set after WriteEnable, status 1: 0x{:02X}", status1.0);
            return Err(Error::WriteEnableFailed);
        }
        Ok(())
    }

    /// Send the VolatileWriteEnable command, which permits one volatile
    /// status register write.
    ///
    /// This command does not set WEL, so it cannot be verified.
    pub fn volatile_write_enable(&mut self) -> Result<()> {
        self.wait_while_busy()?;
        self.command(Command::VolatileWriteEnable)
    }

    /// Reset the attached flash.
    ///
    /// Ongoing operations are abandoned and volatile settings are lost.
    /// WEL is set before the EnableReset 0x66, Reset 0x99 sequence, and the
    /// reset is considered successful only if WEL is found cleared afterwards.
    pub fn reset(&mut self) -> Result<()> {
        log::debug!("Resetting flash");
        self.wait_while_busy()?;
        self.write_enable()?;
        self.command(Command::EnableReset)?;
        self.command(Command::Reset)?;
        self.delay.delay_us(RESET_DELAY_US);

        let status1 = self.read_status1()?;
        if status1.get_wel() {
            log::error!("WEL still set after reset, status 1: 0x{:02X}", status1.0);
            return Err(Error::ResetFailed);
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at the given location.
    ///
    /// Reads are not limited to one page; the flash keeps incrementing
    /// the address for as long as bytes are clocked.
    pub fn read(&mut self, block: u8, sector: u8, page: u8, offset: u8, buf: &mut [u8])
        -> Result<()>
    {
        let address = Address::new(block, sector, page, offset)?;
        self.read_address(address, buf)
    }

    /// Program up to one page of data, then read it back into `verify`.
    ///
    /// `offset + data.len()` must not exceed 256, as programming may not cross a
    /// page boundary, and `verify` must be the same length as `data`. These are
    /// checked before anything is sent to the flash.
    ///
    /// Returns `Error::ReadbackError` if the data read back does not match.
    /// Note that this does *not* erase the flash beforehand.
    pub fn page_program(&mut self, block: u8, sector: u8, page: u8, offset: u8,
                        data: &[u8], verify: &mut [u8]) -> Result<()>
    {
        let address = Address::new(block, sector, page, offset)?;
        if data.len() > PAGE_SIZE || address.page_remaining() < data.len() {
            log::error!("Page program of {} bytes at offset {} would cross a page boundary",
                        data.len(), offset);
            return Err(Error::PageOverflow { offset, length: data.len() });
        }
        if verify.len() != data.len() {
            return Err(Error::BufferLength { data: data.len(), verify: verify.len() });
        }
        self.program_address(address, data, verify)
    }

    /// Erase a 64KB block, returning once the erase has completed.
    pub fn block_erase(&mut self, block: u8) -> Result<()> {
        log::debug!("Erasing block {}", block);
        self.erase(Command::BlockErase, Address::block_base(block))
    }

    /// Erase a 4KB sector within `block`, returning once the erase has completed.
    pub fn sector_erase(&mut self, block: u8, sector: u8) -> Result<()> {
        let address = Address::new(block, sector, 0, 0)?;
        log::debug!("Erasing block {} sector {}", block, sector);
        self.erase(Command::SectorErase, address)
    }

    /// Erase entire flash chip.
    ///
    /// Chip erase takes far longer than the other erase operations, so this
    /// sleeps for 150ms before it starts polling for completion.
    pub fn chip_erase(&mut self) -> Result<()> {
        log::debug!("Erasing entire chip");
        self.wait_while_busy()?;
        self.write_enable()?;
        self.command(Command::ChipErase)?;
        self.delay.delay_ms(CHIP_ERASE_DELAY_MS);
        self.wait_while_busy()?;
        self.wait_write_latch_clear()
    }

    /// Check whether the individual lock bit for `block` is set.
    pub fn is_block_locked(&mut self, block: u8) -> Result<bool> {
        self.wait_while_busy()?;
        let address = Address::block_base(block);
        let data = self.exchange(Command::ReadBlockLock, &address.to_bytes(), 1)?;
        Ok(data[0] & BLOCK_LOCK_BIT != 0)
    }

    /// Lock `block`, making it read only.
    ///
    /// Returns `Error::AlreadyLocked` without changing anything if the block
    /// is already locked. Block locks only take effect while WPS is set.
    pub fn block_lock(&mut self, block: u8) -> Result<()> {
        if self.is_block_locked(block)? {
            log::warn!("Block {} is already locked", block);
            return Err(Error::AlreadyLocked { block });
        }
        log::debug!("Locking block {}", block);
        self.write_enable()?;
        self.write(Command::IndividualBlockLock, &Address::block_base(block).to_bytes())
    }

    /// Unlock `block`, making it writable.
    ///
    /// Returns `Error::AlreadyUnlocked` without changing anything if the block
    /// is already unlocked.
    pub fn block_unlock(&mut self, block: u8) -> Result<()> {
        if !self.is_block_locked(block)? {
            log::warn!("Block {} is already unlocked", block);
            return Err(Error::AlreadyUnlocked { block });
        }
        log::debug!("Unlocking block {}", block);
        self.write_enable()?;
        self.write(Command::IndividualBlockUnlock, &Address::block_base(block).to_bytes())
    }

    /// Clear the lock bit of every block.
    pub fn global_unlock(&mut self) -> Result<()> {
        log::debug!("Unlocking all blocks");
        self.write_enable()?;
        self.command(Command::GlobalBlockUnlock)
    }

    /// Set the lock bit of every block.
    pub fn global_lock(&mut self) -> Result<()> {
        log::debug!("Locking all blocks");
        self.write_enable()?;
        self.command(Command::GlobalBlockLock)
    }

    /// Read the JEDEC manufacturer ID, memory type and capacity.
    pub fn read_jedec_id(&mut self) -> Result<FlashId> {
        let data = self.exchange(Command::ReadJEDECID, &[], 3)?;
        let id = FlashId::from_bytes([data[0], data[1], data[2]]);
        log::debug!("Read ID: {:?}", id);
        Ok(id)
    }

    /// Read `buf.len()` bytes starting at linear `address`.
    pub fn read_data(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        self.check_address_length(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let address = Address::from_linear(address)?;
        self.read_address(address, buf)
    }

    /// Read `buf.len()` bytes starting at linear `address`.
    ///
    /// This method is similar to the `read_data()` method, except it calls the
    /// provided callback function at regular intervals with the number of bytes
    /// read so far.
    ///
    /// While `read_data()` performs a single long read, this method performs
    /// up to 128 separate reads to allow progress to be reported.
    pub fn read_data_cb<F: Fn(usize)>(&mut self, address: u32, buf: &mut [u8], cb: F)
        -> Result<()>
    {
        self.check_address_length(address, buf.len())?;
        let chunk_size = usize::max(1024, buf.len() / 128);
        let mut total_bytes = 0;
        cb(total_bytes);
        for chunk in buf.chunks_mut(chunk_size) {
            let chunk_address = Address::from_linear(address + total_bytes as u32)?;
            self.read_address(chunk_address, chunk)?;
            total_bytes += chunk.len();
            cb(total_bytes);
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at linear `address`,
    /// drawing a progress bar to the terminal.
    #[cfg(feature = "std")]
    pub fn read_data_progress(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let pb = ProgressBar::new(buf.len() as u64).with_style(ProgressStyle::default_bar()
            .template(Self::DATA_PROGRESS_TPL).progress_chars(Self::DATA_PROGRESS_CHARS));
        pb.set_message("Reading");
        let result = self.read_data_cb(address, buf, |n| pb.set_position(n as u64));
        pb.finish();
        result
    }

    /// Program `data` to linear `address`, automatically split into multiple
    /// verified page program operations.
    ///
    /// Note that this does *not* erase the flash beforehand.
    pub fn program_data(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.program_data_cb(address, data, |_| {})
    }

    /// Program `data` to linear `address`, and draw a progress bar to the terminal.
    ///
    /// Note that this does *not* erase the flash beforehand.
    #[cfg(feature = "std")]
    pub fn program_data_progress(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let pb = ProgressBar::new(data.len() as u64).with_style(ProgressStyle::default_bar()
            .template(Self::DATA_PROGRESS_TPL).progress_chars(Self::DATA_PROGRESS_CHARS));
        pb.set_message("Writing");
        let result = self.program_data_cb(address, data, |n| pb.set_position(n as u64));
        pb.finish();
        result
    }

    /// Program `data` to linear `address`, automatically split into multiple
    /// verified page program operations.
    ///
    /// Calls `cb` with the number of bytes programmed so far after each
    /// page programming operation.
    pub fn program_data_cb<F: Fn(usize)>(&mut self, address: u32, data: &[u8], cb: F)
        -> Result<()>
    {
        self.check_address_length(address, data.len())?;
        log::trace!("Programming {} bytes to 0x{:06X}", data.len(), address);

        let mut verify = alloc::vec![0u8; PAGE_SIZE];
        let mut total_bytes = 0;
        cb(total_bytes);

        // The first write is shorter than a page if `address` is not page-aligned.
        while total_bytes < data.len() {
            let page_address = Address::from_linear(address + total_bytes as u32)?;
            let n = usize::min(page_address.page_remaining(), data.len() - total_bytes);
            let page_data = &data[total_bytes..total_bytes + n];
            self.program_address(page_address, page_data, &mut verify[..n])?;
            total_bytes += n;
            cb(total_bytes);
        }

        Ok(())
    }

    /// Check if the device is currently busy performing an operation.
    pub fn is_busy(&mut self) -> Result<bool> {
        self.read_status1().map(|status| status.get_busy())
    }

    /// Wait until the device stops being busy.
    ///
    /// Returns `Error::BusyTimeout` if BUSY is still set after `poll_limit` polls.
    pub fn wait_while_busy(&mut self) -> Result<()> {
        let polls = self.poll_limit.max(1);
        if self.poll_status1_clear(StatusRegister1::BUSY, polls)? {
            Ok(())
        } else {
            log::error!("Flash still busy after {} polls", polls);
            Err(Error::BusyTimeout { polls })
        }
    }

    /// Wait until the write enable latch clears, which marks the end of a
    /// write or erase cycle.
    ///
    /// Returns `Error::LatchTimeout` if WEL is still set after `poll_limit` polls.
    pub fn wait_write_latch_clear(&mut self) -> Result<()> {
        let polls = self.poll_limit.max(1);
        if self.poll_status1_clear(StatusRegister1::WEL, polls)? {
            Ok(())
        } else {
            log::error!("WEL still set after {} polls", polls);
            Err(Error::LatchTimeout { polls })
        }
    }

    /// Writes `opcode` and `data` to the flash memory, then returns `nbytes` of response.
    ///
    /// The whole exchange happens within a single chip select bracket.
    pub fn exchange<O: Into<u8>>(&mut self, opcode: O, data: &[u8], nbytes: usize)
        -> Result<Vec<u8>>
    {
        let mut tx = alloc::vec![opcode.into()];
        tx.extend(data);
        log::trace!("SPI exchange: write {:02X?}, read {} bytes", &tx, nbytes);
        let rx = self.transaction(|spi| spi.sequential(&tx, nbytes))?;
        log::trace!("SPI exchange: read {:02X?}", &rx);
        Ok(rx)
    }

    /// Writes `opcode` and `data` to the flash memory, without reading the response.
    pub fn write<O: Into<u8>>(&mut self, opcode: O, data: &[u8]) -> Result<()> {
        let mut tx = alloc::vec![opcode.into()];
        tx.extend(data);
        log::trace!("SPI write: {:02X?}", &tx);
        self.transaction(|spi| spi.write(&tx))
    }

    /// Convenience method for issuing a single command and not caring about the returned data
    pub fn command<O: Into<u8>>(&mut self, opcode: O) -> Result<()> {
        self.write(opcode, &[])
    }

    /// Run `f` with chip select asserted.
    ///
    /// Chip select is released even if `f` fails, so a failed transfer never
    /// leaves a command half-framed.
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
        where F: FnOnce(&mut S) -> AnyhowResult<T>
    {
        self.cs.enable();
        let result = f(&mut *self.spi);
        self.cs.disable();
        Ok(result?)
    }

    /// Poll status register 1 until all bits in `mask` are clear.
    ///
    /// Returns false if they are still set after `polls` reads.
    fn poll_status1_clear(&mut self, mask: u8, polls: u32) -> Result<bool> {
        for n in 0..polls {
            if n > 0 && self.poll_interval_us > 0 {
                self.delay.delay_us(self.poll_interval_us);
            }
            if self.read_status1()?.0 & mask == 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_address(&mut self, address: Address, buf: &mut [u8]) -> Result<()> {
        self.wait_while_busy()?;
        let data = self.exchange(Command::ReadData, &address.to_bytes(), buf.len())?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    /// Program data which has already been checked to fit within one page.
    ///
    /// The readback goes through `read_address()`, which waits for the
    /// program cycle to finish first.
    fn program_address(&mut self, address: Address, data: &[u8], verify: &mut [u8])
        -> Result<()>
    {
        log::trace!("Page program {} bytes at 0x{:06X}", data.len(), address.linear());
        let mut tx = address.to_bytes().to_vec();
        tx.extend(data);
        self.wait_while_busy()?;
        self.write_enable()?;
        self.write(Command::PageProgram, &tx)?;
        self.read_address(address, verify)?;
        self.verify_readback(address, data, verify)
    }

    fn erase(&mut self, command: Command, address: Address) -> Result<()> {
        log::trace!("Erase 0x{:02X} at 0x{:06X}", u8::from(command), address.linear());
        self.wait_while_busy()?;
        self.write_enable()?;
        self.write(command, &address.to_bytes())?;
        self.wait_while_busy()?;
        self.wait_write_latch_clear()
    }

    /// Checks that `length` bytes starting at `address` lie within the flash.
    fn check_address_length(&self, address: u32, length: usize) -> Result<()> {
        log::trace!("Checking address={:08X} length={}", address, length);
        match (address as usize).checked_add(length) {
            Some(end) if end <= CAPACITY => Ok(()),
            end => {
                log::error!("Operation would exceed flash capacity");
                let last = end.and_then(|end| u32::try_from(end - 1).ok()).unwrap_or(u32::MAX);
                Err(Error::InvalidAddress { address: last })
            },
        }
    }

    /// Verify programmed data matches new flash contents.
    ///
    /// Returns Err::ReadbackError on mismatch.
    fn verify_readback(&mut self, address: Address, data: &[u8], new_data: &[u8]) -> Result<()> {
        let mismatch = data.iter().zip(new_data).enumerate().find(|(_, (a, b))| a != b);
        match mismatch {
            Some((idx, (a, b))) => {
                let addr = address.linear() + idx as u32;
                log::error!("Readback mismatch at 0x{:06X}: Wrote 0x{:02X}, read 0x{:02X}",
                            addr, a, b);
                if self.is_block_locked(address.block())? {
                    log::error!("Block {} is locked, try unlocking it.", address.block());
                }
                Err(Error::ReadbackError { address: addr, wrote: *a, read: *b })
            },
            None => Ok(()),
        }
    }
}

/// W25Q command opcodes.
///
/// These are taken from the instruction set table of the Winbond W25Q128JV
/// datasheet. Only single I/O commands are listed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum Command {
    WriteEnable = 0x06,
    VolatileWriteEnable = 0x50,
    EnableReset = 0x66,
    Reset = 0x99,
    ReadData = 0x03,
    PageProgram = 0x02,
    ReadJEDECID = 0x9F,

    ReadStatusRegister1 = 0x05,
    ReadStatusRegister2 = 0x35,
    ReadStatusRegister3 = 0x15,
    WriteStatusRegister1 = 0x01,
    WriteStatusRegister2 = 0x31,
    WriteStatusRegister3 = 0x11,

    // Erase instructions, for 64kB blocks, 4kB sectors and the whole chip.
    BlockErase = 0xD8,
    SectorErase = 0x20,
    ChipErase = 0xC7,

    // Individual block lock instructions, effective while WPS=1.
    IndividualBlockLock = 0x36,
    IndividualBlockUnlock = 0x39,
    ReadBlockLock = 0x3D,
    GlobalBlockLock = 0x7E,
    GlobalBlockUnlock = 0x98,
}
