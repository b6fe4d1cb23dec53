//! Address arithmetic for the block/sector/page/offset layout.

use crate::{Error, Result};

pub const PAGE_SIZE: usize = 256;
pub const SECTOR_SIZE: usize = 4096;
pub const BLOCK_SIZE: usize = 65536;
pub const SECTORS_PER_BLOCK: u8 = 16;
pub const PAGES_PER_SECTOR: u8 = 16;
pub const BLOCK_COUNT: usize = 256;

/// Total capacity addressable with 3 address bytes, 16MB.
pub const CAPACITY: usize = BLOCK_COUNT * BLOCK_SIZE;

/// A validated location in flash memory.
///
/// `sector` and `page` are coordinates within their enclosing block and
/// sector respectively, so each must be below 16.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Address {
    block: u8,
    sector: u8,
    page: u8,
    offset: u8,
}

impl Address {
    /// Create a new Address, returning `Error::InvalidCoordinates` if
    /// `sector` or `page` is out of range.
    pub fn new(block: u8, sector: u8, page: u8, offset: u8) -> Result<Self> {
        if sector >= SECTORS_PER_BLOCK || page >= PAGES_PER_SECTOR {
            log::error!("Invalid flash coordinates: sector={} page={}", sector, page);
            return Err(Error::InvalidCoordinates { sector, page });
        }
        Ok(Address { block, sector, page, offset })
    }

    /// Address of the first byte of `block`.
    pub fn block_base(block: u8) -> Self {
        Address { block, sector: 0, page: 0, offset: 0 }
    }

    /// Split a linear byte address into coordinates.
    pub fn from_linear(address: u32) -> Result<Self> {
        if address as usize >= CAPACITY {
            return Err(Error::InvalidAddress { address });
        }
        let [_, block, mid, offset] = address.to_be_bytes();
        Ok(Address { block, sector: mid >> 4, page: mid & 0x0F, offset })
    }

    pub fn block(&self) -> u8 {
        self.block
    }

    pub fn sector(&self) -> u8 {
        self.sector
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn offset(&self) -> u8 {
        self.offset
    }

    /// Linear byte address.
    pub fn linear(&self) -> u32 {
        self.block as u32 * BLOCK_SIZE as u32
            + self.sector as u32 * SECTOR_SIZE as u32
            + self.page as u32 * PAGE_SIZE as u32
            + self.offset as u32
    }

    /// The 3 address bytes as sent on the wire, most significant first.
    pub fn to_bytes(&self) -> [u8; 3] {
        let bytes = self.linear().to_be_bytes();
        [bytes[1], bytes[2], bytes[3]]
    }

    /// Number of bytes from this address to the end of its page.
    pub fn page_remaining(&self) -> usize {
        PAGE_SIZE - self.offset as usize
    }
}
