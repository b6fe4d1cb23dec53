//! In-memory W25Q128 model for tests.
//!
//! The model sees the same byte stream a real chip would: bytes are clocked
//! through `SimBus`, and each command is executed when `SimSelect` releases
//! chip select. Clocking with chip select released, or asserting it twice,
//! panics.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;

use crate::address::{BLOCK_COUNT, BLOCK_SIZE, CAPACITY, PAGE_SIZE, SECTOR_SIZE};
use crate::chip_select::ChipSelect;
use crate::transport::{Transport, TransportError};
use crate::AnyhowResult;

const BUSY: u8 = 0b0000_0001;
const WEL: u8 = 0b0000_0010;
const WPS: u8 = 0b0000_0100;

/// Number of status register 1 reads for which each cycle reports BUSY.
pub const STATUS_WRITE_POLLS: u32 = 2;
pub const PROGRAM_POLLS: u32 = 3;
pub const SECTOR_ERASE_POLLS: u32 = 5;
pub const BLOCK_ERASE_POLLS: u32 = 8;
pub const CHIP_ERASE_POLLS: u32 = 12;

pub struct Chip {
    pub memory: Vec<u8>,
    pub status: [u8; 3],
    pub locks: Vec<bool>,

    /// Never finish the current cycle.
    pub stuck_busy: bool,
    /// Never clear WEL once it is set.
    pub stuck_wel: bool,
    /// No chip on the bus: MISO floats high and commands do nothing.
    pub absent: bool,
    /// Every exchange fails in the transport.
    pub fail_transport: bool,

    /// Every command seen, one entry per chip select bracket.
    pub transactions: Vec<Vec<u8>>,
    pub selected: bool,

    command: Vec<u8>,
    busy_polls: u32,
    volatile_we: bool,
    reset_enabled: bool,
}

pub type SharedChip = Rc<RefCell<Chip>>;

impl Chip {
    pub fn shared() -> SharedChip {
        Rc::new(RefCell::new(Chip {
            memory: vec![0xFF; CAPACITY],
            status: [0; 3],
            locks: vec![true; BLOCK_COUNT],
            stuck_busy: false,
            stuck_wel: false,
            absent: false,
            fail_transport: false,
            transactions: Vec::new(),
            selected: false,
            command: Vec::new(),
            busy_polls: 0,
            volatile_we: false,
            reset_enabled: false,
        }))
    }

    /// Put the chip in a cycle which never finishes.
    pub fn hang_busy(&mut self) {
        self.status[0] |= BUSY;
        self.stuck_busy = true;
    }

    /// Commands sent so far, by opcode.
    pub fn opcodes(&self) -> Vec<u8> {
        self.transactions.iter().filter_map(|t| t.first().copied()).collect()
    }

    fn busy(&self) -> bool {
        self.status[0] & BUSY != 0
    }

    fn wel(&self) -> bool {
        self.status[0] & WEL != 0
    }

    fn clear_wel(&mut self) {
        if !self.stuck_wel {
            self.status[0] &= !WEL;
        }
    }

    fn start_cycle(&mut self, polls: u32) {
        self.status[0] |= BUSY;
        self.busy_polls = polls;
    }

    /// Advance the current cycle by one status poll.
    fn tick(&mut self) {
        if !self.busy() || self.stuck_busy {
            return;
        }
        self.busy_polls = self.busy_polls.saturating_sub(1);
        if self.busy_polls == 0 {
            self.status[0] &= !BUSY;
            self.clear_wel();
        }
    }

    fn address(command: &[u8]) -> usize {
        ((command[1] as usize) << 16) | ((command[2] as usize) << 8) | command[3] as usize
    }

    fn writable(&self, address: usize) -> bool {
        self.status[2] & WPS == 0 || !self.locks[address / BLOCK_SIZE]
    }

    fn select(&mut self) {
        assert!(!self.selected, "chip select asserted twice");
        self.selected = true;
        self.command.clear();
    }

    fn deselect(&mut self) {
        assert!(self.selected, "chip select released while inactive");
        self.selected = false;
        let command = std::mem::take(&mut self.command);
        self.transactions.push(command.clone());
        if !self.absent {
            self.execute(&command);
        }
    }

    fn clock(&mut self, mosi: u8) -> u8 {
        assert!(self.selected, "bus clocked with chip select inactive");
        let pos = self.command.len();
        self.command.push(mosi);
        if self.absent {
            return 0xFF;
        }
        if pos == 0 {
            return 0x00;
        }
        match self.command[0] {
            0x05 => {
                let value = self.status[0];
                self.tick();
                value
            }
            0x35 => self.status[1],
            0x15 => self.status[2],
            // Array reads return garbage while a cycle is in progress.
            0x03 if pos >= 4 && self.busy() => 0x00,
            0x03 if pos >= 4 => {
                let address = Self::address(&self.command) + pos - 4;
                self.memory[address % CAPACITY]
            }
            0x3D if pos == 4 => {
                self.locks[Self::address(&self.command) / BLOCK_SIZE] as u8
            }
            0x9F if pos <= 3 => [0xEF, 0x40, 0x18][pos - 1],
            _ => 0xFF,
        }
    }

    fn execute(&mut self, command: &[u8]) {
        let opcode = match command.first() {
            Some(opcode) => *opcode,
            None => return,
        };
        let reset_enabled = self.reset_enabled;
        self.reset_enabled = false;
        if self.busy() {
            return;
        }

        match opcode {
            0x06 => self.status[0] |= WEL,
            0x50 => self.volatile_we = true,
            0x01 | 0x31 | 0x11 if command.len() >= 2 => {
                if !(self.wel() || self.volatile_we) {
                    return;
                }
                let reg = match opcode {
                    0x01 => 0,
                    0x31 => 1,
                    _ => 2,
                };
                let mut value = command[1];
                if reg == 0 {
                    // BUSY and WEL are read only.
                    value = (value & !(BUSY | WEL)) | (self.status[0] & (BUSY | WEL));
                }
                self.status[reg] = value;
                self.volatile_we = false;
                self.start_cycle(STATUS_WRITE_POLLS);
            }
            0x02 if command.len() >= 4 => {
                if !self.wel() {
                    return;
                }
                let address = Self::address(command);
                if !self.writable(address) {
                    self.clear_wel();
                    return;
                }
                // Programming wraps within the page rather than crossing into the next.
                let base = address - address % PAGE_SIZE;
                for (i, byte) in command[4..].iter().enumerate() {
                    let a = base + (address % PAGE_SIZE + i) % PAGE_SIZE;
                    self.memory[a] &= *byte;
                }
                self.start_cycle(PROGRAM_POLLS);
            }
            0x20 | 0xD8 if command.len() >= 4 => {
                let (size, polls) = if opcode == 0x20 {
                    (SECTOR_SIZE, SECTOR_ERASE_POLLS)
                } else {
                    (BLOCK_SIZE, BLOCK_ERASE_POLLS)
                };
                if !self.wel() {
                    return;
                }
                let address = Self::address(command);
                if !self.writable(address) {
                    self.clear_wel();
                    return;
                }
                let base = address - address % size;
                self.memory[base..base + size].iter_mut().for_each(|b| *b = 0xFF);
                self.start_cycle(polls);
            }
            0xC7 => {
                if !self.wel() {
                    return;
                }
                if self.status[2] & WPS != 0 && self.locks.iter().any(|l| *l) {
                    self.clear_wel();
                    return;
                }
                self.memory.iter_mut().for_each(|b| *b = 0xFF);
                self.start_cycle(CHIP_ERASE_POLLS);
            }
            0x36 | 0x39 if command.len() >= 4 => {
                if self.wel() {
                    self.locks[Self::address(command) / BLOCK_SIZE] = opcode == 0x36;
                    self.clear_wel();
                }
            }
            0x7E | 0x98 => {
                if self.wel() {
                    let locked = opcode == 0x7E;
                    self.locks.iter_mut().for_each(|l| *l = locked);
                    self.clear_wel();
                }
            }
            0x66 => self.reset_enabled = true,
            0x99 if reset_enabled => {
                self.status[0] &= !BUSY;
                self.clear_wel();
                self.busy_polls = 0;
                self.volatile_we = false;
                self.locks.iter_mut().for_each(|l| *l = true);
            }
            _ => {}
        }
    }
}

pub struct SimBus {
    chip: SharedChip,
}

impl SimBus {
    pub fn new(chip: &SharedChip) -> Self {
        SimBus { chip: chip.clone() }
    }
}

impl Transport for SimBus {
    fn exchange(&mut self, data: &[u8]) -> AnyhowResult<Vec<u8>> {
        let mut chip = self.chip.borrow_mut();
        if chip.fail_transport {
            return Err(TransportError::Busy.into());
        }
        Ok(data.iter().map(|byte| chip.clock(*byte)).collect())
    }
}

pub struct SimSelect {
    chip: SharedChip,
}

impl SimSelect {
    pub fn new(chip: &SharedChip) -> Self {
        SimSelect { chip: chip.clone() }
    }
}

impl ChipSelect for SimSelect {
    fn enable(&mut self) {
        self.chip.borrow_mut().select();
    }

    fn disable(&mut self) {
        self.chip.borrow_mut().deselect();
    }
}

/// Delay which only records how long it was asked to wait.
#[derive(Default)]
pub struct SimDelay {
    pub elapsed_ns: u64,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}
