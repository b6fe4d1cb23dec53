use crate::Command;

/// Selects one of the three status registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusRegister {
    One,
    Two,
    Three,
}

impl StatusRegister {
    pub(crate) fn read_command(self) -> Command {
        match self {
            StatusRegister::One => Command::ReadStatusRegister1,
            StatusRegister::Two => Command::ReadStatusRegister2,
            StatusRegister::Three => Command::ReadStatusRegister3,
        }
    }

    pub(crate) fn write_command(self) -> Command {
        match self {
            StatusRegister::One => Command::WriteStatusRegister1,
            StatusRegister::Two => Command::WriteStatusRegister2,
            StatusRegister::Three => Command::WriteStatusRegister3,
        }
    }
}

/// Status Register 1
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusRegister1(pub u8);

impl StatusRegister1 {
    pub const BUSY: u8 = 0b0000_0001;
    pub const WEL: u8 = 0b0000_0010;

    /// Get BUSY bit.
    ///
    /// Set while an erase, program or status register write cycle is running.
    pub fn get_busy(&self) -> bool {
        self.0 & Self::BUSY != 0
    }

    /// Get WEL (write enable latch) bit.
    ///
    /// Set by WriteEnable and cleared by the chip when a write or erase finishes.
    pub fn get_wel(&self) -> bool {
        self.0 & Self::WEL != 0
    }

    /// Get (BP0, BP1, BP2) bits.
    pub fn get_block_protect(&self) -> (bool, bool, bool) {
        let bp = (self.0 & 0b0001_1100) >> 2;
        (bp & 0b001 != 0, bp & 0b010 != 0, bp & 0b100 != 0)
    }

    /// Get TB (top/bottom protection) bit.
    pub fn get_tb(&self) -> bool {
        self.0 & 0b0010_0000 != 0
    }

    /// Get SEC (sector protect) bit.
    pub fn get_sec(&self) -> bool {
        self.0 & 0b0100_0000 != 0
    }

    /// Get SRP (status register protect) bit.
    pub fn get_srp(&self) -> bool {
        self.0 & 0b1000_0000 != 0
    }
}

/// Status Register 2
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusRegister2(pub u8);

impl StatusRegister2 {
    /// Get QE (quad enable) bit.
    pub fn get_qe(&self) -> bool {
        self.0 & 0b0000_0010 != 0
    }

    /// Get CMP (protection complement) bit.
    pub fn get_cmp(&self) -> bool {
        self.0 & 0b0100_0000 != 0
    }
}

/// Status Register 3
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusRegister3(pub u8);

impl StatusRegister3 {
    pub const WPS: u8 = 0b0000_0100;

    /// Get WPS (write protect selection) bit.
    ///
    /// When set, the individual block lock bits are used for write protection
    /// instead of the BP/TB/SEC/CMP bits in status registers 1 and 2.
    pub fn get_wps(&self) -> bool {
        self.0 & Self::WPS != 0
    }
}

/// Combine a current register value with `value` under `mask`.
pub(crate) fn masked(old: u8, mask: u8, value: u8) -> u8 {
    (old & !mask) | (value & mask)
}

#[test]
fn test_masked_update() {
    assert_eq!(masked(0b1010_1010, 0b0000_1111, 0b0000_0101), 0b1010_0101);
    assert_eq!(masked(0x00, StatusRegister3::WPS, 0xFF), 0x04);
    assert_eq!(masked(0xFF, StatusRegister3::WPS, 0x00), 0xFB);
    // Bits outside the mask in `value` are ignored.
    assert_eq!(masked(0x00, 0x00, 0xFF), 0x00);
}

#[test]
fn test_status_bits() {
    let sr1 = StatusRegister1(0b0001_0011);
    assert!(sr1.get_busy());
    assert!(sr1.get_wel());
    assert_eq!(sr1.get_block_protect(), (false, false, true));
    assert_eq!(StatusRegister1(0b0000_0100).get_block_protect(), (true, false, false));
    assert!(!StatusRegister1(0x00).get_wel());
    assert!(StatusRegister3(0x04).get_wps());
    assert!(!StatusRegister3(0xFB).get_wps());
}
