/// Store the JEDEC ID read off a flash memory.
///
/// The 0x9F command returns the manufacturer ID, then a memory type byte,
/// then a capacity byte which encodes the size as a power of two.
/// A W25Q128 reads back `EF 40 18`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FlashId {
    pub manufacturer_id: u8,
    pub memory_type: u8,
    pub capacity: u8,
}

impl FlashId {
    pub fn from_bytes(data: [u8; 3]) -> Self {
        FlashId { manufacturer_id: data[0], memory_type: data[1], capacity: data[2] }
    }

    /// The 16-bit device ID, memory type followed by capacity.
    pub fn device_id(&self) -> u16 {
        u16::from_be_bytes([self.memory_type, self.capacity])
    }

    /// Total memory capacity in bytes, if the capacity code is sensible.
    pub fn capacity_bytes(&self) -> Option<usize> {
        match self.capacity {
            10..=31 => Some(1 << self.capacity),
            _ => None,
        }
    }

    /// Returns false if the bus read all-0s or all-1s, which usually
    /// means no device is attached.
    pub fn is_valid(&self) -> bool {
        self.manufacturer_id != 0x00 && self.manufacturer_id != 0xFF
    }

    /// Look up a manufacturer name from the JEDEC ID.
    #[cfg(feature = "std")]
    pub fn manufacturer_name(&self) -> Option<&'static str> {
        match jep106::JEP106Code::new(0, self.manufacturer_id & 0x7F).get() {
            // Winbond acquired NEXCOM and so the ID 0xEF is commonly used for Winbond memory.
            Some(mfn) if mfn == "NEXCOM" => Some("Winbond/NEXCOM"),
            Some(mfn) => Some(mfn),
            None => None,
        }
    }
}

#[cfg(feature = "std")]
impl std::fmt::Display for FlashId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mfn = match self.manufacturer_name() {
            Some(mfn) => format!(" ({})", mfn),
            None => "".to_string(),
        };
        let size = match self.capacity_bytes() {
            Some(bytes) => format!(", {} KiB", bytes / 1024),
            None => "".to_string(),
        };
        write!(f, "Manufacturer 0x{:02X}{}, Device 0x{:04X}{}",
               self.manufacturer_id, mfn, self.device_id(), size)
    }
}

#[test]
fn test_w25q128_id() {
    let id = FlashId::from_bytes([0xEF, 0x40, 0x18]);
    assert!(id.is_valid());
    assert_eq!(id.device_id(), 0x4018);
    assert_eq!(id.capacity_bytes(), Some(16 * 1024 * 1024));
    assert!(!FlashId::from_bytes([0xFF, 0xFF, 0xFF]).is_valid());
    assert_eq!(FlashId::from_bytes([0x00, 0x00, 0x00]).capacity_bytes(), None);
}

#[cfg(feature = "std")]
#[test]
fn test_w25q128_display() {
    let id = FlashId::from_bytes([0xEF, 0x40, 0x18]);
    assert_eq!(id.manufacturer_name(), Some("Winbond/NEXCOM"));
    assert_eq!(id.to_string(), "Manufacturer 0xEF (Winbond/NEXCOM), Device 0x4018, 16384 KiB");
    let unknown = FlashId::from_bytes([0xFF, 0xFF, 0xFF]);
    assert_eq!(unknown.to_string(), "Manufacturer 0xFF, Device 0xFFFF");
}
