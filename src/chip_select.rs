//! Chip select framing.
//!
//! Every flash command is bracketed by one `enable()`/`disable()` pair.
//! The transport never touches chip select itself, so a command phase
//! and its data phase stay inside the same bracket.

use embedded_hal::digital::OutputPin;

/// Trait for objects which drive the chip select line of one flash device.
pub trait ChipSelect {
    /// Drive the select line active (low), starting a transaction.
    fn enable(&mut self);

    /// Drive the select line inactive (high), ending a transaction.
    fn disable(&mut self);
}

impl<C: ChipSelect + ?Sized> ChipSelect for &mut C {
    fn enable(&mut self) {
        (**self).enable()
    }

    fn disable(&mut self) {
        (**self).disable()
    }
}

/// Chip select on a GPIO output pin.
pub struct GpioChipSelect<P: OutputPin> {
    pin: P,
}

impl<P: OutputPin> GpioChipSelect<P> {
    /// Create a new GpioChipSelect, driving `pin` inactive.
    pub fn new(pin: P) -> Self {
        let mut cs = GpioChipSelect { pin };
        cs.disable();
        cs
    }

    /// Release the underlying pin.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> ChipSelect for GpioChipSelect<P> {
    fn enable(&mut self) {
        if let Err(e) = self.pin.set_low() {
            log::error!("Failed to assert chip select: {:?}", e);
        }
    }

    fn disable(&mut self) {
        if let Err(e) = self.pin.set_high() {
            log::error!("Failed to release chip select: {:?}", e);
        }
    }
}
