//! SPI bus abstractions
//!
//! The DataFlash driver talks to the chip one byte at a time while it holds
//! the chip select, so the seam is deliberately narrow: a full-duplex byte
//! transfer and explicit chip-select control. The driver is the sole owner
//! of chip-select timing.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

/// Byte-level SPI access to the flash chip
///
/// Implementations keep the chip deselected between commands; the driver
/// asserts the select for the duration of each transfer.
pub trait FlashSpi {
    /// Error type for bus operations
    type Error;

    /// Clock one byte out and return the byte clocked in
    fn transfer_byte(&mut self, byte: u8) -> Result<u8, Self::Error>;

    /// Drive the chip-select line
    ///
    /// `active = true` selects the chip (line low on DataFlash parts).
    fn set_chip_select(&mut self, active: bool) -> Result<(), Self::Error>;
}

/// Error from the [`SpiFlashBus`] adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<S, P> {
    /// The underlying SPI transfer failed
    Spi(S),
    /// The chip-select pin could not be driven
    Pin(P),
}

/// [`FlashSpi`] built from an `embedded-hal` bus and chip-select pin
///
/// Adapts any `embedded-hal` 1.0 [`SpiBus`] plus [`OutputPin`] pair, so
/// chip HALs that already expose those traits need no custom glue.
pub struct SpiFlashBus<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> SpiFlashBus<SPI, CS> {
    /// Wrap a bus and an active-low chip-select pin
    ///
    /// The pin should already be high (deselected).
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    /// Release the bus and pin
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

impl<SPI: SpiBus, CS: OutputPin> FlashSpi for SpiFlashBus<SPI, CS> {
    type Error = BusError<SPI::Error, CS::Error>;

    fn transfer_byte(&mut self, byte: u8) -> Result<u8, Self::Error> {
        let mut word = [byte];
        self.spi
            .transfer_in_place(&mut word)
            .map_err(BusError::Spi)?;
        Ok(word[0])
    }

    fn set_chip_select(&mut self, active: bool) -> Result<(), Self::Error> {
        if active {
            self.cs.set_low().map_err(BusError::Pin)
        } else {
            // Drain the bus before raising the select, or the last byte of a
            // transfer can be cut short on DMA-backed implementations.
            self.spi.flush().map_err(BusError::Spi)?;
            self.cs.set_high().map_err(BusError::Pin)
        }
    }
}
