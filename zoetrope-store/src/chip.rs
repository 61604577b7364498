//! DataFlash chip driver
//!
//! The lowest layer of the store: turns `(page, byte)` addresses and byte
//! counts into chip commands over the [`FlashSpi`] seam. Nothing above
//! this module touches the bus.
//!
//! Two transfer families exist and must not be confused:
//!
//! - The single-page primitives ([`DataFlash::read_bytes`],
//!   [`DataFlash::write_bytes`]) let the chip run the byte counter, which
//!   wraps from byte 511 to byte 0 of the *same* page. That is documented
//!   chip behavior, and the settings region relies on it never spilling
//!   into a neighbor page.
//! - The page-spanning calls ([`DataFlash::read_page_array`] via the
//!   chip's auto-incrementing array read, and the
//!   [`DataFlash::read_across_pages`] / [`DataFlash::write_across_pages`]
//!   helpers that re-issue a command per page) are the only way to move
//!   data that crosses a page boundary.

use zoetrope_hal::FlashSpi;

use crate::addr::Address;
use crate::command::{self, opcode, status};
use crate::error::StoreError;

/// Status reads allowed before a busy chip is declared dead
///
/// A page program completes in a few milliseconds; polling this many times
/// takes far longer, so hitting the limit means a faulty chip or wiring,
/// not a slow write.
pub const BUSY_POLL_LIMIT: u32 = 100_000;

/// Driver for an AT45DB-family serial DataFlash chip
pub struct DataFlash<SPI: FlashSpi> {
    spi: SPI,
}

impl<SPI: FlashSpi> DataFlash<SPI> {
    /// Wrap a bus; the chip is assumed deselected
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Release the bus
    pub fn free(self) -> SPI {
        self.spi
    }

    /// Run one transfer with the chip selected
    ///
    /// The select is released on every exit path, including transfer
    /// errors, so a failed command can never leave the chip hanging on
    /// the bus.
    fn selected<R>(
        &mut self,
        transfer: impl FnOnce(&mut SPI) -> Result<R, SPI::Error>,
    ) -> Result<R, StoreError<SPI::Error>> {
        self.spi.set_chip_select(true).map_err(StoreError::Spi)?;
        let result = transfer(&mut self.spi);
        let deselect = self.spi.set_chip_select(false);
        let value = result.map_err(StoreError::Spi)?;
        deselect.map_err(StoreError::Spi)?;
        Ok(value)
    }

    /// Read the 16-bit status register
    pub fn status_register(&mut self) -> Result<u16, StoreError<SPI::Error>> {
        self.selected(|spi| {
            spi.transfer_byte(opcode::STATUS_REGISTER_READ)?;
            let hi = spi.transfer_byte(command::DUMMY)?;
            let lo = spi.transfer_byte(command::DUMMY)?;
            Ok(u16::from_be_bytes([hi, lo]))
        })
    }

    /// True while a program or erase operation is still running
    pub fn is_busy(&mut self) -> Result<bool, StoreError<SPI::Error>> {
        Ok(self.status_register()? & status::READY == 0)
    }

    /// Read the configuration register
    pub fn configuration_register(&mut self) -> Result<u8, StoreError<SPI::Error>> {
        self.selected(|spi| {
            spi.transfer_byte(opcode::CONFIGURATION_REGISTER_READ)?;
            spi.transfer_byte(command::DUMMY)
        })
    }

    /// Read the four JEDEC device ID bytes
    pub fn device_id(&mut self) -> Result<[u8; 4], StoreError<SPI::Error>> {
        self.selected(|spi| {
            spi.transfer_byte(opcode::DEVICE_ID_READ)?;
            let mut id = [0u8; 4];
            for byte in id.iter_mut() {
                *byte = spi.transfer_byte(command::DUMMY)?;
            }
            Ok(id)
        })
    }

    /// Poll the status register until the chip reports ready
    ///
    /// Bounded; surfaces a set error bit once the operation finished.
    fn wait_ready(&mut self) -> Result<(), StoreError<SPI::Error>> {
        for _ in 0..BUSY_POLL_LIMIT {
            let status = self.status_register()?;
            if status & status::READY != 0 {
                if status & status::PROGRAM_ERROR != 0 {
                    return Err(StoreError::WriteFailed);
                }
                return Ok(());
            }
        }
        Err(StoreError::BusyTimeout)
    }

    /// Read one byte
    pub fn read_byte(&mut self, addr: Address) -> Result<u8, StoreError<SPI::Error>> {
        let mut byte = [0u8];
        self.read_bytes(addr, &mut byte)?;
        Ok(byte[0])
    }

    /// Read into `buf`, wrapping within the addressed page
    pub fn read_bytes(
        &mut self,
        addr: Address,
        buf: &mut [u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        self.selected(|spi| {
            for &byte in &command::addressed(opcode::MAIN_MEMORY_PAGE_READ, addr) {
                spi.transfer_byte(byte)?;
            }
            for _ in 0..command::READ_DUMMY_BYTES {
                spi.transfer_byte(command::DUMMY)?;
            }
            for slot in buf.iter_mut() {
                *slot = spi.transfer_byte(command::DUMMY)?;
            }
            Ok(())
        })
    }

    /// Streaming read across consecutive pages
    ///
    /// Uses the chip's auto-incrementing array read; the only primitive
    /// that advances the page number itself.
    pub fn read_page_array(
        &mut self,
        addr: Address,
        buf: &mut [u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        self.selected(|spi| {
            for &byte in &command::addressed(opcode::CONTINUOUS_ARRAY_READ, addr) {
                spi.transfer_byte(byte)?;
            }
            for slot in buf.iter_mut() {
                *slot = spi.transfer_byte(command::DUMMY)?;
            }
            Ok(())
        })
    }

    /// Program one byte
    pub fn write_byte(&mut self, addr: Address, byte: u8) -> Result<(), StoreError<SPI::Error>> {
        self.write_bytes(addr, &[byte])
    }

    /// Program `data`, wrapping within the addressed page
    ///
    /// Blocks on the busy poll before returning.
    pub fn write_bytes(
        &mut self,
        addr: Address,
        data: &[u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        self.selected(|spi| {
            for &byte in &command::addressed(opcode::PAGE_PROGRAM, addr) {
                spi.transfer_byte(byte)?;
            }
            for &byte in data {
                spi.transfer_byte(byte)?;
            }
            Ok(())
        })?;
        self.wait_ready()
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self, addr: Address) -> Result<u16, StoreError<SPI::Error>> {
        let mut bytes = [0u8; 2];
        self.read_bytes(addr, &mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Program a big-endian u16
    pub fn write_u16(&mut self, addr: Address, value: u16) -> Result<(), StoreError<SPI::Error>> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self, addr: Address) -> Result<u32, StoreError<SPI::Error>> {
        let mut bytes = [0u8; 4];
        self.read_bytes(addr, &mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Program a big-endian u32
    pub fn write_u32(&mut self, addr: Address, value: u32) -> Result<(), StoreError<SPI::Error>> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    /// Read a span that may cross page boundaries
    ///
    /// Re-issues the page read per page with an explicitly incremented
    /// page number, so the in-page wrap never triggers.
    pub fn read_across_pages(
        &mut self,
        addr: Address,
        buf: &mut [u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        let mut addr = addr;
        let mut rest = buf;
        while !rest.is_empty() {
            let take = addr.bytes_left_in_page().min(rest.len());
            let (chunk, tail) = rest.split_at_mut(take);
            self.read_bytes(addr, chunk)?;
            rest = tail;
            if !rest.is_empty() {
                addr = addr.next_page();
            }
        }
        Ok(())
    }

    /// Program a span that may cross page boundaries
    pub fn write_across_pages(
        &mut self,
        addr: Address,
        data: &[u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        let mut addr = addr;
        let mut rest = data;
        while !rest.is_empty() {
            let take = addr.bytes_left_in_page().min(rest.len());
            let (chunk, tail) = rest.split_at(take);
            self.write_bytes(addr, chunk)?;
            rest = tail;
            if !rest.is_empty() {
                addr = addr.next_page();
            }
        }
        Ok(())
    }

    /// Erase one page to 0xFF
    pub fn erase_page(&mut self, page: u16) -> Result<(), StoreError<SPI::Error>> {
        let addr = Address::new(page, 0);
        self.selected(|spi| {
            for &byte in &command::addressed(opcode::PAGE_ERASE, addr) {
                spi.transfer_byte(byte)?;
            }
            Ok(())
        })?;
        self.wait_ready()
    }

    /// Erase the whole chip
    ///
    /// Requires the chip's fixed four-byte authorization sequence.
    pub fn erase_chip(&mut self) -> Result<(), StoreError<SPI::Error>> {
        self.selected(|spi| {
            for &byte in &command::CHIP_ERASE_SEQUENCE {
                spi.transfer_byte(byte)?;
            }
            Ok(())
        })?;
        self.wait_ready()
    }

    /// Switch the chip to binary (power-of-two) page addressing
    ///
    /// The chip ships with 528-byte pages; all address arithmetic in this
    /// crate assumes 512. Must have taken effect before any addressed
    /// access.
    pub fn set_page_size_binary(&mut self) -> Result<(), StoreError<SPI::Error>> {
        self.selected(|spi| {
            for &byte in &command::BINARY_PAGE_SIZE_SEQUENCE {
                spi.transfer_byte(byte)?;
            }
            Ok(())
        })?;
        self.wait_ready()
    }
}
