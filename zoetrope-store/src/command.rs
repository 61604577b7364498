//! DataFlash command set
//!
//! Opcodes and command framing for AT45DB-family serial flash. Every
//! command starts with an opcode byte; addressed commands follow it with
//! the three address bytes from [`Address::command_bytes`].

use crate::addr::Address;

/// Command opcodes
pub mod opcode {
    /// Main memory page read (3 address bytes + 4 dummy bytes)
    pub const MAIN_MEMORY_PAGE_READ: u8 = 0xD2;
    /// Continuous array read, auto-incrementing across pages
    pub const CONTINUOUS_ARRAY_READ: u8 = 0x03;
    /// Page program through buffer 1 with built-in erase
    pub const PAGE_PROGRAM: u8 = 0x82;
    /// Page program through buffer 2 with built-in erase
    pub const PAGE_PROGRAM_BUF2: u8 = 0x85;
    /// Byte program through buffer 1 without built-in erase
    pub const PAGE_PROGRAM_NO_ERASE: u8 = 0x02;
    /// Page erase
    pub const PAGE_ERASE: u8 = 0x81;
    /// Status register read (two bytes, repeating)
    pub const STATUS_REGISTER_READ: u8 = 0xD7;
    /// Configuration register read
    pub const CONFIGURATION_REGISTER_READ: u8 = 0x3F;
    /// JEDEC device ID read
    pub const DEVICE_ID_READ: u8 = 0x9F;
}

/// Status register bits (16-bit register, first byte in the high bits)
pub mod status {
    /// Set when the chip is ready for the next operation
    pub const READY: u16 = 0x8000;
    /// Set when the last program or erase operation failed
    pub const PROGRAM_ERROR: u16 = 0x0020;
    /// Set when the chip is in binary (power-of-two) page-size mode
    pub const PAGE_SIZE_BINARY: u16 = 0x0100;
}

/// Configuration register bit: binary page-size mode active
pub const CONFIG_PAGE_SIZE_BINARY: u8 = 0x01;

/// Filler byte clocked out while reading
pub const DUMMY: u8 = 0x00;

/// Dummy bytes required after the address of a main memory page read
pub const READ_DUMMY_BYTES: usize = 4;

/// Four-byte authorization sequence for chip erase
pub const CHIP_ERASE_SEQUENCE: [u8; 4] = [0xC7, 0x94, 0x80, 0x9A];

/// Four-byte sequence switching the chip to binary page size
///
/// Nonvolatile and one-time on real parts; issued only when the
/// configuration register does not already report binary mode.
pub const BINARY_PAGE_SIZE_SEQUENCE: [u8; 4] = [0x3D, 0x2A, 0x80, 0xA6];

/// Build an addressed command header
pub fn addressed(op: u8, addr: Address) -> [u8; 4] {
    let [a2, a1, a0] = addr.command_bytes();
    [op, a2, a1, a0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressed_header() {
        let header = addressed(opcode::MAIN_MEMORY_PAGE_READ, Address::new(10, 7));
        assert_eq!(header, [0xD2, 0x00, 0x14, 0x07]);
    }

    #[test]
    fn test_erase_sequences_match_datasheet() {
        assert_eq!(CHIP_ERASE_SEQUENCE, [0xC7, 0x94, 0x80, 0x9A]);
        assert_eq!(BINARY_PAGE_SIZE_SEQUENCE, [0x3D, 0x2A, 0x80, 0xA6]);
    }
}
