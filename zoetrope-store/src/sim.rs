//! SPI-level DataFlash simulator (test only)
//!
//! Emulates the chip at the wire level: commands are decoded from the
//! bytes clocked while the chip select is held, and program/erase
//! operations commit when the select is released, as on the real part.
//! Every store test therefore exercises the same command framing the
//! hardware sees, including the in-page wrap of the single-page
//! primitives.

use core::convert::Infallible;

use std::vec;
use std::vec::Vec;

use zoetrope_hal::FlashSpi;

use crate::addr::{PAGE_COUNT, PAGE_SIZE};
use crate::command::{opcode, BINARY_PAGE_SIZE_SEQUENCE, CHIP_ERASE_SEQUENCE};

const DEVICE_ID: [u8; 4] = [0x1F, 0x27, 0x01, 0x00];

/// In-memory DataFlash chip
pub struct SimFlash {
    mem: Vec<u8>,
    cmd: Vec<u8>,
    selected: bool,
    binary: bool,
    stuck_busy: bool,
    program_error: bool,
}

impl SimFlash {
    /// Factory-fresh chip: erased memory, page size not yet binary
    pub fn new() -> Self {
        Self {
            mem: vec![0xFF; PAGE_COUNT * PAGE_SIZE],
            cmd: Vec::new(),
            selected: false,
            binary: false,
            stuck_busy: false,
            program_error: false,
        }
    }

    /// Erased chip already configured for binary page size
    pub fn binary() -> Self {
        let mut sim = Self::new();
        sim.binary = true;
        sim
    }

    /// Make the busy flag stick forever
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Report (and simulate) failing program/erase operations
    pub fn set_program_error(&mut self, failing: bool) {
        self.program_error = failing;
    }

    fn status_bytes(&self) -> [u8; 2] {
        let mut hi = 0u8;
        if !self.stuck_busy {
            hi |= 0x80; // READY
        }
        if self.binary {
            hi |= 0x01; // PAGE_SIZE_BINARY
        }
        let mut lo = 0u8;
        if self.program_error {
            lo |= 0x20; // PROGRAM_ERROR
        }
        [hi, lo]
    }

    fn decode_address(&self) -> (usize, usize) {
        assert!(self.binary, "addressed command before binary page size");
        let linear = ((self.cmd[1] as u32) << 16) | ((self.cmd[2] as u32) << 8) | self.cmd[3] as u32;
        let page = (linear >> 9) as usize;
        let byte = (linear & 0x1FF) as usize;
        assert!(page < PAGE_COUNT, "page number off the chip");
        (page, byte)
    }

    /// Response for the byte at position `pos` of the current command
    fn response(&self, pos: usize) -> u8 {
        if pos == 0 {
            return 0;
        }
        match self.cmd[0] {
            opcode::STATUS_REGISTER_READ => {
                // The two status bytes repeat while the select is held
                self.status_bytes()[(pos - 1) % 2]
            }
            opcode::CONFIGURATION_REGISTER_READ => {
                if self.binary {
                    0x01
                } else {
                    0x00
                }
            }
            opcode::DEVICE_ID_READ => *DEVICE_ID.get(pos - 1).unwrap_or(&0),
            opcode::MAIN_MEMORY_PAGE_READ => {
                // 3 address bytes + 4 dummy bytes before data
                if pos < 8 {
                    return 0;
                }
                let (page, byte) = self.decode_address();
                // The byte counter wraps within the page
                self.mem[page * PAGE_SIZE + (byte + pos - 8) % PAGE_SIZE]
            }
            opcode::CONTINUOUS_ARRAY_READ => {
                if pos < 4 {
                    return 0;
                }
                let (page, byte) = self.decode_address();
                // Auto-incrementing across pages
                let linear = page * PAGE_SIZE + byte + (pos - 4);
                self.mem[linear % self.mem.len()]
            }
            _ => 0,
        }
    }

    /// Commit the command collected during this select window
    fn finish(&mut self) {
        if self.cmd.is_empty() {
            return;
        }
        match self.cmd[0] {
            opcode::PAGE_PROGRAM | opcode::PAGE_PROGRAM_BUF2 | opcode::PAGE_PROGRAM_NO_ERASE => {
                if self.cmd.len() > 4 && !self.program_error {
                    let (page, byte) = self.decode_address();
                    let data = self.cmd[4..].to_vec();
                    for (i, value) in data.into_iter().enumerate() {
                        self.mem[page * PAGE_SIZE + (byte + i) % PAGE_SIZE] = value;
                    }
                }
            }
            opcode::PAGE_ERASE => {
                if self.cmd.len() >= 4 && !self.program_error {
                    let (page, _) = self.decode_address();
                    self.mem[page * PAGE_SIZE..][..PAGE_SIZE].fill(0xFF);
                }
            }
            _ if self.cmd == CHIP_ERASE_SEQUENCE => {
                if !self.program_error {
                    self.mem.fill(0xFF);
                }
            }
            _ if self.cmd == BINARY_PAGE_SIZE_SEQUENCE => {
                self.binary = true;
            }
            _ => {}
        }
        self.cmd.clear();
    }
}

impl Default for SimFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashSpi for SimFlash {
    type Error = Infallible;

    fn transfer_byte(&mut self, byte: u8) -> Result<u8, Self::Error> {
        assert!(self.selected, "transfer without chip select");
        let out = self.response(self.cmd.len());
        self.cmd.push(byte);
        Ok(out)
    }

    fn set_chip_select(&mut self, active: bool) -> Result<(), Self::Error> {
        if self.selected && !active {
            self.finish();
        }
        if active {
            self.cmd.clear();
        }
        self.selected = active;
        Ok(())
    }
}
