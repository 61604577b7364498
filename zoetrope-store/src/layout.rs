//! Persisted flash layout
//!
//! Fixed addresses for every record the store keeps. The layout is part of
//! the device's external contract (images written by one firmware must be
//! readable by the next), so nothing here may move between releases.
//!
//! ```text
//! page 0..=8          reserved
//! page 9              filename table, 14 × 36-byte fields
//! page 10             settings: brightness u16 @0, red/green/blue max
//!                     current u16 @2/@4/@6, carousel mask u32 @7
//! page 11..=98        reserved
//! page 99..=8190      image slots, 578 pages each
//! ```
//!
//! An image is stored column-major: 256 pixel columns of 1156 bytes, each
//! column holding the four LED driver-chain planes back to back. Columns
//! pack densely, so a column may start mid-page and cross a page boundary.

use crate::addr::{Address, PAGE_COUNT, PAGE_SIZE};

/// Number of image slots
///
/// 14 slots of 578 pages fill pages 99..=8190 exactly; their filename
/// fields (14 × 36 = 504 bytes) fit the single filename page.
pub const MAX_IMAGES: u8 = 14;

/// Width of one filename field in bytes, zero-padded
pub const FILENAME_SIZE: usize = 36;

/// Page holding the filename table
pub const FILENAME_PAGE: u16 = 9;

/// Page holding the settings region
pub const SETTINGS_PAGE: u16 = 10;

/// Byte offsets of the settings fields within the settings page
///
/// Inherited layout, kept for compatibility with programmed devices:
/// byte 7 is both the blue limit's low byte and the mask's top byte.
/// Only the mask's low 14 bits carry membership, so the collision cannot
/// corrupt rotation state.
pub const BRIGHTNESS_OFFSET: u16 = 0;
pub const RED_LIMIT_OFFSET: u16 = 2;
pub const GREEN_LIMIT_OFFSET: u16 = 4;
pub const BLUE_LIMIT_OFFSET: u16 = 6;
pub const CAROUSEL_OFFSET: u16 = 7;

/// Mask bits that can name a real slot
pub const CAROUSEL_SLOT_BITS: u32 = (1 << MAX_IMAGES as u32) - 1;

/// First page of slot 0
pub const FIRST_IMAGE_PAGE: u16 = 99;

/// Pages occupied by one image slot
pub const PAGES_PER_IMAGE: u16 = 578;

/// Bytes of pixel data per image
pub const IMAGE_BYTES: usize = PAGES_PER_IMAGE as usize * PAGE_SIZE;

/// LED driver chains fed per refresh tick
pub const PLANE_COUNT: usize = 4;

/// Bytes per driver-chain plane of one column
pub const PLANE_BYTES: usize = 289;

/// Bytes per pixel column (all four planes)
pub const COLUMN_BYTES: usize = PLANE_COUNT * PLANE_BYTES;

/// Pixel columns per image
pub const COLUMN_COUNT: u16 = (IMAGE_BYTES / COLUMN_BYTES) as u16;

/// First data page of a slot
pub fn image_first_page(slot: u8) -> u16 {
    debug_assert!(slot < MAX_IMAGES);
    FIRST_IMAGE_PAGE + slot as u16 * PAGES_PER_IMAGE
}

/// Address of a slot's filename field
pub fn filename_address(slot: u8) -> Address {
    debug_assert!(slot < MAX_IMAGES);
    Address::new(FILENAME_PAGE, slot as u16 * FILENAME_SIZE as u16)
}

/// Address where a pixel column starts inside a slot's page range
pub fn column_address(slot: u8, column: u16) -> Address {
    column_plane_address(slot, column, 0)
}

/// Address of one driver-chain plane of a pixel column
pub fn column_plane_address(slot: u8, column: u16, plane: usize) -> Address {
    debug_assert!(column < COLUMN_COUNT);
    debug_assert!(plane < PLANE_COUNT);
    let linear = column as usize * COLUMN_BYTES + plane * PLANE_BYTES;
    Address::new(
        image_first_page(slot) + (linear / PAGE_SIZE) as u16,
        (linear % PAGE_SIZE) as u16,
    )
}
