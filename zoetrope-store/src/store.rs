//! Image repository and settings region
//!
//! [`ImageStore`] is the owner of the chip for the lifetime of the device:
//! constructed once at startup, then passed by `&mut` to the upload
//! decoder and the display refresh path. The settings scalars and the
//! carousel mask are cached in RAM after first access; once loaded, the
//! cache is the source of truth and flash only changes through it.

use zoetrope_hal::FlashSpi;

use crate::addr::{Address, PAGE_SIZE};
use crate::chip::DataFlash;
use crate::command::CONFIG_PAGE_SIZE_BINARY;
use crate::error::StoreError;
use crate::filename::Filename;
use crate::layout::{
    column_plane_address, filename_address, image_first_page, BLUE_LIMIT_OFFSET,
    BRIGHTNESS_OFFSET, CAROUSEL_OFFSET, CAROUSEL_SLOT_BITS, COLUMN_BYTES, COLUMN_COUNT,
    FILENAME_PAGE, FILENAME_SIZE, GREEN_LIMIT_OFFSET, IMAGE_BYTES, MAX_IMAGES, PAGES_PER_IMAGE,
    PLANE_BYTES, PLANE_COUNT, RED_LIMIT_OFFSET, SETTINGS_PAGE,
};

/// Result of asking for a slot to upload into
///
/// A full repository is not an error: the store falls back to evicting
/// slot 0, and callers see that choice spelled out rather than finding
/// their oldest image silently gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotSelection {
    /// An unoccupied slot is available
    Empty(u8),
    /// Every slot is occupied; this one will be overwritten
    Evict(u8),
}

impl SlotSelection {
    /// The selected slot, whichever way it was chosen
    pub fn slot(self) -> u8 {
        match self {
            SlotSelection::Empty(slot) | SlotSelection::Evict(slot) => slot,
        }
    }
}

/// The flash-backed image and settings store
pub struct ImageStore<SPI: FlashSpi> {
    chip: DataFlash<SPI>,
    brightness: Option<u16>,
    red_limit: Option<u16>,
    green_limit: Option<u16>,
    blue_limit: Option<u16>,
    carousel: Option<u32>,
}

impl<SPI: FlashSpi> ImageStore<SPI> {
    /// Bring up the store on a freshly configured SPI bus
    ///
    /// Switches the chip to binary page addressing if it is not already
    /// there; every address this crate computes assumes 512-byte pages.
    pub fn init(spi: SPI) -> Result<Self, StoreError<SPI::Error>> {
        let mut chip = DataFlash::new(spi);
        if chip.configuration_register()? & CONFIG_PAGE_SIZE_BINARY == 0 {
            chip.set_page_size_binary()?;
        }
        Ok(Self {
            chip,
            brightness: None,
            red_limit: None,
            green_limit: None,
            blue_limit: None,
            carousel: None,
        })
    }

    /// Release the bus
    pub fn free(self) -> SPI {
        self.chip.free()
    }

    /// Low-level chip access for diagnostics (device ID, status register)
    pub fn chip(&mut self) -> &mut DataFlash<SPI> {
        &mut self.chip
    }

    /// Provision the metadata pages of a factory-fresh chip
    ///
    /// Erased flash reads 0xFF everywhere, which would parse as garbage
    /// settings. Zeroes the filename table and the settings region and
    /// primes the caches.
    pub fn format(&mut self) -> Result<(), StoreError<SPI::Error>> {
        let zeros = [0u8; PAGE_SIZE];
        self.chip.erase_page(FILENAME_PAGE)?;
        self.chip
            .write_bytes(Address::new(FILENAME_PAGE, 0), &zeros)?;
        self.chip.erase_page(SETTINGS_PAGE)?;
        self.chip
            .write_bytes(Address::new(SETTINGS_PAGE, 0), &zeros)?;
        self.brightness = Some(0);
        self.red_limit = Some(0);
        self.green_limit = Some(0);
        self.blue_limit = Some(0);
        self.carousel = Some(0);
        Ok(())
    }

    // --- Settings region -------------------------------------------------

    /// Global display brightness
    pub fn global_brightness(&mut self) -> Result<u16, StoreError<SPI::Error>> {
        cached_scalar(&mut self.chip, &mut self.brightness, BRIGHTNESS_OFFSET)
    }

    /// Set and persist the global display brightness
    pub fn set_global_brightness(&mut self, value: u16) -> Result<(), StoreError<SPI::Error>> {
        store_scalar(&mut self.chip, &mut self.brightness, BRIGHTNESS_OFFSET, value)
    }

    /// Maximum red LED current
    pub fn red_max_current(&mut self) -> Result<u16, StoreError<SPI::Error>> {
        cached_scalar(&mut self.chip, &mut self.red_limit, RED_LIMIT_OFFSET)
    }

    /// Set and persist the maximum red LED current
    pub fn set_red_max_current(&mut self, value: u16) -> Result<(), StoreError<SPI::Error>> {
        store_scalar(&mut self.chip, &mut self.red_limit, RED_LIMIT_OFFSET, value)
    }

    /// Maximum green LED current
    pub fn green_max_current(&mut self) -> Result<u16, StoreError<SPI::Error>> {
        cached_scalar(&mut self.chip, &mut self.green_limit, GREEN_LIMIT_OFFSET)
    }

    /// Set and persist the maximum green LED current
    pub fn set_green_max_current(&mut self, value: u16) -> Result<(), StoreError<SPI::Error>> {
        store_scalar(&mut self.chip, &mut self.green_limit, GREEN_LIMIT_OFFSET, value)
    }

    /// Maximum blue LED current
    pub fn blue_max_current(&mut self) -> Result<u16, StoreError<SPI::Error>> {
        cached_scalar(&mut self.chip, &mut self.blue_limit, BLUE_LIMIT_OFFSET)
    }

    /// Set and persist the maximum blue LED current
    pub fn set_blue_max_current(&mut self, value: u16) -> Result<(), StoreError<SPI::Error>> {
        store_scalar(&mut self.chip, &mut self.blue_limit, BLUE_LIMIT_OFFSET, value)
    }

    // --- Carousel membership ---------------------------------------------

    /// The carousel membership mask; bit `i` = slot `i` is in rotation
    ///
    /// Membership is independent of occupancy: a bit may point at an
    /// empty slot, and the refresh path skips those because
    /// [`ImageStore::pixel_column`] refuses them.
    pub fn carousel_mask(&mut self) -> Result<u32, StoreError<SPI::Error>> {
        if let Some(mask) = self.carousel {
            return Ok(mask);
        }
        // Bits above the slot range are not membership data (byte 7 of the
        // settings page is shared with the blue limit)
        let mask = self
            .chip
            .read_u32(Address::new(SETTINGS_PAGE, CAROUSEL_OFFSET))?
            & CAROUSEL_SLOT_BITS;
        self.carousel = Some(mask);
        Ok(mask)
    }

    /// Put a slot into the display rotation (cache only; see
    /// [`ImageStore::save_carousel`])
    pub fn add_to_carousel(&mut self, slot: u8) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        let mask = self.carousel_mask()?;
        self.carousel = Some(mask | 1 << slot);
        Ok(())
    }

    /// Take a slot out of the display rotation (cache only)
    pub fn remove_from_carousel(&mut self, slot: u8) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        let mask = self.carousel_mask()?;
        self.carousel = Some(mask & !(1 << slot));
        Ok(())
    }

    /// Whether a slot is in the display rotation
    pub fn in_carousel(&mut self, slot: u8) -> Result<bool, StoreError<SPI::Error>> {
        check_slot(slot)?;
        Ok(self.carousel_mask()? & 1 << slot != 0)
    }

    /// Persist the carousel mask
    ///
    /// Membership edits stay in the cache until this is called, so a
    /// burst of changes costs one flash write.
    pub fn save_carousel(&mut self) -> Result<(), StoreError<SPI::Error>> {
        let mask = self.carousel_mask()?;
        self.chip
            .write_u32(Address::new(SETTINGS_PAGE, CAROUSEL_OFFSET), mask)
    }

    /// Number of slots currently in the rotation
    pub fn carousel_count(&mut self) -> Result<u32, StoreError<SPI::Error>> {
        Ok(self.carousel_mask()?.count_ones())
    }

    // --- Image repository ------------------------------------------------

    /// A slot's filename field
    pub fn filename(&mut self, slot: u8) -> Result<Filename, StoreError<SPI::Error>> {
        check_slot(slot)?;
        let mut field = [0u8; FILENAME_SIZE];
        self.chip.read_bytes(filename_address(slot), &mut field)?;
        Ok(Filename::from_raw(field))
    }

    /// Write a slot's filename field
    ///
    /// This is what makes a slot occupied; bulk writes call it last.
    pub fn set_filename(
        &mut self,
        slot: u8,
        name: &Filename,
    ) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        self.chip.write_bytes(filename_address(slot), name.as_bytes())
    }

    /// Clear a slot's filename field, marking it unoccupied
    pub fn clear_filename(&mut self, slot: u8) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        self.chip
            .write_bytes(filename_address(slot), Filename::EMPTY.as_bytes())
    }

    /// Whether a slot holds an image
    pub fn is_occupied(&mut self, slot: u8) -> Result<bool, StoreError<SPI::Error>> {
        Ok(!self.filename(slot)?.is_empty())
    }

    /// Choose the slot for the next incoming image
    ///
    /// Scans slots in order for the first empty filename. With every
    /// slot occupied the store evicts slot 0, reported explicitly as
    /// [`SlotSelection::Evict`].
    pub fn next_free_slot(&mut self) -> Result<SlotSelection, StoreError<SPI::Error>> {
        for slot in 0..MAX_IMAGES {
            if !self.is_occupied(slot)? {
                return Ok(SlotSelection::Empty(slot));
            }
        }
        Ok(SlotSelection::Evict(0))
    }

    /// Erase a slot's data pages and clear its filename
    ///
    /// Deliberately leaves the slot's carousel bit alone; whoever removes
    /// the image decides whether it also leaves the rotation.
    pub fn erase_image(&mut self, slot: u8) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        let first = image_first_page(slot);
        for page in first..first + PAGES_PER_IMAGE {
            self.chip.erase_page(page)?;
        }
        self.clear_filename(slot)
    }

    /// Store a whole image into a slot
    ///
    /// Data pages are written first with page-aligned chunks, the
    /// filename last: a write torn by power loss leaves the slot
    /// unoccupied instead of advertising corrupt pixels. Image content
    /// carries no checksum; a torn write after the filename commit is
    /// not detectable.
    pub fn save_image(
        &mut self,
        slot: u8,
        name: &Filename,
        data: &[u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        if data.len() != IMAGE_BYTES {
            return Err(StoreError::SizeMismatch);
        }
        let first = image_first_page(slot);
        for (index, chunk) in data.chunks(PAGE_SIZE).enumerate() {
            self.chip
                .write_bytes(Address::new(first + index as u16, 0), chunk)?;
        }
        self.set_filename(slot, name)
    }

    /// Read a whole image out of a slot
    pub fn load_image(
        &mut self,
        slot: u8,
        out: &mut [u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        if out.len() != IMAGE_BYTES {
            return Err(StoreError::SizeMismatch);
        }
        if !self.is_occupied(slot)? {
            return Err(StoreError::EmptySlot);
        }
        self.chip
            .read_page_array(Address::new(image_first_page(slot), 0), out)
    }

    /// Write one pixel column into a slot
    ///
    /// Columns cross page boundaries, so this goes through the
    /// page-splitting write. Occupancy is not required: uploads build a
    /// slot column by column before its filename is committed.
    pub fn save_pixel_column(
        &mut self,
        slot: u8,
        column: u16,
        data: &[u8],
    ) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        check_column(column)?;
        if data.len() != COLUMN_BYTES {
            return Err(StoreError::SizeMismatch);
        }
        self.chip
            .write_across_pages(column_plane_address(slot, column, 0), data)
    }

    /// Read one pixel column, split into the four driver-chain planes
    ///
    /// This is the display refresh path: one call per tick, four bounded
    /// reads straight into the caller's transfer buffers.
    pub fn pixel_column(
        &mut self,
        slot: u8,
        column: u16,
        planes: &mut [[u8; PLANE_BYTES]; PLANE_COUNT],
    ) -> Result<(), StoreError<SPI::Error>> {
        check_slot(slot)?;
        check_column(column)?;
        if !self.is_occupied(slot)? {
            return Err(StoreError::EmptySlot);
        }
        for (index, plane) in planes.iter_mut().enumerate() {
            self.chip
                .read_page_array(column_plane_address(slot, column, index), plane)?;
        }
        Ok(())
    }
}

fn check_slot<E>(slot: u8) -> Result<(), StoreError<E>> {
    if slot >= MAX_IMAGES {
        return Err(StoreError::OutOfRange);
    }
    Ok(())
}

fn check_column<E>(column: u16) -> Result<(), StoreError<E>> {
    if column >= COLUMN_COUNT {
        return Err(StoreError::OutOfRange);
    }
    Ok(())
}

fn cached_scalar<SPI: FlashSpi>(
    chip: &mut DataFlash<SPI>,
    cache: &mut Option<u16>,
    offset: u16,
) -> Result<u16, StoreError<SPI::Error>> {
    if let Some(value) = *cache {
        return Ok(value);
    }
    let value = chip.read_u16(Address::new(SETTINGS_PAGE, offset))?;
    *cache = Some(value);
    Ok(value)
}

fn store_scalar<SPI: FlashSpi>(
    chip: &mut DataFlash<SPI>,
    cache: &mut Option<u16>,
    offset: u16,
    value: u16,
) -> Result<(), StoreError<SPI::Error>> {
    chip.write_u16(Address::new(SETTINGS_PAGE, offset), value)?;
    *cache = Some(value);
    Ok(())
}
