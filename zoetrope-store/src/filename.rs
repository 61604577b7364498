//! Fixed-width image filenames
//!
//! Filenames are stored zero-padded in fixed fields of the filename table
//! and are the only occupancy marker a slot has: a slot whose filename
//! field is empty holds no image, whatever its data pages contain.

use crate::layout::FILENAME_SIZE;

/// A zero-padded, fixed-width image filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Filename([u8; FILENAME_SIZE]);

impl Filename {
    /// The empty filename marking an unoccupied slot
    pub const EMPTY: Self = Self([0; FILENAME_SIZE]);

    /// Build a filename from raw name bytes, zero-padding to field width
    ///
    /// Returns `None` for an empty or oversized name, or one whose first
    /// byte collides with the empty markers (`0x00`, `0xFF`).
    pub fn new(name: &[u8]) -> Option<Self> {
        if name.is_empty() || name.len() > FILENAME_SIZE {
            return None;
        }
        if matches!(name[0], 0x00 | 0xFF) {
            return None;
        }
        let mut field = [0u8; FILENAME_SIZE];
        field[..name.len()].copy_from_slice(name);
        Some(Self(field))
    }

    /// Wrap a raw field as read from the filename table
    pub const fn from_raw(field: [u8; FILENAME_SIZE]) -> Self {
        Self(field)
    }

    /// The full zero-padded field, as persisted
    pub fn as_bytes(&self) -> &[u8; FILENAME_SIZE] {
        &self.0
    }

    /// The name without padding
    pub fn name_bytes(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .position(|&b| b == 0x00)
            .unwrap_or(FILENAME_SIZE);
        &self.0[..end]
    }

    /// The name as UTF-8, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(self.name_bytes()).ok()
    }

    /// True for an unoccupied filename field
    ///
    /// A field starting with `0x00` was cleared by the store; one starting
    /// with `0xFF` comes from a factory-fresh or erased chip. Both mean
    /// "no image here".
    pub fn is_empty(&self) -> bool {
        matches!(self.0[0], 0x00 | 0xFF)
    }
}

impl Default for Filename {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pads_with_zeros() {
        let name = Filename::new(b"orbit.bmp").unwrap();
        assert_eq!(&name.as_bytes()[..9], b"orbit.bmp");
        assert!(name.as_bytes()[9..].iter().all(|&b| b == 0));
        assert_eq!(name.name_bytes(), b"orbit.bmp");
        assert_eq!(name.as_str(), Some("orbit.bmp"));
    }

    #[test]
    fn test_new_rejects_invalid_names() {
        assert!(Filename::new(b"").is_none());
        assert!(Filename::new(&[b'x'; FILENAME_SIZE + 1]).is_none());
        assert!(Filename::new(&[0x00, b'a']).is_none());
        assert!(Filename::new(&[0xFF, b'a']).is_none());
    }

    #[test]
    fn test_full_width_name() {
        let raw = [b'n'; FILENAME_SIZE];
        let name = Filename::new(&raw).unwrap();
        assert_eq!(name.name_bytes(), &raw[..]);
    }

    #[test]
    fn test_emptiness_markers() {
        assert!(Filename::EMPTY.is_empty());
        assert!(Filename::from_raw([0xFF; FILENAME_SIZE]).is_empty());
        assert!(!Filename::new(b"a").unwrap().is_empty());
    }
}
