//! Store error types

/// Errors from flash store operations
///
/// `E` is the bus error of the underlying [`zoetrope_hal::FlashSpi`]
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    /// The SPI bus failed
    Spi(E),
    /// Slot or column index beyond capacity
    OutOfRange,
    /// Buffer length does not match the record being transferred
    SizeMismatch,
    /// Reading image data from a slot with no image
    EmptySlot,
    /// The chip never cleared its busy flag
    BusyTimeout,
    /// The chip reported a failed program or erase operation
    WriteFailed,
}
