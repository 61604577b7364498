//! Serial ingestion seam
//!
//! The host uploads images and settings over a serial link. The controller
//! side only ever consumes bytes, so the seam is a read-only byte source;
//! interrupt-driven receive buffers implement it over their ring buffer.

/// Incoming byte stream from the host link
pub trait SerialSource {
    /// Error type for receive operations
    type Error;

    /// Returns true when at least one byte can be read without blocking
    fn data_available(&mut self) -> bool;

    /// Read the next byte
    ///
    /// Blocks until a byte arrives. Call [`SerialSource::data_available`]
    /// first to avoid stalling a refresh loop.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}
