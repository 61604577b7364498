//! Zoetrope Hardware Abstraction Layer
//!
//! This crate defines the two hardware seams the storage manager is built
//! against, so the same store and ingestion code runs on real hardware and
//! on host-side test doubles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  zoetrope-store (chip driver, ingest)   │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │   FlashSpi    │       │ SerialSource  │
//! │ (DataFlash)   │       │ (host link)   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`spi::FlashSpi`] - byte-level SPI transfer plus chip-select ownership
//! - [`serial::SerialSource`] - the incoming host byte stream

#![no_std]
#![deny(unsafe_code)]

pub mod serial;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use serial::SerialSource;
pub use spi::{BusError, FlashSpi, SpiFlashBus};
