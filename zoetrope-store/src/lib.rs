//! Flash object store for the Zoetrope display controller
//!
//! A rotating-LED display keeps its bitmap images and device settings on a
//! serial DataFlash chip. This crate turns that chip, reachable only through
//! a byte-level SPI command protocol, into a small fixed-capacity object
//! store:
//!
//! - Address and command encoding for the chip's wire protocol, including
//!   its in-page wrap-around transfer semantics ([`chip`], [`command`])
//! - A fixed-offset settings region for brightness, LED current limits and
//!   the carousel membership mask ([`store`])
//! - A fixed-slot image repository with a filename table and evict-oldest
//!   slot selection ([`store`], [`layout`])
//! - Pixel-column random access used by the display refresh path ([`store`])
//! - The serial-link decoder that streams uploads into the repository
//!   ([`ingest`])
//!
//! All hardware access goes through the seams in `zoetrope-hal`, so the
//! whole crate is testable on the host against a simulated chip.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod addr;
pub mod chip;
pub mod command;
pub mod error;
pub mod filename;
pub mod ingest;
pub mod layout;
pub mod store;

#[cfg(test)]
pub(crate) mod sim;

// Re-export the main entry points at crate root for convenience
pub use addr::Address;
pub use chip::DataFlash;
pub use error::StoreError;
pub use filename::Filename;
pub use ingest::{IngestDecoder, IngestError, IngestEvent};
pub use store::{ImageStore, SlotSelection};
