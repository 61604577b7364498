//! Zoetrope Upload-Link Protocol
//!
//! This crate defines the serial protocol between a host machine and the
//! display controller. The host uses it to stream bitmap images into the
//! controller's flash store, adjust brightness and LED current limits, and
//! manage the rotation carousel.
//!
//! # Protocol Overview
//!
//! All messages use a binary frame format with a two-byte length, because
//! one image column (1156 bytes) travels as a single frame:
//! ```text
//! ┌───────┬────────┬──────┬──────────────┬──────────┐
//! │ START │ LENGTH │ TYPE │ PAYLOAD      │ CHECKSUM │
//! │ 1B    │ 2B BE  │ 1B   │ 0–1158B      │ 1B       │
//! └───────┴────────┴──────┴──────────────┴──────────┘
//! ```
//!
//! An image upload is a `ImageBegin` / 256 × `ImageColumn` / `ImageEnd`
//! sequence; the controller acknowledges each column so the 289 KiB image
//! can be flow-controlled through a small receive ring.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod commands;
pub mod frame;

pub use commands::{ColorChannel, HostCommand, Reply, COLUMN_DATA_SIZE, MAX_NAME_LEN};
pub use frame::{Frame, FrameError, FrameParser, FRAME_START, MAX_PAYLOAD_SIZE};
