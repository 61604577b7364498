//! Message types for the upload link
//!
//! Message types are divided into two categories:
//! - Host → Controller: image upload sequence, settings, carousel edits
//! - Controller → Host: column acknowledgements and outcome reports

use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};
use heapless::Vec;

// Message type IDs: Host → Controller
pub const MSG_IMAGE_BEGIN: u8 = 0x10;
pub const MSG_IMAGE_COLUMN: u8 = 0x11;
pub const MSG_IMAGE_END: u8 = 0x12;
pub const MSG_SET_BRIGHTNESS: u8 = 0x20;
pub const MSG_SET_CURRENT: u8 = 0x21;
pub const MSG_CAROUSEL_ADD: u8 = 0x22;
pub const MSG_CAROUSEL_REMOVE: u8 = 0x23;
pub const MSG_ERASE_IMAGE: u8 = 0x24;

// Message type IDs: Controller → Host
pub const MSG_COLUMN_ACK: u8 = 0x40;
pub const MSG_IMAGE_STORED: u8 = 0x41;
pub const MSG_NACK: u8 = 0x4F;

/// One pixel column on the wire: four driver-chain planes of 289 bytes
pub const COLUMN_DATA_SIZE: usize = 1156;

/// Maximum image filename length in bytes
pub const MAX_NAME_LEN: usize = 36;

// Nack reason codes
pub const NACK_PROTOCOL: u8 = 0x01;
pub const NACK_STORAGE: u8 = 0x02;

/// LED driver color channel selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

// Wire format values
const CHANNEL_RED: u8 = 0x00;
const CHANNEL_GREEN: u8 = 0x01;
const CHANNEL_BLUE: u8 = 0x02;

impl ColorChannel {
    /// Parse a channel from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CHANNEL_RED => Some(ColorChannel::Red),
            CHANNEL_GREEN => Some(ColorChannel::Green),
            CHANNEL_BLUE => Some(ColorChannel::Blue),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            ColorChannel::Red => CHANNEL_RED,
            ColorChannel::Green => CHANNEL_GREEN,
            ColorChannel::Blue => CHANNEL_BLUE,
        }
    }
}

/// Commands parsed from host-originated frames
///
/// Column and name payloads borrow from the frame they were parsed out of;
/// the ingestion layer persists them before the next frame is read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostCommand<'a> {
    /// Start an image upload; payload is the filename (1-36 bytes)
    ImageBegin { name: &'a [u8] },
    /// One pixel column of the image being uploaded
    ImageColumn { index: u16, data: &'a [u8] },
    /// Commit the image uploaded since `ImageBegin`
    ImageEnd,
    /// Set the global brightness setting
    SetBrightness(u16),
    /// Set the maximum LED current for one color channel
    SetCurrentLimit { channel: ColorChannel, limit: u16 },
    /// Add a slot to the display rotation
    CarouselAdd { slot: u8 },
    /// Remove a slot from the display rotation
    CarouselRemove { slot: u8 },
    /// Erase a stored image
    EraseImage { slot: u8 },
}

impl<'a> HostCommand<'a> {
    /// Parse a command from a frame
    pub fn from_frame(frame: &'a Frame) -> Result<Self, FrameError> {
        let payload = frame.payload.as_slice();
        match frame.msg_type {
            MSG_IMAGE_BEGIN => {
                if payload.is_empty() || payload.len() > MAX_NAME_LEN {
                    return Err(FrameError::InvalidFrame);
                }
                Ok(HostCommand::ImageBegin { name: payload })
            }
            MSG_IMAGE_COLUMN => {
                if payload.len() != 2 + COLUMN_DATA_SIZE {
                    return Err(FrameError::InvalidFrame);
                }
                let index = u16::from_be_bytes([payload[0], payload[1]]);
                Ok(HostCommand::ImageColumn {
                    index,
                    data: &payload[2..],
                })
            }
            MSG_IMAGE_END => {
                if !payload.is_empty() {
                    return Err(FrameError::InvalidFrame);
                }
                Ok(HostCommand::ImageEnd)
            }
            MSG_SET_BRIGHTNESS => {
                if payload.len() != 2 {
                    return Err(FrameError::InvalidFrame);
                }
                Ok(HostCommand::SetBrightness(u16::from_be_bytes([
                    payload[0], payload[1],
                ])))
            }
            MSG_SET_CURRENT => {
                if payload.len() != 3 {
                    return Err(FrameError::InvalidFrame);
                }
                let channel =
                    ColorChannel::from_byte(payload[0]).ok_or(FrameError::InvalidFrame)?;
                let limit = u16::from_be_bytes([payload[1], payload[2]]);
                Ok(HostCommand::SetCurrentLimit { channel, limit })
            }
            MSG_CAROUSEL_ADD => {
                let slot = single_byte(payload)?;
                Ok(HostCommand::CarouselAdd { slot })
            }
            MSG_CAROUSEL_REMOVE => {
                let slot = single_byte(payload)?;
                Ok(HostCommand::CarouselRemove { slot })
            }
            MSG_ERASE_IMAGE => {
                let slot = single_byte(payload)?;
                Ok(HostCommand::EraseImage { slot })
            }
            _ => Err(FrameError::InvalidFrame),
        }
    }

    /// Encode this command into a frame (for host tooling and tests)
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            HostCommand::ImageBegin { name } => Frame::new(MSG_IMAGE_BEGIN, name),
            HostCommand::ImageColumn { index, data } => {
                if data.len() != COLUMN_DATA_SIZE {
                    return Err(FrameError::InvalidFrame);
                }
                let mut payload = Vec::<u8, MAX_PAYLOAD_SIZE>::new();
                payload
                    .extend_from_slice(&index.to_be_bytes())
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                payload
                    .extend_from_slice(data)
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                Frame::new(MSG_IMAGE_COLUMN, &payload)
            }
            HostCommand::ImageEnd => Ok(Frame::empty(MSG_IMAGE_END)),
            HostCommand::SetBrightness(value) => {
                Frame::new(MSG_SET_BRIGHTNESS, &value.to_be_bytes())
            }
            HostCommand::SetCurrentLimit { channel, limit } => {
                let [hi, lo] = limit.to_be_bytes();
                Frame::new(MSG_SET_CURRENT, &[channel.to_byte(), hi, lo])
            }
            HostCommand::CarouselAdd { slot } => Frame::new(MSG_CAROUSEL_ADD, &[*slot]),
            HostCommand::CarouselRemove { slot } => Frame::new(MSG_CAROUSEL_REMOVE, &[*slot]),
            HostCommand::EraseImage { slot } => Frame::new(MSG_ERASE_IMAGE, &[*slot]),
        }
    }
}

fn single_byte(payload: &[u8]) -> Result<u8, FrameError> {
    if payload.len() != 1 {
        return Err(FrameError::InvalidFrame);
    }
    Ok(payload[0])
}

/// Replies from the controller to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// A pixel column was written to flash
    ColumnAck { index: u16 },
    /// An upload completed and the image is now visible
    ImageStored { slot: u8 },
    /// A command was rejected
    Nack { code: u8 },
}

impl Reply {
    /// Encode this reply into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            Reply::ColumnAck { index } => Frame::new(MSG_COLUMN_ACK, &index.to_be_bytes()),
            Reply::ImageStored { slot } => Frame::new(MSG_IMAGE_STORED, &[*slot]),
            Reply::Nack { code } => Frame::new(MSG_NACK, &[*code]),
        }
    }

    /// Parse a reply from a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let payload = frame.payload.as_slice();
        match frame.msg_type {
            MSG_COLUMN_ACK => {
                if payload.len() != 2 {
                    return Err(FrameError::InvalidFrame);
                }
                Ok(Reply::ColumnAck {
                    index: u16::from_be_bytes([payload[0], payload[1]]),
                })
            }
            MSG_IMAGE_STORED => Ok(Reply::ImageStored {
                slot: single_byte(payload)?,
            }),
            MSG_NACK => Ok(Reply::Nack {
                code: single_byte(payload)?,
            }),
            _ => Err(FrameError::InvalidFrame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_begin_roundtrip() {
        let original = HostCommand::ImageBegin {
            name: b"saturn.bmp",
        };
        let frame = original.to_frame().unwrap();
        let parsed = HostCommand::from_frame(&frame).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_image_begin_rejects_empty_and_long_names() {
        let frame = Frame::empty(MSG_IMAGE_BEGIN);
        assert_eq!(
            HostCommand::from_frame(&frame),
            Err(FrameError::InvalidFrame)
        );

        let long = [b'x'; MAX_NAME_LEN + 1];
        let frame = Frame::new(MSG_IMAGE_BEGIN, &long).unwrap();
        assert_eq!(
            HostCommand::from_frame(&frame),
            Err(FrameError::InvalidFrame)
        );
    }

    #[test]
    fn test_image_column_roundtrip() {
        let mut data = [0u8; COLUMN_DATA_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i & 0xFF) as u8;
        }
        let original = HostCommand::ImageColumn {
            index: 137,
            data: &data,
        };
        let frame = original.to_frame().unwrap();
        match HostCommand::from_frame(&frame).unwrap() {
            HostCommand::ImageColumn { index, data: parsed } => {
                assert_eq!(index, 137);
                assert_eq!(parsed, &data[..]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_image_column_rejects_short_data() {
        let frame = Frame::new(MSG_IMAGE_COLUMN, &[0, 1, 2, 3]).unwrap();
        assert_eq!(
            HostCommand::from_frame(&frame),
            Err(FrameError::InvalidFrame)
        );
    }

    #[test]
    fn test_settings_commands_roundtrip() {
        let commands = [
            HostCommand::SetBrightness(200),
            HostCommand::SetCurrentLimit {
                channel: ColorChannel::Green,
                limit: 1500,
            },
            HostCommand::CarouselAdd { slot: 3 },
            HostCommand::CarouselRemove { slot: 14 },
            HostCommand::EraseImage { slot: 0 },
            HostCommand::ImageEnd,
        ];

        for original in commands {
            let frame = original.to_frame().unwrap();
            let parsed = HostCommand::from_frame(&frame).unwrap();
            assert_eq!(parsed, original);
        }
    }

    #[test]
    fn test_channel_roundtrip() {
        for channel in [ColorChannel::Red, ColorChannel::Green, ColorChannel::Blue] {
            assert_eq!(ColorChannel::from_byte(channel.to_byte()), Some(channel));
        }
        assert!(ColorChannel::from_byte(0x03).is_none());
    }

    #[test]
    fn test_unknown_message_type() {
        let frame = Frame::empty(0x7E);
        assert_eq!(
            HostCommand::from_frame(&frame),
            Err(FrameError::InvalidFrame)
        );
    }

    #[test]
    fn test_reply_roundtrip() {
        let replies = [
            Reply::ColumnAck { index: 255 },
            Reply::ImageStored { slot: 7 },
            Reply::Nack {
                code: NACK_STORAGE,
            },
        ];

        for original in replies {
            let frame = original.to_frame().unwrap();
            let parsed = Reply::from_frame(&frame).unwrap();
            assert_eq!(parsed, original);
        }
    }
}
