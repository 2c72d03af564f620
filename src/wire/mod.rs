//! Binary frame format spoken by the XSerialOne hardware
//!
//! Every frame is a fixed 29 byte little-endian packet:
//!
//! ```text
//! offset  size  field
//!   0      1    header, always 0xFF
//!   1      2    button mask, bit i = button i, bits 10..16 zero
//!   3     24    six f32 axes in frame order
//!  27      1    dpad code (hx + 1) + (hy + 1) * 3, 4 = center
//!  28      1    checksum, sum of bytes 1..=27 mod 256
//! ```
//!
//! The bridge only ever encodes; [`decode`] exists so the format can be
//! checked end to end and for tooling that sniffs the link.

use crate::frame::{Frame, AXIS_COUNT, BUTTON_COUNT};
use thiserror::Error;

pub const HEADER: u8 = 0xFF;
pub const PACKET_LEN: usize = 29;

const MASK_OFFSET: usize = 1;
const AXES_OFFSET: usize = 3;
const DPAD_OFFSET: usize = 27;
const CHECKSUM_OFFSET: usize = 28;
const VALID_BUTTON_BITS: u16 = (1 << BUTTON_COUNT) - 1;

#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("Packet has {0} bytes, expected 29")]
    InvalidLength(usize),

    #[error("Invalid header byte: {0:#04x}")]
    InvalidHeader(u8),

    #[error("Checksum mismatch: packet says {received:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { received: u8, computed: u8 },

    #[error("Reserved button bits set in mask {0:#06x}")]
    ReservedBits(u16),

    #[error("Dpad code {0} out of range")]
    InvalidDpadCode(u8),
}

/// Decoded field view of one wire frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet {
    pub buttons: u16,
    pub axes: [f32; AXIS_COUNT],
    pub dpad_code: u8,
}

impl Packet {
    pub fn from_frame(frame: &Frame) -> Self {
        let (hx, hy) = frame.dpad();
        Self {
            buttons: buttons_to_bitmask(frame.buttons()),
            axes: *frame.axes(),
            dpad_code: dpad_encode(hx, hy),
        }
    }

    pub fn pack(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[0] = HEADER;
        out[MASK_OFFSET..AXES_OFFSET].copy_from_slice(&self.buttons.to_le_bytes());
        for (i, value) in self.axes.iter().enumerate() {
            let start = AXES_OFFSET + i * 4;
            out[start..start + 4].copy_from_slice(&value.to_le_bytes());
        }
        out[DPAD_OFFSET] = self.dpad_code;
        out[CHECKSUM_OFFSET] = checksum(&out[MASK_OFFSET..CHECKSUM_OFFSET]);
        out
    }

    pub fn unpack(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != PACKET_LEN {
            return Err(WireError::InvalidLength(bytes.len()));
        }
        if bytes[0] != HEADER {
            return Err(WireError::InvalidHeader(bytes[0]));
        }
        let computed = checksum(&bytes[MASK_OFFSET..CHECKSUM_OFFSET]);
        if computed != bytes[CHECKSUM_OFFSET] {
            return Err(WireError::ChecksumMismatch {
                received: bytes[CHECKSUM_OFFSET],
                computed,
            });
        }

        let buttons = u16::from_le_bytes([bytes[MASK_OFFSET], bytes[MASK_OFFSET + 1]]);
        if buttons & !VALID_BUTTON_BITS != 0 {
            return Err(WireError::ReservedBits(buttons));
        }

        let mut axes = [0.0f32; AXIS_COUNT];
        for (i, slot) in axes.iter_mut().enumerate() {
            let start = AXES_OFFSET + i * 4;
            *slot = f32::from_le_bytes([
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ]);
        }

        let dpad_code = bytes[DPAD_OFFSET];
        if dpad_code > 8 {
            return Err(WireError::InvalidDpadCode(dpad_code));
        }

        Ok(Self {
            buttons,
            axes,
            dpad_code,
        })
    }

    pub fn to_frame(&self) -> Frame {
        let (hx, hy) = dpad_decode(self.dpad_code).unwrap_or((0, 0));
        Frame::new(bitmask_to_buttons(self.buttons), self.axes, (hx, hy))
    }
}

/// Encodes a frame into its wire bytes
pub fn encode(frame: &Frame) -> [u8; PACKET_LEN] {
    Packet::from_frame(frame).pack()
}

/// Parses and validates wire bytes back into a frame
pub fn decode(bytes: &[u8]) -> Result<Frame, WireError> {
    Packet::unpack(bytes).map(|packet| packet.to_frame())
}

pub fn buttons_to_bitmask(buttons: &[bool; BUTTON_COUNT]) -> u16 {
    buttons
        .iter()
        .enumerate()
        .filter(|(_, pressed)| **pressed)
        .fold(0u16, |mask, (i, _)| mask | (1 << i))
}

pub fn bitmask_to_buttons(mask: u16) -> [bool; BUTTON_COUNT] {
    std::array::from_fn(|i| mask & (1 << i) != 0)
}

pub fn dpad_encode(hx: i8, hy: i8) -> u8 {
    ((hx.clamp(-1, 1) + 1) + (hy.clamp(-1, 1) + 1) * 3) as u8
}

pub fn dpad_decode(code: u8) -> Option<(i8, i8)> {
    if code > 8 {
        return None;
    }
    let code = code as i8;
    Some((code % 3 - 1, code / 3 - 1))
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}
