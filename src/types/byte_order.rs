//! Byte order handling for TIFF structures
//!
//! TIFF streams declare their own byte order, and maker-notes may override
//! it. All multi-byte fields go through the codecs here so the active order
//! is a runtime value rather than a type parameter.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use std::fmt;

/// Byte order of a TIFF structure
///
/// `Invalid` marks an unset order, used by maker-note headers and binary
/// array configurations that inherit the order of the surrounding stream.
/// It must be resolved before any codec call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little endian ("II")
    Little,
    /// Big endian ("MM")
    Big,
    /// Not set; inherit from the surrounding context
    Invalid,
}

impl ByteOrder {
    /// Check whether this order has been resolved
    #[inline]
    pub const fn is_valid(self) -> bool {
        !matches!(self, ByteOrder::Invalid)
    }

    /// Return `self` if resolved, otherwise `fallback`
    #[inline]
    pub fn or(self, fallback: ByteOrder) -> ByteOrder {
        match self {
            ByteOrder::Invalid => fallback,
            other => other,
        }
    }

    /// Encode a `u16` into `buf` at offset 0; returns the encoded length
    pub fn put_u16(self, buf: &mut [u8], value: u16) -> usize {
        match self {
            ByteOrder::Little => LittleEndian::write_u16(buf, value),
            ByteOrder::Big => BigEndian::write_u16(buf, value),
            ByteOrder::Invalid => unreachable!("byte order not resolved"),
        }
        2
    }

    /// Encode a `u32` into `buf` at offset 0; returns the encoded length
    pub fn put_u32(self, buf: &mut [u8], value: u32) -> usize {
        match self {
            ByteOrder::Little => LittleEndian::write_u32(buf, value),
            ByteOrder::Big => BigEndian::write_u32(buf, value),
            ByteOrder::Invalid => unreachable!("byte order not resolved"),
        }
        4
    }

    /// Encode an `i16` into `buf` at offset 0; returns the encoded length
    pub fn put_i16(self, buf: &mut [u8], value: i16) -> usize {
        self.put_u16(buf, value as u16)
    }

    /// Encode an `i32` into `buf` at offset 0; returns the encoded length
    pub fn put_i32(self, buf: &mut [u8], value: i32) -> usize {
        self.put_u32(buf, value as u32)
    }

    /// Decode a `u16` from the first two bytes of `buf`
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            ByteOrder::Little => LittleEndian::read_u16(buf),
            ByteOrder::Big => BigEndian::read_u16(buf),
            ByteOrder::Invalid => unreachable!("byte order not resolved"),
        }
    }

    /// Decode a `u32` from the first four bytes of `buf`
    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            ByteOrder::Little => LittleEndian::read_u32(buf),
            ByteOrder::Big => BigEndian::read_u32(buf),
            ByteOrder::Invalid => unreachable!("byte order not resolved"),
        }
    }

    /// Decode an `i16` from the first two bytes of `buf`
    pub fn read_i16(self, buf: &[u8]) -> i16 {
        self.read_u16(buf) as i16
    }

    /// Decode an `i32` from the first four bytes of `buf`
    pub fn read_i32(self, buf: &[u8]) -> i32 {
        self.read_u32(buf) as i32
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ByteOrder::Little => "little endian",
            ByteOrder::Big => "big endian",
            ByteOrder::Invalid => "invalid",
        };
        f.write_str(s)
    }
}
