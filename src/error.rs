//! Error types for tifftree

use std::io;
use thiserror::Error;

use crate::types::{Group, TiffType};

/// Main error type for tifftree operations
#[derive(Debug, Error)]
pub enum TiffError {
    /// IO error occurred while writing to the sink
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An offset does not fit the 32-bit TIFF offset field
    #[error("Offset out of range: {0:#X}")]
    OffsetOutOfRange(u64),

    /// A directory holds more entries than the 16-bit count field allows
    #[error("Too many directory entries in {group}: {count}")]
    TooManyDirEntries {
        /// Group of the offending directory
        group: Group,
        /// Number of entries found
        count: usize,
    },

    /// Planned and actual byte counts disagree during serialization
    #[error("Image write failed in {group}, entry {tag:#06X}")]
    ImageWriteFailed {
        /// Group of the offending node
        group: Group,
        /// Tag of the offending node
        tag: u16,
    },

    /// A data-area offset entry has a TIFF type that cannot hold offsets
    #[error("Unsupported data area offset type: {0}")]
    UnsupportedOffsetType(TiffType),

    /// The node kind does not support deep copies
    #[error("Cloning is not supported for {0} nodes")]
    CloneNotSupported(&'static str),

    /// The tree does not have the shape the operation requires
    #[error("Invalid tree structure: {0}")]
    InvalidStructure(String),
}

/// Result type alias for tifftree operations
pub type Result<T> = std::result::Result<T, TiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_error_display() {
        let err = TiffError::OffsetOutOfRange(0x1_0000_0000);
        assert_eq!(err.to_string(), "Offset out of range: 0x100000000");
    }

    #[test]
    fn test_too_many_entries_display() {
        let err = TiffError::TooManyDirEntries {
            group: Group::Ifd0,
            count: 65536,
        };
        assert!(err.to_string().contains("Ifd0"));
        assert!(err.to_string().contains("65536"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let tiff_err: TiffError = io_err.into();
        assert!(matches!(tiff_err, TiffError::Io(_)));
    }
}
