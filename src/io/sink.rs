//! Byte sink wrapper used by the serializer
//!
//! The serializer streams a tree front to back, but the enclosing image
//! format (JPEG APP1, standalone TIFF, ...) often owes the stream a fixed
//! header whose exact bytes are not known until the first directory is
//! about to be written. The sink therefore takes the header up front and
//! emits it lazily, on the first write that actually moves the position,
//! so every nested write path can stay oblivious.

use std::io::Write;

use crate::error::{Result, TiffError};

/// Identifier of a named offset recorded during serialization.
///
/// The positions are patched into the enclosing container by the caller
/// once the stream is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetTarget {
    /// Offset of the CR2 RAW image IFD (IFD3)
    Cr2RawIfd,
}

/// A writable byte sink with an optional lazy prefix header and a table
/// of named offset targets
pub struct IoSink<W> {
    sink: W,
    header: Option<Vec<u8>>,
    wrote_header: bool,
    targets: Vec<(OffsetTarget, u32)>,
}

impl<W: Write> IoSink<W> {
    /// Wrap `sink`, emitting `header` before the first payload byte
    pub fn new(sink: W, header: Option<Vec<u8>>) -> Self {
        let wrote_header = match &header {
            Some(h) => h.is_empty(),
            None => true,
        };
        IoSink {
            sink,
            header,
            wrote_header,
            targets: Vec::new(),
        }
    }

    /// Wrap `sink` with no prefix header
    pub fn plain(sink: W) -> Self {
        Self::new(sink, None)
    }

    /// Write `data`, emitting the pending header first if this is the
    /// first write that advances the position; returns the payload length
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.wrote_header && !data.is_empty() {
            self.flush_header()?;
        }
        self.sink.write_all(data)?;
        Ok(data.len())
    }

    /// Write one byte, with the same lazy-header behavior
    pub fn put(&mut self, byte: u8) -> Result<()> {
        if !self.wrote_header {
            self.flush_header()?;
        }
        self.sink.write_all(&[byte])?;
        Ok(())
    }

    /// Record a named offset for later patching.
    ///
    /// Targets beyond the 32-bit offset space are refused.
    pub fn set_target(&mut self, id: OffsetTarget, offset: u64) -> Result<()> {
        if offset > u32::MAX as u64 {
            return Err(TiffError::OffsetOutOfRange(offset));
        }
        self.targets.push((id, offset as u32));
        Ok(())
    }

    /// The offsets recorded so far
    pub fn targets(&self) -> &[(OffsetTarget, u32)] {
        &self.targets
    }

    /// Consume the wrapper and return the underlying sink
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn flush_header(&mut self) -> Result<()> {
        if let Some(header) = &self.header {
            self.sink.write_all(header)?;
        }
        self.wrote_header = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_emitted_before_first_write() {
        let mut out = Vec::new();
        let mut sink = IoSink::new(&mut out, Some(b"HDR".to_vec()));
        sink.write(b"payload").unwrap();
        assert_eq!(out, b"HDRpayload");
    }

    #[test]
    fn test_header_emitted_once() {
        let mut out = Vec::new();
        let mut sink = IoSink::new(&mut out, Some(b"H".to_vec()));
        sink.write(b"a").unwrap();
        sink.write(b"b").unwrap();
        sink.put(b'c').unwrap();
        assert_eq!(out, b"Habc");
    }

    #[test]
    fn test_empty_write_holds_header_back() {
        let mut out = Vec::new();
        {
            let mut sink = IoSink::new(&mut out, Some(b"H".to_vec()));
            sink.write(b"").unwrap();
        }
        assert!(out.is_empty());
        {
            let mut sink = IoSink::new(&mut out, Some(b"H".to_vec()));
            sink.write(b"x").unwrap();
        }
        assert_eq!(out, b"Hx");
    }

    #[test]
    fn test_no_header() {
        let mut out = Vec::new();
        let mut sink = IoSink::plain(&mut out);
        sink.write(b"xy").unwrap();
        assert_eq!(out, b"xy");
    }

    #[test]
    fn test_set_target_range() {
        let mut sink = IoSink::plain(Vec::new());
        sink.set_target(OffsetTarget::Cr2RawIfd, 0x1000).unwrap();
        assert_eq!(sink.targets(), &[(OffsetTarget::Cr2RawIfd, 0x1000)]);
        let err = sink.set_target(OffsetTarget::Cr2RawIfd, u32::MAX as u64 + 1);
        assert!(matches!(err, Err(TiffError::OffsetOutOfRange(_))));
    }
}
