//! Image strip entries

use std::io::Write;

use crate::error::{Result, TiffError};
use crate::io::IoSink;
use crate::types::{word_align, ByteOrder, ByteView, Group, TiffType};
use crate::value::Value;

use super::entry::{warn_strips, write_offset, EntryData};
use super::Node;

/// An offsets entry referring to image strips (e.g. `StripOffsets`)
///
/// Unlike [`DataEntry`](super::DataEntry), the strips are kept
/// individually and need not be contiguous. They are written to the
/// global image area at the end of the stream, or into the local data
/// area when the entry lives inside a maker-note so the maker-note stays
/// self-contained.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub(crate) common: EntryData,
    /// Tag of the paired size entry
    pub(crate) sz_tag: u16,
    /// Group of the paired size entry
    pub(crate) sz_group: Group,
    /// The image strips as views into the source buffer
    pub(crate) strips: Vec<ByteView>,
}

impl ImageEntry {
    /// Create an image entry paired with the size entry `(sz_tag, sz_group)`
    pub fn new(tag: u16, group: Group, sz_tag: u16, sz_group: Group) -> Self {
        ImageEntry {
            common: EntryData::new(tag, group, TiffType::Long),
            sz_tag,
            sz_group,
            strips: Vec::new(),
        }
    }

    /// Shared entry data
    pub fn common(&self) -> &EntryData {
        &self.common
    }

    /// Shared entry data, mutable
    pub fn common_mut(&mut self) -> &mut EntryData {
        &mut self.common
    }

    /// Address of the paired size entry
    pub fn size_entry_addr(&self) -> (u16, Group) {
        (self.sz_tag, self.sz_group)
    }

    /// The collected strips
    pub fn strips(&self) -> &[ByteView] {
        &self.strips
    }

    /// Validate each strip against the source buffer and collect the
    /// surviving ones.
    ///
    /// Strips outside the buffer are dropped individually with a
    /// diagnostic; zero-length strips are dropped silently.
    pub fn set_strips(&mut self, size_value: &Value, data: &ByteView, base_offset: u32) {
        let value = match &self.common.value {
            Some(v) => v,
            None => {
                warn_strips(
                    self.common.group,
                    self.common.tag,
                    "Size or data offset value not set, ignoring them.",
                );
                return;
            }
        };
        if value.count() != size_value.count() {
            warn_strips(
                self.common.group,
                self.common.tag,
                "Size and data offset entries have different number of components, ignoring them.",
            );
            return;
        }
        let buf_len = data.len() as u64;
        for i in 0..value.count() {
            let offset = value.to_u32(i).unwrap_or(0) as u64;
            let size = size_value.to_u32(i).unwrap_or(0) as u64;
            if offset > buf_len || size > buf_len || base_offset as u64 + offset > buf_len - size {
                warn_strips(
                    self.common.group,
                    self.common.tag,
                    &format!("Strip {i} is outside of the data area; ignored."),
                );
            } else if size != 0 {
                self.strips
                    .push(data.slice((base_offset as u64 + offset) as usize, size as usize));
            }
        }
    }

    /// Emit one rebased offset per strip.
    ///
    /// Strips of ordinary groups target the global image area and advance
    /// `image_idx`; strips inside a maker-note target the local data area
    /// and leave `image_idx` alone.
    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        let local = self.common.group.in_makernote();
        let mut o2 = if local {
            (offset + data_idx as i64) as u32
        } else {
            *image_idx
        };
        let mut buf = vec![0u8; self.strips.len() * 4];
        let mut pos = 0;
        for strip in &self.strips {
            pos += write_offset(
                &mut buf[pos..],
                o2 as i64,
                self.common.tiff_type,
                byte_order,
            )?;
            o2 += word_align(strip.len()) as u32;
            if !local {
                *image_idx += word_align(strip.len()) as u32;
            }
        }
        sink.write(&buf)
    }

    /// In a maker-note, the strip bytes go into the local data area
    pub(crate) fn write_data<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        if self.common.group.in_makernote() {
            self.write_image(sink, byte_order)
        } else {
            Ok(0)
        }
    }

    /// Emit the strip bytes, each word aligned.
    ///
    /// A data area attached by an encoder takes precedence over the
    /// collected strips.
    pub(crate) fn write_image<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        _byte_order: ByteOrder,
    ) -> Result<usize> {
        if self.common.value.is_none() {
            return Err(TiffError::ImageWriteFailed {
                group: self.common.group,
                tag: self.common.tag,
            });
        }
        if let Some(area) = &self.common.data_area {
            if !area.is_empty() {
                let mut len = sink.write(area.as_slice())?;
                if len & 1 == 1 {
                    sink.put(0)?;
                    len += 1;
                }
                return Ok(len);
            }
        }
        let mut len = 0;
        for strip in &self.strips {
            len += sink.write(strip.as_slice())?;
            if strip.len() & 1 == 1 {
                sink.put(0)?;
                len += 1;
            }
        }
        Ok(len)
    }
}

impl Node for ImageEntry {
    fn tag(&self) -> u16 {
        self.common.tag
    }

    fn group(&self) -> Group {
        self.common.group
    }

    fn idx(&self) -> u32 {
        self.common.idx
    }

    fn count(&self) -> usize {
        self.common.count
    }

    fn size(&self) -> usize {
        self.strips.len() * 4
    }

    fn size_data(&self) -> usize {
        // Maker-note image data lives in the local data area
        if self.common.group.in_makernote() {
            self.size_image()
        } else {
            0
        }
    }

    fn size_image(&self) -> usize {
        if let Some(area) = &self.common.data_area {
            if !area.is_empty() {
                return area.len();
            }
        }
        self.strips.iter().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_offsets(group: Group, offsets: Vec<u32>) -> ImageEntry {
        let mut entry = ImageEntry::new(0x0111, group, 0x0117, group);
        entry
            .common_mut()
            .update_value(Value::Long(offsets), ByteOrder::Little);
        entry
    }

    #[test]
    fn test_set_strips_collects_valid() {
        let mut entry = entry_with_offsets(Group::Ifd0, vec![0, 10]);
        let sizes = Value::Long(vec![10, 5]);
        let data = ByteView::from_vec((0u8..20).collect());
        entry.set_strips(&sizes, &data, 0);
        assert_eq!(entry.strips().len(), 2);
        assert_eq!(entry.strips()[1].as_slice(), &[10, 11, 12, 13, 14]);
    }

    #[test]
    fn test_set_strips_drops_out_of_range() {
        let mut entry = entry_with_offsets(Group::Ifd0, vec![0, 90]);
        let sizes = Value::Long(vec![10, 20]);
        let data = ByteView::from_vec(vec![0; 100]);
        entry.set_strips(&sizes, &data, 0);
        assert_eq!(entry.strips().len(), 1);
    }

    #[test]
    fn test_set_strips_drops_zero_length() {
        let mut entry = entry_with_offsets(Group::Ifd0, vec![0, 5]);
        let sizes = Value::Long(vec![5, 0]);
        let data = ByteView::from_vec(vec![0; 10]);
        entry.set_strips(&sizes, &data, 0);
        assert_eq!(entry.strips().len(), 1);
    }

    #[test]
    fn test_write_targets_image_area() {
        let mut entry = entry_with_offsets(Group::Ifd0, vec![0, 10]);
        let sizes = Value::Long(vec![10, 5]);
        let data = ByteView::from_vec(vec![0; 20]);
        entry.set_strips(&sizes, &data, 0);

        let mut sink = IoSink::plain(Vec::new());
        let mut image_idx = 100u32;
        entry
            .write(&mut sink, ByteOrder::Little, 0, 0, &mut image_idx)
            .unwrap();
        let out = sink.into_inner();
        let read = |i: usize| u32::from_le_bytes(out[i..i + 4].try_into().unwrap());
        assert_eq!(read(0), 100);
        assert_eq!(read(4), 110);
        // 10 + word-aligned 5 advance the global index
        assert_eq!(image_idx, 116);
    }

    #[test]
    fn test_write_targets_local_data_area_in_makernote() {
        let mut entry = entry_with_offsets(Group::Sony, vec![0]);
        let sizes = Value::Long(vec![8]);
        let data = ByteView::from_vec(vec![0; 8]);
        entry.set_strips(&sizes, &data, 0);

        let mut sink = IoSink::plain(Vec::new());
        let mut image_idx = 100u32;
        entry
            .write(&mut sink, ByteOrder::Little, 0x40, 0x20, &mut image_idx)
            .unwrap();
        let out = sink.into_inner();
        assert_eq!(u32::from_le_bytes(out[..4].try_into().unwrap()), 0x60);
        // Local strips leave the global index alone
        assert_eq!(image_idx, 100);
    }

    #[test]
    fn test_size_data_gated_on_makernote() {
        let mut inside = entry_with_offsets(Group::Sony, vec![0]);
        let sizes = Value::Long(vec![6]);
        let data = ByteView::from_vec(vec![0; 6]);
        inside.set_strips(&sizes, &data, 0);
        assert_eq!(inside.size_data(), 6);
        assert_eq!(inside.size_image(), 6);

        let mut outside = entry_with_offsets(Group::Ifd0, vec![0]);
        outside.set_strips(&sizes, &data, 0);
        assert_eq!(outside.size_data(), 0);
        assert_eq!(outside.size_image(), 6);
    }
}
