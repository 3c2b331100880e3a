//! Plain IFD entries and the data shared by all entry-like nodes

use std::io::Write;

use log::warn;

use crate::error::{Result, TiffError};
use crate::io::IoSink;
use crate::types::{to_tiff_type, ByteOrder, ByteView, Group, TiffType};
use crate::value::Value;

use super::Node;

/// Data common to all entry-like nodes
///
/// Keeps the wire identity (tag, type, count), the raw byte image of the
/// value, the decoded [`Value`], and the bookkeeping the serializer needs
/// (assigned offset, insertion index, optional data area).
#[derive(Debug, Clone)]
pub struct EntryData {
    pub(crate) tag: u16,
    pub(crate) group: Group,
    pub(crate) tiff_type: TiffType,
    pub(crate) count: usize,
    /// Absolute stream offset assigned to the value during serialization
    pub(crate) offset: i64,
    /// Insertion counter; stable tiebreaker when sorting by tag
    pub(crate) idx: u32,
    /// Byte size of the raw value image
    pub(crate) size: usize,
    /// Raw value image; may share a parsed source buffer
    pub(crate) data: ByteView,
    pub(crate) value: Option<Value>,
    /// Ancillary bytes referenced by offset from the value
    pub(crate) data_area: Option<ByteView>,
}

impl EntryData {
    pub(crate) fn new(tag: u16, group: Group, tiff_type: TiffType) -> Self {
        EntryData {
            tag,
            group,
            tiff_type,
            count: 0,
            offset: 0,
            idx: 0,
            size: 0,
            data: ByteView::new(),
            value: None,
            data_area: None,
        }
    }

    /// The decoded value, if one is set
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The raw byte image of the value
    pub fn data(&self) -> &ByteView {
        &self.data
    }

    /// Absolute stream offset assigned to the value by the serializer
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Set the insertion index used as a sort tiebreaker
    pub fn set_idx(&mut self, idx: u32) {
        self.idx = idx;
    }

    /// Attach a raw byte image, typically a view into a parsed buffer
    pub fn set_data(&mut self, data: ByteView) {
        self.size = data.len();
        self.data = data;
    }

    /// Set the value and re-derive the wire type and count from it.
    ///
    /// The raw byte image is left alone; use [`EntryData::update_value`]
    /// to keep it in sync.
    pub fn set_value(&mut self, value: Value) {
        self.tiff_type = to_tiff_type(value.type_id());
        self.count = value.count();
        self.value = Some(value);
    }

    /// Set the value and rewrite the raw byte image to match.
    ///
    /// The backing buffer is reallocated only when the new value is
    /// larger than the current image, and zero-filled before the copy.
    pub fn update_value(&mut self, value: Value, byte_order: ByteOrder) {
        let new_size = value.size();
        if new_size > self.data.len() {
            self.data = ByteView::alloc(new_size);
        }
        let buf = self.data.to_mut();
        buf.fill(0);
        self.size = value.copy_to(buf, byte_order);
        self.set_value(value);
    }

    /// Serialize the value bytes; entries without a value write nothing
    pub(crate) fn write_value<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        let value = match &self.value {
            Some(v) if v.size() > 0 => v,
            _ => return Ok(0),
        };
        let mut buf = vec![0u8; value.size()];
        value.copy_to(&mut buf, byte_order);
        sink.write(&buf)
    }
}

/// Emit one offset with the width dictated by the entry's TIFF type.
///
/// SHORT offsets larger than 16 bits are refused; anything other than the
/// SHORT and LONG families cannot hold offsets at all.
pub(crate) fn write_offset(
    buf: &mut [u8],
    target: i64,
    tiff_type: TiffType,
    byte_order: ByteOrder,
) -> Result<usize> {
    match tiff_type {
        TiffType::Short | TiffType::SShort => {
            if target as u32 > 0xFFFF {
                return Err(TiffError::OffsetOutOfRange(target as u64));
            }
            Ok(byte_order.put_i16(buf, target as i16))
        }
        TiffType::Long | TiffType::SLong => Ok(byte_order.put_u32(buf, target as u32)),
        other => Err(TiffError::UnsupportedOffsetType(other)),
    }
}

/// A normal IFD tag with a value
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) common: EntryData,
}

impl Entry {
    /// Create an entry; the type is refined once a value is set
    pub fn new(tag: u16, group: Group) -> Self {
        Entry {
            common: EntryData::new(tag, group, TiffType::Undefined),
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

    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        self.common.write_value(sink, byte_order)
    }
}

impl Node for Entry {
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
        self.common.size
    }
}

/// The size counterpart of a [`DataEntry`](super::DataEntry); holds the
/// byte counts belonging to the sibling offsets entry
#[derive(Debug, Clone)]
pub struct SizeEntry {
    pub(crate) common: EntryData,
    /// Tag of the paired offsets entry
    pub(crate) dt_tag: u16,
    /// Group of the paired offsets entry
    pub(crate) dt_group: Group,
}

impl SizeEntry {
    /// Create a size entry paired with the offsets entry `(dt_tag, dt_group)`
    pub fn new(tag: u16, group: Group, dt_tag: u16, dt_group: Group) -> Self {
        SizeEntry {
            common: EntryData::new(tag, group, TiffType::Long),
            dt_tag,
            dt_group,
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

    /// Address of the paired offsets entry
    pub fn data_entry_addr(&self) -> (u16, Group) {
        (self.dt_tag, self.dt_group)
    }

    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        self.common.write_value(sink, byte_order)
    }
}

impl Node for SizeEntry {
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
        self.common.size
    }
}

/// Log a diagnostic for a rejected strip configuration
pub(crate) fn warn_strips(group: Group, tag: u16, reason: &str) {
    warn!("Directory {group}, entry {tag:#06x}: {reason}");
}
