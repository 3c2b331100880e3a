//! Offsets entries with an attached contiguous data area

use std::io::Write;

use crate::error::Result;
use crate::io::IoSink;
use crate::types::{ByteOrder, ByteView, Group, TiffType};
use crate::value::Value;

use super::entry::{warn_strips, write_offset, EntryData};
use super::Node;

/// An offsets entry (e.g. `JPEGInterchangeFormat`) whose value points
/// into an external data area, paired with a sibling size entry
///
/// The referenced bytes are carried along as one contiguous data area and
/// rewritten to fresh offsets on serialization.
#[derive(Debug, Clone)]
pub struct DataEntry {
    pub(crate) common: EntryData,
    /// Tag of the paired size entry
    pub(crate) sz_tag: u16,
    /// Group of the paired size entry
    pub(crate) sz_group: Group,
}

impl DataEntry {
    /// Create a data entry paired with the size entry `(sz_tag, sz_group)`
    pub fn new(tag: u16, group: Group, sz_tag: u16, sz_group: Group) -> Self {
        DataEntry {
            common: EntryData::new(tag, group, TiffType::Long),
            sz_tag,
            sz_group,
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

    /// The attached data area, if validation succeeded
    pub fn data_area(&self) -> Option<&ByteView> {
        self.common.data_area.as_ref()
    }

    /// Validate the offset/size pair against the source buffer and attach
    /// the referenced bytes as this entry's data area.
    ///
    /// `size_value` is the value of the paired size entry, `data` the
    /// source buffer the original offsets point into, and `base_offset`
    /// the bias to add to each original offset. The strips must be
    /// contiguous and fully inside the buffer; on any violation a
    /// diagnostic is logged and the data area stays unset, which
    /// serializes as zero data bytes.
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
        if value.count() == 0 {
            warn_strips(
                self.common.group,
                self.common.tag,
                "Data offset entry value is empty, ignoring it.",
            );
            return;
        }
        if value.count() != size_value.count() {
            warn_strips(
                self.common.group,
                self.common.tag,
                "Size and data offset entries have different number of components, ignoring them.",
            );
            return;
        }
        let mut size = 0u64;
        for i in 0..size_value.count() {
            size += size_value.to_u32(i).unwrap_or(0) as u64;
        }
        let offset = value.to_u32(0).unwrap_or(0) as u64;
        let last = value.count() - 1;
        // The rewriter assumes one contiguous run:
        // last offset + last size - first offset == total size
        let last_end =
            value.to_u32(last).unwrap_or(0) as u64 + size_value.to_u32(last).unwrap_or(0) as u64;
        if last_end.checked_sub(offset) != Some(size) {
            warn_strips(
                self.common.group,
                self.common.tag,
                "Data area is not contiguous, ignoring it.",
            );
            return;
        }
        let buf_len = data.len() as u64;
        if offset > buf_len
            || size > buf_len
            || base_offset as u64 + offset > buf_len - size
        {
            warn_strips(
                self.common.group,
                self.common.tag,
                "Data area exceeds data buffer, ignoring it.",
            );
            return;
        }
        self.common.data_area =
            Some(data.slice((base_offset as u64 + offset) as usize, size as usize));
    }

    /// Emit the value as fresh absolute offsets into the just-laid-out
    /// data area, preserving the relative spacing of the original offsets
    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        data_idx: u32,
    ) -> Result<usize> {
        let value = match &self.common.value {
            Some(v) if v.count() > 0 => v,
            _ => return Ok(0),
        };
        let mut buf = vec![0u8; value.size()];
        let mut pos = 0;
        let prev_offset = value.to_i64(0).unwrap_or(0);
        for i in 0..self.common.count {
            let new_data_idx = value.to_i64(i).unwrap_or(0) - prev_offset + data_idx as i64;
            pos += write_offset(
                &mut buf[pos..],
                offset + new_data_idx,
                self.common.tiff_type,
                byte_order,
            )?;
        }
        sink.write(&buf)
    }

    /// Emit the attached data area, word aligned
    pub(crate) fn write_data<W: Write>(&self, sink: &mut IoSink<W>) -> Result<usize> {
        if self.common.value.is_none() {
            return Ok(0);
        }
        let mut len = 0;
        if let Some(area) = &self.common.data_area {
            len = sink.write(area.as_slice())?;
        }
        if len & 1 == 1 {
            sink.put(0)?;
            len += 1;
        }
        Ok(len)
    }
}

impl Node for DataEntry {
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

    fn size_data(&self) -> usize {
        self.common
            .data_area
            .as_ref()
            .map(|a| a.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_offsets(offsets: Vec<u32>) -> DataEntry {
        let mut entry = DataEntry::new(0x0201, Group::Ifd1, 0x0202, Group::Ifd1);
        entry
            .common_mut()
            .update_value(Value::Long(offsets), ByteOrder::Little);
        entry
    }

    #[test]
    fn test_set_strips_contiguous() {
        let mut entry = entry_with_offsets(vec![10, 30]);
        let sizes = Value::Long(vec![20, 15]);
        let data = ByteView::from_vec((0u8..60).collect());
        entry.set_strips(&sizes, &data, 0);
        let area = entry.data_area().expect("data area attached");
        assert_eq!(area.len(), 35);
        assert_eq!(area.as_slice()[0], 10);
    }

    #[test]
    fn test_set_strips_rejects_gap() {
        let mut entry = entry_with_offsets(vec![10, 40]);
        let sizes = Value::Long(vec![20, 15]);
        let data = ByteView::from_vec(vec![0; 100]);
        entry.set_strips(&sizes, &data, 0);
        assert!(entry.data_area().is_none());
    }

    #[test]
    fn test_set_strips_rejects_count_mismatch() {
        let mut entry = entry_with_offsets(vec![10, 30]);
        let sizes = Value::Long(vec![20]);
        let data = ByteView::from_vec(vec![0; 100]);
        entry.set_strips(&sizes, &data, 0);
        assert!(entry.data_area().is_none());
    }

    #[test]
    fn test_set_strips_rejects_out_of_bounds() {
        let mut entry = entry_with_offsets(vec![10]);
        let sizes = Value::Long(vec![200]);
        let data = ByteView::from_vec(vec![0; 100]);
        entry.set_strips(&sizes, &data, 0);
        assert!(entry.data_area().is_none());
    }

    #[test]
    fn test_write_rebases_offsets() {
        // Original offsets 100, 200, 250; at write time the data area
        // starts at data_idx 40 with directory offset 0.
        let mut entry = entry_with_offsets(vec![100, 200, 250]);
        let mut sink = IoSink::plain(Vec::new());
        entry.write(&mut sink, ByteOrder::Little, 0, 40).unwrap();
        let out = sink.into_inner();
        assert_eq!(out.len(), 12);
        let read = |i: usize| u32::from_le_bytes(out[i..i + 4].try_into().unwrap());
        assert_eq!(read(0), 40);
        assert_eq!(read(4), 140);
        assert_eq!(read(8), 190);
    }

    #[test]
    fn test_write_data_pads_to_word_boundary() {
        let mut entry = entry_with_offsets(vec![0]);
        let sizes = Value::Long(vec![3]);
        let data = ByteView::from_vec(vec![7, 8, 9]);
        entry.set_strips(&sizes, &data, 0);
        let mut sink = IoSink::plain(Vec::new());
        let n = entry.write_data(&mut sink).unwrap();
        assert_eq!(n, 4);
        assert_eq!(sink.into_inner(), vec![7, 8, 9, 0]);
    }
}
