//! IFD directories and the three-pass serializer

use std::io::Write;

use log::error;

use crate::error::{Result, TiffError};
use crate::io::{IoSink, OffsetTarget};
use crate::path::{TiffPath, TAG_NEXT};
use crate::registry;
use crate::types::{word_align, ByteOrder, Group};
use crate::visitor::{Phase, TiffVisitor};

use super::{cmp_tag, Node, TiffNode, IDX_UNSET};

/// An IFD: an ordered collection of child nodes with an optional pointer
/// to a next IFD
///
/// Serialization lays the directory out in the TIFF-mandated order:
/// the entry records, the oversize values, the ancillary data area, the
/// next-IFD chain and, for the root directory, the global image area.
/// All offsets are computed up front from the planned sizes, so a
/// mismatch between plan and emission is detected immediately.
#[derive(Debug)]
pub struct Directory {
    pub(crate) tag: u16,
    pub(crate) group: Group,
    pub(crate) has_next: bool,
    pub(crate) children: Vec<TiffNode>,
    pub(crate) next: Option<Box<TiffNode>>,
}

impl Directory {
    /// Create a directory with a next-IFD pointer field
    pub fn new(tag: u16, group: Group) -> Self {
        Directory {
            tag,
            group,
            has_next: true,
            children: Vec::new(),
            next: None,
        }
    }

    /// Create a directory without a next-IFD pointer field, as used by
    /// several maker-notes
    pub fn new_no_next(tag: u16, group: Group) -> Self {
        Directory {
            has_next: false,
            ..Directory::new(tag, group)
        }
    }

    /// Whether the directory carries a next-IFD pointer field
    pub fn has_next(&self) -> bool {
        self.has_next
    }

    /// The child nodes
    pub fn children(&self) -> &[TiffNode] {
        &self.children
    }

    /// The chained next IFD, if any
    pub fn next_ifd(&self) -> Option<&TiffNode> {
        self.next.as_deref()
    }

    /// Find a child by tag and group
    pub fn find_child(&self, tag: u16, group: Group) -> Option<&TiffNode> {
        self.children
            .iter()
            .find(|c| c.tag() == tag && c.group() == group)
    }

    /// Append a child node
    pub fn add_child(&mut self, node: TiffNode) -> &mut TiffNode {
        self.children.push(node);
        // Just pushed, cannot fail
        self.children.last_mut().unwrap()
    }

    /// Attach the next IFD; refused when the directory has no next-IFD
    /// pointer field
    pub fn add_next(&mut self, node: TiffNode) -> Option<&mut TiffNode> {
        if !self.has_next {
            return None;
        }
        self.next = Some(Box::new(node));
        self.next.as_deref_mut()
    }

    /// Walk a descent path, creating missing nodes, and return the node
    /// at the path's end
    pub(crate) fn add_path_dir(
        &mut self,
        tag: u16,
        path: &mut TiffPath,
        mut object: Option<TiffNode>,
    ) -> Option<&mut TiffNode> {
        path.pop();
        let tpi = path.top()?;
        let is_mn_addr = tpi.ext_tag() == 0x927C && tpi.group() == Group::Exif;
        let use_next = tpi.ext_tag() == TAG_NEXT;

        // Reuse an existing node if there is still at least one composite
        // item on the stack, or the item addresses the maker-note entry.
        // This prevents duplicate entries; sub-IFDs are covered by the
        // len > 1 condition.
        let mut child_pos = None;
        let mut reuse_next = false;
        if path.len() > 1 || is_mn_addr {
            if use_next {
                reuse_next = self.next.is_some();
            } else {
                child_pos = self
                    .children
                    .iter()
                    .position(|c| c.tag() == tpi.tag() && c.group() == tpi.group());
            }
        }
        if !reuse_next && child_pos.is_none() {
            let node = match object.take() {
                Some(obj) if path.len() == 1 => obj,
                other => {
                    object = other;
                    registry::create(tpi.ext_tag(), tpi.group())
                }
            };
            // A sub-IFD entry without children must not be left dangling
            if path.len() == 1 {
                if let TiffNode::SubIfd(sub) = &node {
                    if sub.is_empty() {
                        return None;
                    }
                }
            }
            if use_next {
                if !self.has_next {
                    return None;
                }
                self.next = Some(Box::new(node));
                reuse_next = true;
            } else {
                self.children.push(node);
                child_pos = Some(self.children.len() - 1);
            }
        }
        let child = if reuse_next {
            self.next.as_deref_mut()?
        } else {
            &mut self.children[child_pos?]
        };
        child.add_path(tag, path, object)
    }

    /// Visit this directory, its children, and the next-IFD chain
    pub fn accept(&mut self, visitor: &mut dyn TiffVisitor) {
        visitor.visit_directory(self);
        for child in &mut self.children {
            if !visitor.go(Phase::TRAVERSE) {
                break;
            }
            child.accept(visitor);
        }
        if visitor.go(Phase::TRAVERSE) {
            visitor.visit_directory_next(self);
        }
        if let Some(next) = &mut self.next {
            next.accept(visitor);
        }
        if visitor.go(Phase::TRAVERSE) {
            visitor.visit_directory_end(self);
        }
    }

    /// Serialize the directory at absolute stream position `offset`.
    ///
    /// `image_idx` carries the running position of the global image area;
    /// the sentinel value marks this directory as the root, which is the
    /// only level that lays out the image area.
    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        image_idx: &mut u32,
    ) -> Result<usize> {
        let is_root_dir = *image_idx == IDX_UNSET;

        let comp_count = self.children.len();
        if comp_count > 0xFFFF {
            return Err(TiffError::TooManyDirEntries {
                group: self.group,
                count: comp_count,
            });
        }

        let size_next = self.next.as_ref().map(|n| n.size()).unwrap_or(0);

        // Nothing to do if there are no entries and the next IFD is empty
        if comp_count == 0 && size_next == 0 {
            return Ok(0);
        }

        // Remember the position of the CR2 RAW IFD for the caller
        if is_root_dir && self.group == Group::Ifd3 {
            sink.set_target(OffsetTarget::Cr2RawIfd, offset as u64)?;
        }

        // Size of the entry records alone, without values and data
        let size_dir = 2 + 12 * comp_count + if self.has_next { 4 } else { 0 };

        // TIFF requires entries sorted in ascending tag order. Maker-note
        // directories are not sorted; leaving them alone sometimes
        // preserves them better.
        if !self.group.is_makernote() {
            self.children.sort_by(cmp_tag);
        }

        // Planned size of the values and, for the root, the data areas
        let mut size_value = 0usize;
        let mut size_data = 0usize;
        for child in &self.children {
            let sv = child.size();
            if sv > 4 {
                size_value += word_align(sv);
            }
            if is_root_dir {
                size_data += word_align(child.size_data());
            }
        }

        let mut idx = 0usize;
        let mut value_idx = size_dir as u32;
        let mut data_idx = (size_dir + size_value) as u32;
        if is_root_dir {
            *image_idx =
                (offset as u64 + data_idx as u64 + size_data as u64 + size_next as u64) as u32;
            *image_idx += *image_idx & 1;
        }

        // 1st pass: the IFD record. a) number of entries
        let mut buf = [0u8; 4];
        byte_order.put_u16(&mut buf, comp_count as u16);
        sink.write(&buf[..2])?;
        idx += 2;
        // b) the entry records, with inline values or value offsets
        for i in 0..self.children.len() {
            idx += self.write_dir_entry(sink, byte_order, offset, i, value_idx, data_idx, image_idx)?;
            let sv = self.children[i].size();
            if sv > 4 {
                value_idx += word_align(sv) as u32;
            }
            data_idx += word_align(self.children[i].size_data()) as u32;
        }
        // c) pointer to the next IFD
        if self.has_next {
            buf.fill(0);
            if size_next > 0 {
                byte_order.put_u32(&mut buf, (offset + data_idx as i64) as u32);
            }
            sink.write(&buf)?;
            idx += 4;
        }

        // 2nd pass: the oversize values, which may point into the data area
        value_idx = size_dir as u32;
        data_idx = (size_dir + size_value) as u32;
        for child in &mut self.children {
            let mut sv = child.size();
            if sv > 4 {
                let written = child.write(sink, byte_order, offset, value_idx, data_idx, image_idx)?;
                if written != sv {
                    return Err(TiffError::ImageWriteFailed {
                        group: child.group(),
                        tag: child.tag(),
                    });
                }
                if sv & 1 == 1 {
                    sink.put(0)?;
                    sv += 1;
                }
                idx += sv;
                value_idx += sv as u32;
            }
            data_idx += word_align(child.size_data()) as u32;
        }

        // 3rd pass: the data areas, which may hold offsets themselves
        data_idx = (size_dir + size_value) as u32;
        idx += self.write_data(sink, byte_order, offset, data_idx, image_idx)?;

        // 4th pass: the next-IFD chain
        if size_next > 0 {
            if let Some(next) = &mut self.next {
                idx += next.write(
                    sink,
                    byte_order,
                    offset + idx as i64,
                    IDX_UNSET,
                    IDX_UNSET,
                    image_idx,
                )?;
            }
        }

        // 5th, at the root level only: the global image area
        if is_root_dir {
            idx += self.write_image(sink, byte_order)?;
        }

        Ok(idx)
    }

    /// Emit one 12-byte directory entry for child `i`
    #[allow(clippy::too_many_arguments)]
    fn write_dir_entry<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        i: usize,
        value_idx: u32,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        let child = &mut self.children[i];
        let tiff_type = child.tiff_type().ok_or_else(|| {
            TiffError::InvalidStructure(format!(
                "node {:#06x} in {} cannot appear as a directory entry",
                child.tag(),
                child.group()
            ))
        })?;
        let mut buf = [0u8; 8];
        byte_order.put_u16(&mut buf[0..], child.tag());
        byte_order.put_u16(&mut buf[2..], tiff_type.code());
        byte_order.put_u32(&mut buf[4..], child.count() as u32);
        sink.write(&buf)?;
        if child.size() > 4 {
            let value_offset = offset + value_idx as i64;
            child.set_write_offset(value_offset);
            byte_order.put_u32(&mut buf[..4], value_offset as u32);
            sink.write(&buf[..4])?;
        } else {
            let len = child.write(sink, byte_order, offset, value_idx, data_idx, image_idx)?;
            if len > 4 {
                error!("unexpected inline value length {len} for entry {:#06x}", child.tag());
            }
            if len < 4 {
                let zeros = [0u8; 4];
                sink.write(&zeros[..4 - len])?;
            }
        }
        Ok(12)
    }

    /// Serialize the data areas of all children, in order
    pub(crate) fn write_data<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        let mut len = 0;
        for child in &mut self.children {
            len += child.write_data(sink, byte_order, offset, data_idx + len as u32, image_idx)?;
        }
        Ok(len)
    }

    /// Serialize the image areas of all children and the next-IFD chain.
    ///
    /// Sub-IFD image data is deliberately written after all other image
    /// data; cameras expect the main strips first.
    pub(crate) fn write_image<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        let mut len = 0;
        let mut sub_ifd: Option<&TiffNode> = None;
        for child in &self.children {
            if child.tag() == 0x014A {
                if sub_ifd.is_some() {
                    error!("multiple sub-IFD image data tags found");
                }
                sub_ifd = Some(child);
                continue;
            }
            len += child.write_image(sink, byte_order)?;
        }
        if let Some(child) = sub_ifd {
            len += child.write_image(sink, byte_order)?;
        }
        if let Some(next) = &self.next {
            len += next.write_image(sink, byte_order)?;
        }
        Ok(len)
    }
}

impl Node for Directory {
    fn tag(&self) -> u16 {
        self.tag
    }

    fn group(&self) -> Group {
        self.group
    }

    fn count(&self) -> usize {
        self.children.len()
    }

    fn size(&self) -> usize {
        let comp_count = self.children.len();
        let mut len = 2 + 12 * comp_count + if self.has_next { 4 } else { 0 };
        for child in &self.children {
            let sv = child.size();
            if sv > 4 {
                len += word_align(sv);
            }
            len += word_align(child.size_data());
        }
        let size_next = self.next.as_ref().map(|n| n.size()).unwrap_or(0);
        len += size_next;
        // An empty IFD with no next chain collapses to nothing
        if comp_count == 0 && size_next == 0 {
            len = 0;
        }
        len
    }

    fn size_image(&self) -> usize {
        let mut len: usize = self.children.iter().map(|c| c.size_image()).sum();
        if let Some(next) = &self.next {
            len += next.size_image();
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Entry;
    use crate::value::Value;

    #[test]
    fn test_empty_directory_has_zero_size() {
        let dir = Directory::new(0, Group::Ifd0);
        assert_eq!(dir.size(), 0);
    }

    #[test]
    fn test_size_counts_entries_and_next_pointer() {
        let mut dir = Directory::new(0, Group::Ifd0);
        let mut entry = Entry::new(0x010F, Group::Ifd0);
        entry
            .common_mut()
            .update_value(Value::ascii("X"), ByteOrder::Little);
        dir.add_child(TiffNode::Entry(entry));
        // 2 + 12 + 4; the 2-byte value is inlined
        assert_eq!(dir.size(), 18);
    }

    #[test]
    fn test_size_aligns_oversize_values() {
        let mut dir = Directory::new(0, Group::Ifd0);
        let mut entry = Entry::new(0x010E, Group::Ifd0);
        entry
            .common_mut()
            .update_value(Value::ascii("HelloWorld"), ByteOrder::Little);
        dir.add_child(TiffNode::Entry(entry));
        // 18 for the record plus 11 value bytes padded to 12
        assert_eq!(dir.size(), 30);
    }

    #[test]
    fn test_add_next_requires_pointer_field() {
        let mut dir = Directory::new_no_next(0, Group::Sony);
        assert!(dir
            .add_next(TiffNode::Directory(Directory::new(0, Group::Ifd1)))
            .is_none());
        let mut dir = Directory::new(0, Group::Ifd0);
        assert!(dir
            .add_next(TiffNode::Directory(Directory::new(0, Group::Ifd1)))
            .is_some());
    }
}
