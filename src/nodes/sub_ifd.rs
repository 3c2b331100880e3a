//! Sub-IFD entries

use std::io::Write;

use log::warn;

use crate::error::Result;
use crate::io::IoSink;
use crate::types::{ByteOrder, Group, TiffType};

use super::entry::{write_offset, EntryData};
use super::{Directory, Node, TiffNode, IDX_UNSET};

/// An entry of type LONG whose values are offsets to one or more child
/// directories (e.g. the Exif pointer or the `SubIFDs` tag)
#[derive(Debug)]
pub struct SubIfdEntry {
    pub(crate) common: EntryData,
    /// Group of newly created child directories
    pub(crate) new_group: Group,
    /// The child directories, in insertion order until serialized
    pub(crate) ifds: Vec<TiffNode>,
}

impl SubIfdEntry {
    /// Create a sub-IFD entry whose children default to `new_group`
    pub fn new(tag: u16, group: Group, new_group: Group) -> Self {
        SubIfdEntry {
            common: EntryData::new(tag, group, TiffType::Long),
            new_group,
            ifds: Vec::new(),
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

    /// Group of newly created child directories
    pub fn new_group(&self) -> Group {
        self.new_group
    }

    /// The child directories
    pub fn ifds(&self) -> &[TiffNode] {
        &self.ifds
    }

    /// Whether the entry has no child directories yet
    pub fn is_empty(&self) -> bool {
        self.ifds.is_empty()
    }

    /// Attach a child directory; non-directory nodes are refused
    pub fn add_child(&mut self, node: TiffNode) -> Option<&mut TiffNode> {
        if !matches!(node, TiffNode::Directory(_)) {
            warn!(
                "Directory {}, entry {:#06x}: sub-IFD child must be a directory",
                self.common.group, self.common.tag
            );
            return None;
        }
        self.ifds.push(node);
        self.common.count = self.ifds.len();
        self.ifds.last_mut()
    }

    /// Continue a descent path into the child directory whose group the
    /// next path item names, creating it if missing
    pub(crate) fn add_path_sub(
        &mut self,
        tag: u16,
        path: &mut crate::path::TiffPath,
        object: Option<TiffNode>,
    ) -> Option<&mut TiffNode> {
        let tpi1 = path.peek(0)?;
        let tpi2 = path.peek(1)?;
        let pos = self
            .ifds
            .iter()
            .position(|ifd| ifd.group() == tpi2.group());
        let pos = match pos {
            Some(p) => p,
            None => {
                self.ifds
                    .push(TiffNode::Directory(Directory::new(tpi1.tag(), tpi2.group())));
                self.common.count = self.ifds.len();
                self.ifds.len() - 1
            }
        };
        self.ifds[pos].add_path(tag, path, object)
    }

    /// Emit one rebased offset per child directory.
    ///
    /// Children are sorted by group first, which matters when image data
    /// tags were copied into the tree before the directories existed.
    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        mut data_idx: u32,
    ) -> Result<usize> {
        self.ifds.sort_by(|a, b| a.group().cmp(&b.group()));
        let mut buf = vec![0u8; self.ifds.len() * 4];
        let mut pos = 0;
        for ifd in &self.ifds {
            pos += write_offset(
                &mut buf[pos..],
                offset + data_idx as i64,
                self.common.tiff_type,
                byte_order,
            )?;
            data_idx += ifd.size() as u32;
        }
        sink.write(&buf)
    }

    /// Serialize the child directories into the data area
    pub(crate) fn write_data<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        let mut len = 0;
        for ifd in &mut self.ifds {
            len += ifd.write(
                sink,
                byte_order,
                offset + data_idx as i64 + len as i64,
                IDX_UNSET,
                IDX_UNSET,
                image_idx,
            )?;
        }
        if len & 1 == 1 {
            sink.put(0)?;
            len += 1;
        }
        Ok(len)
    }

    /// Emit the image strips of all child directories
    pub(crate) fn write_image<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        let mut len = 0;
        for ifd in &self.ifds {
            len += ifd.write_image(sink, byte_order)?;
        }
        Ok(len)
    }
}

impl Node for SubIfdEntry {
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
        self.ifds.len() * 4
    }

    fn size_data(&self) -> usize {
        self.ifds.iter().map(|ifd| ifd.size()).sum()
    }

    fn size_image(&self) -> usize {
        self.ifds.iter().map(|ifd| ifd.size_image()).sum()
    }
}
