//! The polymorphic TIFF node model
//!
//! A metadata tree is built from one node kind with ten variants, each
//! with its own serialization contract. The shared behavior lives in the
//! [`Node`] trait; operations that recurse through the tree (path
//! building, visiting, the three serialization phases) are dispatched on
//! the [`TiffNode`] sum itself.

use std::cmp::Ordering;
use std::fmt;
use std::io::Write;

use crate::error::{Result, TiffError};
use crate::io::IoSink;
use crate::path::TiffPath;
use crate::registry;
use crate::types::{ByteOrder, Group, TiffType};
use crate::visitor::{Phase, TiffVisitor};

pub mod binary_array;
pub mod data_entry;
pub mod directory;
pub mod entry;
pub mod image_entry;
pub mod makernote;
pub mod sub_ifd;

pub use binary_array::{
    sony_tag_cipher, ArrayCfg, ArrayDef, ArraySet, BinaryArray, BinaryElement, CfgSelFct, CryptFct,
};
pub use data_entry::DataEntry;
pub use directory::Directory;
pub use entry::{Entry, EntryData, SizeEntry};
pub use image_entry::ImageEntry;
pub use makernote::{IfdMakernote, MnEntry, MnHeader};
pub use sub_ifd::SubIfdEntry;

/// Sentinel for the image-area index marking the root serialization call
pub(crate) const IDX_UNSET: u32 = u32::MAX;

/// Behavior shared by every node kind
pub trait Node {
    /// The node's 16-bit tag
    fn tag(&self) -> u16;

    /// The namespace the node lives in
    fn group(&self) -> Group;

    /// Insertion counter, a stable tiebreaker when sorting by tag
    fn idx(&self) -> u32 {
        0
    }

    /// Semantic component count as recorded in the directory entry
    fn count(&self) -> usize;

    /// On-wire size of the node's value area, padding included
    fn size(&self) -> usize;

    /// Ancillary bytes the node contributes to the directory's data area
    fn size_data(&self) -> usize {
        0
    }

    /// Image bytes the node contributes to the global image area
    fn size_image(&self) -> usize {
        0
    }
}

/// A node of the TIFF composite tree
#[derive(Debug)]
pub enum TiffNode {
    /// A normal IFD tag with a value
    Entry(Entry),
    /// An offsets entry with an attached contiguous data area
    DataEntry(DataEntry),
    /// An offsets entry referring to image strips
    ImageEntry(ImageEntry),
    /// The size counterpart of a data entry
    SizeEntry(SizeEntry),
    /// An entry pointing to one or more child directories
    SubIfd(SubIfdEntry),
    /// The maker-note entry
    MnEntry(MnEntry),
    /// An IFD
    Directory(Directory),
    /// A maker-note with a vendor header and embedded IFD
    Makernote(IfdMakernote),
    /// A packed byte run interpreted as a virtual IFD
    BinaryArray(BinaryArray),
    /// One virtual tag inside a binary array
    BinaryElement(BinaryElement),
}

/// Order nodes by tag, using the insertion index as tiebreaker
pub(crate) fn cmp_tag(a: &TiffNode, b: &TiffNode) -> Ordering {
    a.tag().cmp(&b.tag()).then(a.idx().cmp(&b.idx()))
}

impl TiffNode {
    /// The node viewed through the shared behavior trait
    pub fn as_node(&self) -> &dyn Node {
        match self {
            TiffNode::Entry(n) => n,
            TiffNode::DataEntry(n) => n,
            TiffNode::ImageEntry(n) => n,
            TiffNode::SizeEntry(n) => n,
            TiffNode::SubIfd(n) => n,
            TiffNode::MnEntry(n) => n,
            TiffNode::Directory(n) => n,
            TiffNode::Makernote(n) => n,
            TiffNode::BinaryArray(n) => n,
            TiffNode::BinaryElement(n) => n,
        }
    }

    /// The node's tag
    pub fn tag(&self) -> u16 {
        self.as_node().tag()
    }

    /// The node's group
    pub fn group(&self) -> Group {
        self.as_node().group()
    }

    /// The node's insertion index
    pub fn idx(&self) -> u32 {
        self.as_node().idx()
    }

    /// Semantic component count
    pub fn count(&self) -> usize {
        self.as_node().count()
    }

    /// On-wire size of the value area
    pub fn size(&self) -> usize {
        self.as_node().size()
    }

    /// Contribution to the enclosing directory's data area
    pub fn size_data(&self) -> usize {
        self.as_node().size_data()
    }

    /// Contribution to the global image area
    pub fn size_image(&self) -> usize {
        self.as_node().size_image()
    }

    /// The wire type, for nodes that appear as directory entries
    pub fn tiff_type(&self) -> Option<TiffType> {
        self.entry_data().map(|e| e.tiff_type)
    }

    /// Shared entry data, for entry-like nodes
    pub fn entry_data(&self) -> Option<&EntryData> {
        match self {
            TiffNode::Entry(n) => Some(&n.common),
            TiffNode::DataEntry(n) => Some(&n.common),
            TiffNode::ImageEntry(n) => Some(&n.common),
            TiffNode::SizeEntry(n) => Some(&n.common),
            TiffNode::SubIfd(n) => Some(&n.common),
            TiffNode::MnEntry(n) => Some(&n.common),
            TiffNode::BinaryArray(n) => Some(&n.common),
            TiffNode::BinaryElement(n) => Some(&n.common),
            TiffNode::Directory(_) | TiffNode::Makernote(_) => None,
        }
    }

    /// Shared entry data, mutable
    pub fn entry_data_mut(&mut self) -> Option<&mut EntryData> {
        match self {
            TiffNode::Entry(n) => Some(&mut n.common),
            TiffNode::DataEntry(n) => Some(&mut n.common),
            TiffNode::ImageEntry(n) => Some(&mut n.common),
            TiffNode::SizeEntry(n) => Some(&mut n.common),
            TiffNode::SubIfd(n) => Some(&mut n.common),
            TiffNode::MnEntry(n) => Some(&mut n.common),
            TiffNode::BinaryArray(n) => Some(&mut n.common),
            TiffNode::BinaryElement(n) => Some(&mut n.common),
            TiffNode::Directory(_) | TiffNode::Makernote(_) => None,
        }
    }

    /// Record the absolute offset assigned to the node's value
    pub(crate) fn set_write_offset(&mut self, offset: i64) {
        if let Some(entry) = self.entry_data_mut() {
            entry.offset = offset;
        }
    }

    /// Deep copy of the node.
    ///
    /// Values are cloned; raw byte views share their backing buffer.
    /// Container kinds clone their own identity but not their children,
    /// and the maker-note kinds cannot be cloned at all.
    pub fn try_clone(&self) -> Result<TiffNode> {
        match self {
            TiffNode::Entry(n) => Ok(TiffNode::Entry(n.clone())),
            TiffNode::DataEntry(n) => Ok(TiffNode::DataEntry(n.clone())),
            TiffNode::ImageEntry(n) => Ok(TiffNode::ImageEntry(n.clone())),
            TiffNode::SizeEntry(n) => Ok(TiffNode::SizeEntry(n.clone())),
            TiffNode::BinaryElement(n) => Ok(TiffNode::BinaryElement(n.clone())),
            TiffNode::Directory(n) => {
                let mut copy = Directory::new(n.tag, n.group);
                copy.has_next = n.has_next;
                Ok(TiffNode::Directory(copy))
            }
            TiffNode::SubIfd(n) => Ok(TiffNode::SubIfd(SubIfdEntry {
                common: n.common.clone(),
                new_group: n.new_group,
                ifds: Vec::new(),
            })),
            TiffNode::BinaryArray(n) => Ok(TiffNode::BinaryArray(n.clone_config())),
            TiffNode::MnEntry(_) => Err(TiffError::CloneNotSupported("MnEntry")),
            TiffNode::Makernote(_) => Err(TiffError::CloneNotSupported("IfdMakernote")),
        }
    }

    /// Walk a descent path from this node, creating missing nodes along
    /// the way; returns the node at the end of the path, or `None` when
    /// nothing was added (e.g. a path that would leave a dangling,
    /// childless sub-IFD).
    ///
    /// `object`, if given, becomes the terminal node instead of a
    /// registry-created one.
    pub fn add_path(
        &mut self,
        tag: u16,
        path: &mut TiffPath,
        object: Option<TiffNode>,
    ) -> Option<&mut TiffNode> {
        match self {
            // Leaf kinds terminate the walk on themselves
            TiffNode::Entry(_)
            | TiffNode::DataEntry(_)
            | TiffNode::ImageEntry(_)
            | TiffNode::SizeEntry(_)
            | TiffNode::BinaryElement(_) => return Some(self),
            // These terminate when their own item is the last one left
            TiffNode::MnEntry(_) | TiffNode::SubIfd(_) | TiffNode::BinaryArray(_)
                if path.len() <= 1 =>
            {
                return Some(self)
            }
            _ => {}
        }
        match self {
            TiffNode::Directory(dir) => dir.add_path_dir(tag, path, object),
            TiffNode::Makernote(mn) => mn.ifd.add_path_dir(tag, path, object),
            TiffNode::SubIfd(sub) => sub.add_path_sub(tag, path, object),
            TiffNode::MnEntry(entry) => entry.add_path_mn(tag, path, object),
            TiffNode::BinaryArray(array) => array.add_path_array(tag, path, object),
            _ => None,
        }
    }

    /// Attach a child node, where the variant supports children
    pub fn add_child(&mut self, node: TiffNode) -> Option<&mut TiffNode> {
        match self {
            TiffNode::Directory(dir) => Some(dir.add_child(node)),
            TiffNode::SubIfd(sub) => sub.add_child(node),
            TiffNode::MnEntry(entry) => match &mut entry.mn {
                Some(mn) => mn.add_child(node),
                None => None,
            },
            TiffNode::Makernote(mn) => Some(mn.ifd.add_child(node)),
            TiffNode::BinaryArray(array) => Some(array.add_child(node)),
            _ => None,
        }
    }

    /// Attach a next IFD, where the variant supports a next pointer
    pub fn add_next(&mut self, node: TiffNode) -> Option<&mut TiffNode> {
        match self {
            TiffNode::Directory(dir) => dir.add_next(node),
            TiffNode::MnEntry(entry) => match &mut entry.mn {
                Some(mn) => mn.add_next(node),
                None => None,
            },
            TiffNode::Makernote(mn) => mn.ifd.add_next(node),
            _ => None,
        }
    }

    /// Visit this node and its subtree in document order
    pub fn accept(&mut self, visitor: &mut dyn TiffVisitor) {
        if !visitor.go(Phase::TRAVERSE) {
            return;
        }
        match self {
            TiffNode::Entry(n) => visitor.visit_entry(n),
            TiffNode::DataEntry(n) => visitor.visit_data_entry(n),
            TiffNode::ImageEntry(n) => visitor.visit_image_entry(n),
            TiffNode::SizeEntry(n) => visitor.visit_size_entry(n),
            TiffNode::Directory(n) => n.accept(visitor),
            TiffNode::SubIfd(n) => {
                visitor.visit_sub_ifd(n);
                for ifd in &mut n.ifds {
                    if !visitor.go(Phase::TRAVERSE) {
                        break;
                    }
                    ifd.accept(visitor);
                }
            }
            TiffNode::MnEntry(n) => n.accept(visitor),
            TiffNode::Makernote(n) => n.accept(visitor),
            TiffNode::BinaryArray(n) => n.accept(visitor),
            TiffNode::BinaryElement(n) => visitor.visit_binary_element(n),
        }
    }

    /// Serialize this node's value area.
    ///
    /// `offset` is the absolute position of the enclosing directory,
    /// `value_idx` and `data_idx` the relative positions of the value and
    /// data areas, and `image_idx` the running absolute position of the
    /// global image area.
    pub fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        value_idx: u32,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        match self {
            TiffNode::Entry(n) => n.write(sink, byte_order),
            TiffNode::SizeEntry(n) => n.write(sink, byte_order),
            TiffNode::BinaryElement(n) => n.write(sink, byte_order),
            TiffNode::DataEntry(n) => n.write(sink, byte_order, offset, data_idx),
            TiffNode::ImageEntry(n) => n.write(sink, byte_order, offset, data_idx, image_idx),
            TiffNode::SubIfd(n) => n.write(sink, byte_order, offset, data_idx),
            TiffNode::MnEntry(n) => n.write(sink, byte_order, offset, value_idx, image_idx),
            TiffNode::Directory(n) => n.write(sink, byte_order, offset, image_idx),
            TiffNode::Makernote(n) => n.write(sink, byte_order, offset, image_idx),
            TiffNode::BinaryArray(n) => {
                n.write(sink, byte_order, offset, value_idx, data_idx, image_idx)
            }
        }
    }

    /// Serialize this node's contribution to the data area
    pub fn write_data<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        data_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        match self {
            TiffNode::Directory(n) => n.write_data(sink, byte_order, offset, data_idx, image_idx),
            TiffNode::DataEntry(n) => n.write_data(sink),
            TiffNode::ImageEntry(n) => n.write_data(sink, byte_order),
            TiffNode::SubIfd(n) => n.write_data(sink, byte_order, offset, data_idx, image_idx),
            _ => Ok(0),
        }
    }

    /// Serialize this node's contribution to the image area
    pub fn write_image<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        match self {
            TiffNode::Directory(n) => n.write_image(sink, byte_order),
            TiffNode::SubIfd(n) => n.write_image(sink, byte_order),
            TiffNode::Makernote(n) => n.write_image(sink, byte_order),
            TiffNode::ImageEntry(n) => n.write_image(sink, byte_order),
            _ => Ok(0),
        }
    }

    /// Serialize a whole tree rooted at this node, starting at absolute
    /// stream position `offset`
    pub fn write_tree<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: u32,
    ) -> Result<usize> {
        let mut image_idx = IDX_UNSET;
        self.write(
            sink,
            byte_order,
            offset as i64,
            IDX_UNSET,
            IDX_UNSET,
            &mut image_idx,
        )
    }

    /// Walk a path starting from a root node, creating missing levels.
    ///
    /// Convenience wrapper that builds the descent with
    /// [`registry::path_for`] and returns the terminal node.
    pub fn add(&mut self, ext_tag: u32, group: Group) -> Option<&mut TiffNode> {
        let mut path = registry::path_for(ext_tag, group);
        self.add_path((ext_tag & 0xFFFF) as u16, &mut path, None)
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = depth * 2;
        match self {
            TiffNode::Directory(dir) => {
                writeln!(f, "{:pad$}{} directory, {} entries", "", dir.group(), dir.count())?;
                for child in &dir.children {
                    child.fmt_tree(f, depth + 1)?;
                }
                if let Some(next) = &dir.next {
                    next.fmt_tree(f, depth)?;
                }
                Ok(())
            }
            TiffNode::SubIfd(sub) => {
                writeln!(
                    f,
                    "{:pad$}{} entry {:#06x}, {} sub-IFDs",
                    "",
                    sub.group(),
                    sub.tag(),
                    sub.ifds.len()
                )?;
                for ifd in &sub.ifds {
                    ifd.fmt_tree(f, depth + 1)?;
                }
                Ok(())
            }
            TiffNode::MnEntry(entry) => {
                writeln!(
                    f,
                    "{:pad$}{} entry {:#06x}, maker-note",
                    "",
                    entry.group(),
                    entry.tag()
                )?;
                if let Some(mn) = &entry.mn {
                    mn.fmt_tree(f, depth + 1)?;
                }
                Ok(())
            }
            TiffNode::Makernote(mn) => {
                writeln!(
                    f,
                    "{:pad$}{} maker-note, {}-byte header",
                    "",
                    mn.ifd.group(),
                    mn.header_size()
                )?;
                for child in &mn.ifd.children {
                    child.fmt_tree(f, depth + 1)?;
                }
                Ok(())
            }
            TiffNode::BinaryArray(array) => {
                writeln!(
                    f,
                    "{:pad$}{} array {:#06x}, {} elements",
                    "",
                    array.group(),
                    array.tag(),
                    array.elements.len()
                )?;
                for element in &array.elements {
                    element.fmt_tree(f, depth + 1)?;
                }
                Ok(())
            }
            other => writeln!(
                f,
                "{:pad$}{} entry {:#06x}, count {}",
                "",
                other.group(),
                other.tag(),
                other.count()
            ),
        }
    }
}

impl fmt::Display for TiffNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_not_supported_for_makernote_kinds() {
        let node = TiffNode::MnEntry(MnEntry::new(0x927C, Group::Exif, Group::Mn));
        assert!(matches!(
            node.try_clone(),
            Err(TiffError::CloneNotSupported("MnEntry"))
        ));
    }

    #[test]
    fn test_directory_clone_drops_children() {
        let mut dir = Directory::new(0, Group::Ifd0);
        dir.add_child(TiffNode::Entry(Entry::new(0x0100, Group::Ifd0)));
        let copy = TiffNode::Directory(dir).try_clone().unwrap();
        match copy {
            TiffNode::Directory(d) => assert_eq!(d.count(), 0),
            _ => panic!("clone changed the node kind"),
        }
    }

    #[test]
    fn test_display_tree() {
        let mut root = registry::create(crate::path::TAG_ROOT, Group::Ifd0);
        let _ = root.add(0x010F, Group::Ifd0);
        let dump = root.to_string();
        assert!(dump.contains("Ifd0 directory, 1 entries"));
        assert!(dump.contains("0x010f"));
    }

    #[test]
    fn test_cmp_tag_uses_idx_as_tiebreaker() {
        let mut a = Entry::new(0x0100, Group::Ifd0);
        a.common_mut().set_idx(2);
        let mut b = Entry::new(0x0100, Group::Ifd0);
        b.common_mut().set_idx(1);
        let (a, b) = (TiffNode::Entry(a), TiffNode::Entry(b));
        assert_eq!(cmp_tag(&a, &b), Ordering::Greater);
    }
}
