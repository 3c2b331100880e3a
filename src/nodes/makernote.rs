//! Maker-note nodes and their header variants
//!
//! A maker-note is a manufacturer-private IFD embedded in the Exif
//! directory under tag 0x927C. Most vendors put a header in front of the
//! IFD, and several use their own byte order or measure the IFD's
//! internal offsets from a private base instead of the TIFF start. All of
//! that variance is captured by [`MnHeader`]; the tree code only asks for
//! the header size, the byte order and the base offset.

use std::io::Write;

use log::error;

use crate::error::Result;
use crate::io::IoSink;
use crate::types::{ByteOrder, Group, TiffType};
use crate::visitor::{Phase, TiffVisitor};

use super::entry::EntryData;
use super::{Directory, Node, TiffNode, IDX_UNSET};

/// Olympus type-2 maker-note prefix: signature, "II" marker, version
const OLYMPUS_SIG: [u8; 12] = *b"OLYMPUS\0II\x03\0";
/// Nikon type-3 prefix; a regular TIFF header follows
const NIKON_SIG: [u8; 10] = *b"Nikon\0\x02\x10\0\0";
/// Sony maker-note prefix
const SONY_SIG: [u8; 12] = *b"SONY DSC \0\0\0";

/// Vendor-specific header preceding a maker-note IFD
#[derive(Debug)]
pub enum MnHeader {
    /// Olympus type 2: 12-byte signature; IFD offsets are relative to
    /// the start of the maker-note
    Olympus,
    /// Nikon type 3: 10-byte signature followed by an embedded TIFF
    /// header carrying its own byte order; IFD offsets are relative to
    /// that embedded header
    Nikon {
        /// Byte order of the embedded TIFF structure
        byte_order: ByteOrder,
    },
    /// Sony: 12-byte signature; IFD offsets stay relative to the TIFF
    /// start and the IFD has no next pointer
    Sony,
}

impl MnHeader {
    /// Size of the header in bytes
    pub fn size(&self) -> usize {
        match self {
            MnHeader::Olympus => OLYMPUS_SIG.len(),
            // Signature plus the embedded TIFF header
            MnHeader::Nikon { .. } => NIKON_SIG.len() + 8,
            MnHeader::Sony => SONY_SIG.len(),
        }
    }

    /// Offset of the embedded IFD from the start of the maker-note
    pub fn ifd_offset(&self) -> usize {
        self.size()
    }

    /// The value subtracted from IFD-internal offsets on the wire.
    ///
    /// `mn_offset` is the absolute position of the maker-note.
    pub fn base_offset(&self, mn_offset: u32) -> u32 {
        match self {
            MnHeader::Olympus => mn_offset,
            MnHeader::Nikon { .. } => mn_offset + NIKON_SIG.len() as u32,
            MnHeader::Sony => 0,
        }
    }

    /// The header's own byte order; `Invalid` inherits the image order
    pub fn byte_order(&self) -> ByteOrder {
        match self {
            MnHeader::Nikon { byte_order } => *byte_order,
            _ => ByteOrder::Invalid,
        }
    }

    /// Set the byte order; only the Nikon header stores one
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        if let MnHeader::Nikon { byte_order } = self {
            *byte_order = order;
        }
    }

    /// Validate a header read from `bytes`; parses the embedded byte
    /// order where the variant has one
    pub fn read(&mut self, bytes: &[u8]) -> bool {
        match self {
            MnHeader::Olympus => {
                bytes.len() >= OLYMPUS_SIG.len() && bytes[..10] == OLYMPUS_SIG[..10]
            }
            MnHeader::Nikon { byte_order } => {
                if bytes.len() < NIKON_SIG.len() + 8 || bytes[..6] != NIKON_SIG[..6] {
                    return false;
                }
                let tiff = &bytes[NIKON_SIG.len()..];
                match &tiff[..2] {
                    b"II" => *byte_order = ByteOrder::Little,
                    b"MM" => *byte_order = ByteOrder::Big,
                    _ => return false,
                }
                true
            }
            MnHeader::Sony => bytes.len() >= SONY_SIG.len() && bytes[..4] == SONY_SIG[..4],
        }
    }

    /// Serialize the header
    pub fn write<W: Write>(&self, sink: &mut IoSink<W>, byte_order: ByteOrder) -> Result<usize> {
        match self {
            MnHeader::Olympus => sink.write(&OLYMPUS_SIG),
            MnHeader::Nikon { byte_order: own } => {
                let mut len = sink.write(&NIKON_SIG)?;
                let order = own.or(byte_order);
                let mut tiff = [0u8; 8];
                match order {
                    ByteOrder::Big => tiff[..2].copy_from_slice(b"MM"),
                    _ => tiff[..2].copy_from_slice(b"II"),
                }
                order.put_u16(&mut tiff[2..], 42);
                order.put_u32(&mut tiff[4..], 8);
                len += sink.write(&tiff)?;
                Ok(len)
            }
            MnHeader::Sony => sink.write(&SONY_SIG),
        }
    }
}

/// The `MakerNote` entry (tag 0x927C) in the Exif directory
///
/// Starts out as a plain entry holding the raw maker-note bytes; once the
/// vendor is identified it wraps an owned [`IfdMakernote`] instead.
#[derive(Debug)]
pub struct MnEntry {
    pub(crate) common: EntryData,
    /// Default group for an attached maker-note
    pub(crate) mn_group: Group,
    /// The identified maker-note, if any
    pub(crate) mn: Option<Box<TiffNode>>,
}

impl MnEntry {
    /// Create the maker-note entry
    pub fn new(tag: u16, group: Group, mn_group: Group) -> Self {
        MnEntry {
            common: EntryData::new(tag, group, TiffType::Undefined),
            mn_group,
            mn: None,
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

    /// The attached maker-note, if identified
    pub fn makernote(&self) -> Option<&TiffNode> {
        self.mn.as_deref()
    }

    /// Group of the attached (or default) maker-note
    pub fn mn_group(&self) -> Group {
        self.mn_group
    }

    /// Attach an identified maker-note
    pub fn set_makernote(&mut self, mn: TiffNode) {
        self.mn_group = mn.group();
        self.mn = Some(Box::new(mn));
    }

    /// Continue a descent path into the maker-note, identifying and
    /// creating it from the next path item's group on first use
    pub(crate) fn add_path_mn(
        &mut self,
        tag: u16,
        path: &mut crate::path::TiffPath,
        object: Option<TiffNode>,
    ) -> Option<&mut TiffNode> {
        let tpi1 = path.peek(0)?;
        let tpi2 = path.peek(1)?;
        if self.mn.is_none() {
            self.mn_group = tpi2.group();
            let mn = crate::registry::create_makernote(tpi1.tag(), tpi1.group(), self.mn_group)?;
            self.mn = Some(Box::new(mn));
        }
        self.mn.as_deref_mut()?.add_path(tag, path, object)
    }

    pub(crate) fn accept(&mut self, visitor: &mut dyn TiffVisitor) {
        visitor.visit_mn_entry(self);
        if let Some(mn) = &mut self.mn {
            mn.accept(visitor);
        }
        // A visitor that does not understand the maker-note discards it;
        // the raw entry bytes remain and round-trip unchanged.
        if !visitor.go(Phase::KNOWN_MAKERNOTE) {
            self.mn = None;
        }
    }

    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        value_idx: u32,
        image_idx: &mut u32,
    ) -> Result<usize> {
        match &mut self.mn {
            Some(mn) => mn.write(
                sink,
                byte_order,
                offset + value_idx as i64,
                IDX_UNSET,
                IDX_UNSET,
                image_idx,
            ),
            None => self.common.write_value(sink, byte_order),
        }
    }
}

impl Node for MnEntry {
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
        let mn = match &self.mn {
            Some(mn) => mn,
            None => return self.common.count,
        };
        // The count of an IFD maker-note is its size in bytes
        if !self.common.tiff_type.is_byte_family() {
            error!(
                "maker-note entry {:#06x} has incorrect TIFF type {}, expected a byte type",
                self.common.tag, self.common.tiff_type
            );
        }
        mn.size()
    }

    fn size(&self) -> usize {
        match &self.mn {
            Some(mn) => mn.size(),
            None => self.common.size,
        }
    }

    // Image strips inside a maker-note go through its local data area,
    // so the entry contributes nothing to the global image area.
}

/// A maker-note with a vendor header and an embedded IFD
///
/// The embedded IFD is serialized with the maker-note's own byte order
/// and its internal offsets are measured from the vendor's base, not from
/// the TIFF start.
#[derive(Debug)]
pub struct IfdMakernote {
    pub(crate) tag: u16,
    pub(crate) group: Group,
    pub(crate) header: Option<MnHeader>,
    pub(crate) ifd: Directory,
    /// Absolute position of the maker-note, recorded during serialization
    pub(crate) mn_offset: u32,
    /// Byte order of the surrounding image
    pub(crate) image_byte_order: ByteOrder,
}

impl IfdMakernote {
    /// Create a maker-note with the given header and embedded IFD group
    pub fn new(tag: u16, group: Group, mn_group: Group, header: Option<MnHeader>, has_next: bool) -> Self {
        let ifd = if has_next {
            Directory::new(tag, mn_group)
        } else {
            Directory::new_no_next(tag, mn_group)
        };
        IfdMakernote {
            tag,
            group,
            header,
            ifd,
            mn_offset: 0,
            image_byte_order: ByteOrder::Invalid,
        }
    }

    /// The embedded IFD
    pub fn ifd(&self) -> &Directory {
        &self.ifd
    }

    /// The embedded IFD, mutable
    pub fn ifd_mut(&mut self) -> &mut Directory {
        &mut self.ifd
    }

    /// Size of the vendor header
    pub fn header_size(&self) -> usize {
        self.header.as_ref().map(|h| h.size()).unwrap_or(0)
    }

    /// The byte order the maker-note is serialized with
    pub fn byte_order(&self) -> ByteOrder {
        match &self.header {
            Some(h) if h.byte_order().is_valid() => h.byte_order(),
            _ => self.image_byte_order,
        }
    }

    /// Set the header's byte order, where the variant stores one
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        if let Some(header) = &mut self.header {
            header.set_byte_order(order);
        }
    }

    /// The base that IFD-internal offsets are measured from
    pub fn base_offset(&self) -> u32 {
        self.header
            .as_ref()
            .map(|h| h.base_offset(self.mn_offset))
            .unwrap_or(0)
    }

    /// Validate header bytes read from a stream
    pub fn read_header(&mut self, bytes: &[u8]) -> bool {
        match &mut self.header {
            Some(header) => header.read(bytes),
            None => true,
        }
    }

    pub(crate) fn accept(&mut self, visitor: &mut dyn TiffVisitor) {
        if visitor.go(Phase::TRAVERSE) {
            visitor.visit_ifd_makernote(self);
        }
        if visitor.go(Phase::KNOWN_MAKERNOTE) {
            if visitor.go(Phase::TRAVERSE) {
                self.ifd.accept(visitor);
            }
            if visitor.go(Phase::TRAVERSE) {
                visitor.visit_ifd_makernote_end(self);
            }
        }
    }

    pub(crate) fn write<W: Write>(
        &mut self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
        offset: i64,
        image_idx: &mut u32,
    ) -> Result<usize> {
        self.mn_offset = offset as u32;
        self.image_byte_order = byte_order;
        let order = self.byte_order().or(byte_order);
        let mut len = 0usize;
        if let Some(header) = &self.header {
            len = header.write(sink, order)?;
        }
        // The embedded IFD's offsets are relative to the vendor base
        let ifd_offset = offset - self.base_offset() as i64 + len as i64;
        len += self
            .ifd
            .write(sink, order, ifd_offset, image_idx)?;
        Ok(len)
    }

    pub(crate) fn write_image<W: Write>(
        &self,
        sink: &mut IoSink<W>,
        byte_order: ByteOrder,
    ) -> Result<usize> {
        let order = self.byte_order().or(byte_order);
        self.ifd.write_image(sink, order)
    }
}

impl Node for IfdMakernote {
    fn tag(&self) -> u16 {
        self.tag
    }

    fn group(&self) -> Group {
        self.group
    }

    fn count(&self) -> usize {
        self.ifd.count()
    }

    fn size(&self) -> usize {
        self.header_size() + self.ifd.size()
    }

    fn size_image(&self) -> usize {
        self.ifd.size_image()
    }
}
