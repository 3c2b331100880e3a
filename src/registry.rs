//! Creator registry: synthesizing nodes from tag and group
//!
//! The tree builder addresses nodes by `(extended tag, group)`. The
//! static structure table below maps each address to the node kind that
//! belongs there, so a descent path can materialize missing levels
//! without the caller knowing the tree's shape. Unlisted addresses fall
//! back to a plain entry.

use crate::nodes::{
    sony_tag_cipher, ArrayCfg, ArrayDef, ArraySet, BinaryArray, BinaryElement, CfgSelFct,
    DataEntry, Directory, Entry, IfdMakernote, ImageEntry, MnEntry, MnHeader, SizeEntry,
    SubIfdEntry, TiffNode,
};
use crate::path::{TiffPath, TiffPathItem, TAG_ALL, TAG_NEXT, TAG_ROOT};
use crate::types::{ByteOrder, Group, TiffType};

// ---------------------------------------------------------------
// Vendor binary array configurations
// ---------------------------------------------------------------

/// Canon camera settings: shorts at stride 2 with a leading size field
pub static CANON_CS_CFG: ArrayCfg = ArrayCfg {
    group: Group::CanonCs,
    byte_order: ByteOrder::Invalid,
    el_tiff_type: TiffType::Short,
    tag_step: 2,
    has_size: true,
    has_fillers: false,
    crypt_fct: None,
};

/// Nikon AF fine tune: four bytes, zero-padded to the declared end
pub static NIKON_AFT_CFG: ArrayCfg = ArrayCfg {
    group: Group::NikonAft,
    byte_order: ByteOrder::Invalid,
    el_tiff_type: TiffType::Byte,
    tag_step: 1,
    has_size: false,
    has_fillers: true,
    crypt_fct: None,
};

/// Nikon AF fine tune elements: on/off flag, tune value, default, unused
pub static NIKON_AFT_DEFS: [ArrayDef; 4] = [
    ArrayDef {
        idx: 0,
        tiff_type: TiffType::Byte,
        count: 1,
    },
    ArrayDef {
        idx: 1,
        tiff_type: TiffType::Byte,
        count: 1,
    },
    ArrayDef {
        idx: 2,
        tiff_type: TiffType::Byte,
        count: 1,
    },
    ArrayDef {
        idx: 3,
        tiff_type: TiffType::Byte,
        count: 1,
    },
];

/// Sony camera settings, first layout (280 or 364 bytes, big endian)
static SONY_CS_DEFS: [ArrayDef; 2] = [
    ArrayDef {
        idx: 4,
        tiff_type: TiffType::Short,
        count: 1,
    },
    ArrayDef {
        idx: 6,
        tiff_type: TiffType::Short,
        count: 1,
    },
];

/// Sony camera settings, second layout (332 bytes, big endian)
static SONY_CS2_DEFS: [ArrayDef; 2] = [
    ArrayDef {
        idx: 16,
        tiff_type: TiffType::Short,
        count: 1,
    },
    ArrayDef {
        idx: 18,
        tiff_type: TiffType::Short,
        count: 1,
    },
];

/// The candidate shapes of the Sony camera settings tag; the actual
/// layout is picked from the raw size
pub static SONY_CS_SET: [ArraySet; 2] = [
    ArraySet {
        cfg: ArrayCfg {
            group: Group::SonyCs,
            byte_order: ByteOrder::Big,
            el_tiff_type: TiffType::Short,
            tag_step: 2,
            has_size: false,
            has_fillers: false,
            crypt_fct: None,
        },
        defs: &SONY_CS_DEFS,
    },
    ArraySet {
        cfg: ArrayCfg {
            group: Group::SonyCs2,
            byte_order: ByteOrder::Big,
            el_tiff_type: TiffType::Short,
            tag_step: 2,
            has_size: false,
            has_fillers: false,
            crypt_fct: None,
        },
        defs: &SONY_CS2_DEFS,
    },
];

/// Choose the Sony camera settings layout from the packed size
pub fn sony_cs_selector(_tag: u16, bytes: &[u8]) -> Option<usize> {
    match bytes.len() {
        280 | 364 => Some(0),
        332 => Some(1),
        _ => None,
    }
}

/// Sony focus position: enciphered bytes at stride 1
pub static SONY_FP_CFG: ArrayCfg = ArrayCfg {
    group: Group::SonyFp,
    byte_order: ByteOrder::Big,
    el_tiff_type: TiffType::Byte,
    tag_step: 1,
    has_size: false,
    has_fillers: false,
    crypt_fct: Some(sony_tag_cipher),
};

/// Sony focus position elements: ambient temperature and focus position
pub static SONY_FP_DEFS: [ArrayDef; 2] = [
    ArrayDef {
        idx: 0x04,
        tiff_type: TiffType::SByte,
        count: 1,
    },
    ArrayDef {
        idx: 0x2D,
        tiff_type: TiffType::Byte,
        count: 1,
    },
];

// ---------------------------------------------------------------
// Structure table
// ---------------------------------------------------------------

/// Node kind to synthesize for a table row
enum CreatorKind {
    Entry,
    Directory,
    SubIfd(Group),
    MnEntry,
    DataEntry(u16, Group),
    SizeEntry(u16, Group),
    ImageEntry(u16, Group),
    BinaryArray(&'static ArrayCfg, &'static [ArrayDef]),
    ComplexBinaryArray(&'static [ArraySet], CfgSelFct),
    BinaryElement,
}

struct CreatorRow {
    ext_tag: u32,
    group: Group,
    kind: CreatorKind,
}

const fn row(ext_tag: u32, group: Group, kind: CreatorKind) -> CreatorRow {
    CreatorRow {
        ext_tag,
        group,
        kind,
    }
}

/// The TIFF tree structure: which node kind lives at which address
static CREATORS: &[CreatorRow] = &[
    row(TAG_ROOT, Group::Ifd0, CreatorKind::Directory),
    row(TAG_NEXT, Group::Ifd1, CreatorKind::Directory),
    row(TAG_NEXT, Group::Ifd2, CreatorKind::Directory),
    row(TAG_NEXT, Group::Ifd3, CreatorKind::Directory),
    // IFD0
    row(0x8769, Group::Ifd0, CreatorKind::SubIfd(Group::Exif)),
    row(0x8825, Group::Ifd0, CreatorKind::SubIfd(Group::Gps)),
    row(0x014A, Group::Ifd0, CreatorKind::SubIfd(Group::SubImage1)),
    row(0x0111, Group::Ifd0, CreatorKind::ImageEntry(0x0117, Group::Ifd0)),
    row(0x0117, Group::Ifd0, CreatorKind::SizeEntry(0x0111, Group::Ifd0)),
    // IFD1: the thumbnail as one contiguous data area
    row(0x0201, Group::Ifd1, CreatorKind::DataEntry(0x0202, Group::Ifd1)),
    row(0x0202, Group::Ifd1, CreatorKind::SizeEntry(0x0201, Group::Ifd1)),
    // Sub-images of TIFF-based RAW formats
    row(0x0111, Group::SubImage1, CreatorKind::ImageEntry(0x0117, Group::SubImage1)),
    row(0x0117, Group::SubImage1, CreatorKind::SizeEntry(0x0111, Group::SubImage1)),
    row(0x0111, Group::SubImage2, CreatorKind::ImageEntry(0x0117, Group::SubImage2)),
    row(0x0117, Group::SubImage2, CreatorKind::SizeEntry(0x0111, Group::SubImage2)),
    row(0x0111, Group::SubImage3, CreatorKind::ImageEntry(0x0117, Group::SubImage3)),
    row(0x0117, Group::SubImage3, CreatorKind::SizeEntry(0x0111, Group::SubImage3)),
    row(0x0111, Group::SubImage4, CreatorKind::ImageEntry(0x0117, Group::SubImage4)),
    row(0x0117, Group::SubImage4, CreatorKind::SizeEntry(0x0111, Group::SubImage4)),
    // Exif
    row(0xA005, Group::Exif, CreatorKind::SubIfd(Group::Interop)),
    row(0x927C, Group::Exif, CreatorKind::MnEntry),
    // Canon
    row(0x0001, Group::Canon, CreatorKind::BinaryArray(&CANON_CS_CFG, &[])),
    row(TAG_ALL, Group::CanonCs, CreatorKind::BinaryElement),
    // Nikon
    row(0x00B9, Group::Nikon, CreatorKind::BinaryArray(&NIKON_AFT_CFG, &NIKON_AFT_DEFS)),
    row(TAG_ALL, Group::NikonAft, CreatorKind::BinaryElement),
    // Sony
    row(0x0114, Group::Sony, CreatorKind::ComplexBinaryArray(&SONY_CS_SET, sony_cs_selector)),
    row(TAG_ALL, Group::SonyCs, CreatorKind::BinaryElement),
    row(TAG_ALL, Group::SonyCs2, CreatorKind::BinaryElement),
    row(0x9402, Group::Sony, CreatorKind::BinaryArray(&SONY_FP_CFG, &SONY_FP_DEFS)),
    row(TAG_ALL, Group::SonyFp, CreatorKind::BinaryElement),
    // Any other tag in a known directory group is a plain entry
    row(TAG_ALL, Group::Ifd0, CreatorKind::Entry),
    row(TAG_ALL, Group::Ifd1, CreatorKind::Entry),
    row(TAG_ALL, Group::Ifd2, CreatorKind::Entry),
    row(TAG_ALL, Group::Ifd3, CreatorKind::Entry),
    row(TAG_ALL, Group::Exif, CreatorKind::Entry),
    row(TAG_ALL, Group::Gps, CreatorKind::Entry),
    row(TAG_ALL, Group::Interop, CreatorKind::Entry),
    row(TAG_ALL, Group::Olympus, CreatorKind::Entry),
    row(TAG_ALL, Group::Nikon, CreatorKind::Entry),
    row(TAG_ALL, Group::Pentax, CreatorKind::Entry),
    row(TAG_ALL, Group::Canon, CreatorKind::Entry),
    row(TAG_ALL, Group::Sony, CreatorKind::Entry),
];

/// Synthesize a fresh node for an address.
///
/// Addresses without a table row become plain entries.
pub fn create(ext_tag: u32, group: Group) -> TiffNode {
    let tag = (ext_tag & 0xFFFF) as u16;
    for row in CREATORS {
        if (row.ext_tag == TAG_ALL || row.ext_tag == ext_tag) && row.group == group {
            return match &row.kind {
                CreatorKind::Entry => TiffNode::Entry(Entry::new(tag, group)),
                CreatorKind::Directory => TiffNode::Directory(Directory::new(tag, group)),
                CreatorKind::SubIfd(new_group) => {
                    TiffNode::SubIfd(SubIfdEntry::new(tag, group, *new_group))
                }
                CreatorKind::MnEntry => TiffNode::MnEntry(MnEntry::new(tag, group, Group::Mn)),
                CreatorKind::DataEntry(sz_tag, sz_group) => {
                    TiffNode::DataEntry(DataEntry::new(tag, group, *sz_tag, *sz_group))
                }
                CreatorKind::SizeEntry(dt_tag, dt_group) => {
                    TiffNode::SizeEntry(SizeEntry::new(tag, group, *dt_tag, *dt_group))
                }
                CreatorKind::ImageEntry(sz_tag, sz_group) => {
                    TiffNode::ImageEntry(ImageEntry::new(tag, group, *sz_tag, *sz_group))
                }
                CreatorKind::BinaryArray(cfg, defs) => {
                    TiffNode::BinaryArray(BinaryArray::new(tag, group, *cfg, *defs))
                }
                CreatorKind::ComplexBinaryArray(set, sel) => {
                    TiffNode::BinaryArray(BinaryArray::new_complex(tag, group, *set, *sel))
                }
                CreatorKind::BinaryElement => {
                    TiffNode::BinaryElement(BinaryElement::new(tag, group))
                }
            };
        }
    }
    TiffNode::Entry(Entry::new(tag, group))
}

/// Create the maker-note node for a vendor group, or `None` for vendors
/// this build does not know
pub fn create_makernote(tag: u16, group: Group, mn_group: Group) -> Option<TiffNode> {
    let mn = match mn_group {
        Group::Olympus => {
            IfdMakernote::new(tag, group, mn_group, Some(MnHeader::Olympus), false)
        }
        Group::Nikon => IfdMakernote::new(
            tag,
            group,
            mn_group,
            Some(MnHeader::Nikon {
                byte_order: ByteOrder::Invalid,
            }),
            true,
        ),
        Group::Sony => IfdMakernote::new(tag, group, mn_group, Some(MnHeader::Sony), false),
        // Headerless maker-notes: a bare IFD with TIFF-relative offsets
        Group::Canon | Group::Pentax => IfdMakernote::new(tag, group, mn_group, None, false),
        _ => return None,
    };
    Some(TiffNode::Makernote(mn))
}

/// The path item containing `group`, and the group that item resides in
fn containing_item(group: Group) -> Option<(u32, Group, Group)> {
    match group {
        Group::None | Group::Ifd0 => None,
        Group::Ifd1 => Some((TAG_NEXT, Group::Ifd1, Group::Ifd0)),
        Group::Ifd2 => Some((TAG_NEXT, Group::Ifd2, Group::Ifd1)),
        Group::Ifd3 => Some((TAG_NEXT, Group::Ifd3, Group::Ifd2)),
        Group::SubImage1 | Group::SubImage2 | Group::SubImage3 | Group::SubImage4 => {
            Some((0x014A, Group::Ifd0, Group::Ifd0))
        }
        Group::Exif => Some((0x8769, Group::Ifd0, Group::Ifd0)),
        Group::Gps => Some((0x8825, Group::Ifd0, Group::Ifd0)),
        Group::Interop => Some((0xA005, Group::Exif, Group::Exif)),
        Group::Mn
        | Group::Olympus
        | Group::Nikon
        | Group::Pentax
        | Group::Canon
        | Group::Sony => Some((0x927C, Group::Exif, Group::Exif)),
        Group::CanonCs => Some((0x0001, Group::Canon, Group::Canon)),
        Group::NikonAft => Some((0x00B9, Group::Nikon, Group::Nikon)),
        Group::SonyCs | Group::SonyCs2 => Some((0x0114, Group::Sony, Group::Sony)),
        Group::SonyFp => Some((0x9402, Group::Sony, Group::Sony)),
    }
}

/// Build the descent path from the root to `(ext_tag, group)`
pub fn path_for(ext_tag: u32, group: Group) -> TiffPath {
    let mut path = TiffPath::new();
    path.push(TiffPathItem::new(ext_tag, group));
    let mut g = group;
    while let Some((item_tag, item_group, parent)) = containing_item(g) {
        path.push(TiffPathItem::new(item_tag, item_group));
        g = parent;
    }
    path.push(TiffPathItem::new(TAG_ROOT, Group::Ifd0));
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_falls_back_to_entry() {
        let node = create(0x010F, Group::Ifd0);
        assert!(matches!(node, TiffNode::Entry(_)));
        assert_eq!(node.tag(), 0x010F);
    }

    #[test]
    fn test_create_known_addresses() {
        assert!(matches!(
            create(TAG_ROOT, Group::Ifd0),
            TiffNode::Directory(_)
        ));
        assert!(matches!(create(0x8769, Group::Ifd0), TiffNode::SubIfd(_)));
        assert!(matches!(create(0x927C, Group::Exif), TiffNode::MnEntry(_)));
        assert!(matches!(
            create(0x0111, Group::Ifd0),
            TiffNode::ImageEntry(_)
        ));
        assert!(matches!(
            create(0x0201, Group::Ifd1),
            TiffNode::DataEntry(_)
        ));
        assert!(matches!(
            create(0x0001, Group::Canon),
            TiffNode::BinaryArray(_)
        ));
        assert!(matches!(
            create(0x0002, Group::CanonCs),
            TiffNode::BinaryElement(_)
        ));
    }

    #[test]
    fn test_create_makernote_vendors() {
        assert!(create_makernote(0x927C, Group::Exif, Group::Nikon).is_some());
        assert!(create_makernote(0x927C, Group::Exif, Group::Canon).is_some());
        assert!(create_makernote(0x927C, Group::Exif, Group::Ifd0).is_none());
    }

    #[test]
    fn test_path_for_exif_entry() {
        let path = path_for(0x9286, Group::Exif);
        assert_eq!(path.len(), 3);
        assert_eq!(path.top().unwrap().ext_tag(), TAG_ROOT);
        assert_eq!(path.peek(1).unwrap().ext_tag(), 0x8769);
        assert_eq!(path.peek(2).unwrap().ext_tag(), 0x9286);
    }

    #[test]
    fn test_path_for_binary_element() {
        let path = path_for(0x0002, Group::CanonCs);
        // element <- canon cs array <- maker-note <- exif <- root
        assert_eq!(path.len(), 5);
        assert_eq!(path.peek(1).unwrap().ext_tag(), 0x8769);
        assert_eq!(path.peek(2).unwrap().ext_tag(), 0x927C);
        assert_eq!(path.peek(3).unwrap().ext_tag(), 0x0001);
        assert_eq!(path.peek(4).unwrap().group(), Group::CanonCs);
    }

    #[test]
    fn test_path_for_chained_ifd() {
        let path = path_for(0x0201, Group::Ifd1);
        assert_eq!(path.len(), 3);
        assert_eq!(path.peek(1).unwrap().ext_tag(), TAG_NEXT);
        assert_eq!(path.peek(1).unwrap().group(), Group::Ifd1);
    }

    #[test]
    fn test_sony_cs_selector_by_size() {
        assert_eq!(sony_cs_selector(0x0114, &vec![0; 280]), Some(0));
        assert_eq!(sony_cs_selector(0x0114, &vec![0; 332]), Some(1));
        assert_eq!(sony_cs_selector(0x0114, &vec![0; 100]), None);
    }
}
